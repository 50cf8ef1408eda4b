//! End-to-end tests of the action pipeline through `MvcApplication`.

#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::unused_self,
    clippy::needless_pass_by_value
)]

use composable_mvc_core::filters::{ChildActionOnlyFilter, HandleErrorFilter};
use composable_mvc_core::prelude::*;
use composable_mvc_core::view::{DefaultViewLocationCache, TemplateViewEngine};
use composable_mvc_runtime::MvcApplication;
use composable_mvc_testing::{
    EventLog, Hook, InMemoryVirtualPathProvider, RecordingFilter, StubTemplateRenderer, TestController,
    get, post, routed,
};
use http::StatusCode;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

thread_local! {
    static LOG: EventLog = EventLog::new();
}

/// The log shared by the controller, its declared filters and the test body.
fn log() -> EventLog {
    LOG.with(EventLog::clone)
}

struct OrdersController {
    filter: RecordingFilter,
}

impl Default for OrdersController {
    fn default() -> Self {
        Self {
            filter: RecordingFilter::new("controller", &log()),
        }
    }
}

impl MvcFilter for OrdersController {
    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        self.filter.as_action_filter()
    }

    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        self.filter.as_result_filter()
    }
}

impl Controller for OrdersController {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl OrdersController {
    fn index(&self, _ctx: &mut ControllerContext) -> &'static str {
        log().record("Index");
        "orders"
    }

    fn guarded(&self, _ctx: &mut ControllerContext) -> &'static str {
        log().record("Guarded");
        "guarded"
    }

    fn fail(&self, _ctx: &mut ControllerContext) -> anyhow::Result<String> {
        log().record("Fail");
        Err(anyhow::anyhow!("warehouse offline"))
    }

    fn save(&self, _ctx: &mut ControllerContext) -> &'static str {
        "saved"
    }

    fn edit_form(&self, _ctx: &mut ControllerContext) -> &'static str {
        "edit form"
    }

    fn edit_post(&self, _ctx: &mut ControllerContext) -> &'static str {
        "edit posted"
    }

    fn list(&self, _ctx: &mut ControllerContext) -> &'static str {
        "list"
    }

    fn greet(&self, _ctx: &mut ControllerContext, name: Option<String>) -> String {
        format!("Hello, {}", name.unwrap_or_default())
    }

    fn register(&self, ctx: &mut ControllerContext, registration: Value) -> String {
        if ctx.model_state.is_valid() {
            return format!("registered {}", registration["UserName"].as_str().unwrap_or_default());
        }
        ctx.model_state
            .error_messages()
            .into_iter()
            .map(|(key, message)| format!("{key}: {message}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn details(&self, _ctx: &mut ControllerContext) -> ActionResult {
        ActionResult::View(ViewResult::default().with_model(json!({ "Name": "Ada" })))
    }

    fn lost(&self, _ctx: &mut ControllerContext) -> ActionResult {
        ActionResult::view_named("Nowhere")
    }

    fn summary(&self, _ctx: &mut ControllerContext, count: Option<i64>) -> String {
        format!("{} open orders", count.unwrap_or_default())
    }
}

impl ControllerType for OrdersController {
    const NAME: &'static str = "Orders";

    fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
        let registration = ModelMetadata::complex("registration").property(
            ModelMetadata::string("UserName")
                .display_name("User name")
                .annotate(DataAnnotation::required())
                .annotate(DataAnnotation::string_length(12)),
        );

        descriptor
            .filter(RecordingFilter::new("class", &log()))
            .action(ActionBuilder::new("Index", Self::index).filter(RecordingFilter::new("method", &log())))
            .action(
                ActionBuilder::new("Guarded", Self::guarded).filter(
                    RecordingFilter::new("guard", &log())
                        .authorization_only()
                        .deny_with(ActionResult::http_unauthorized()),
                ),
            )
            .action(ActionBuilder::new("Fail", Self::fail))
            .action(ActionBuilder::new("Save", Self::save).http_post())
            .action(ActionBuilder::new("Edit", Self::edit_form))
            .action(ActionBuilder::new("EditPost", Self::edit_post).named("Edit").http_post())
            .action(ActionBuilder::new("List", Self::list))
            .action(ActionBuilder::new("ListAll", Self::list).named("List"))
            .action(
                ActionBuilder::new("Greet", Self::greet)
                    .parameter(ParameterDescriptor::new("name", ModelMetadata::string("name"))),
            )
            .action(
                ActionBuilder::new("Register", Self::register)
                    .http_post()
                    .parameter(ParameterDescriptor::new("registration", registration)),
            )
            .action(ActionBuilder::new("Details", Self::details))
            .action(ActionBuilder::new("Lost", Self::lost))
            .action(
                ActionBuilder::new("Summary", Self::summary)
                    .filter(ChildActionOnlyFilter)
                    .parameter(ParameterDescriptor::new("count", ModelMetadata::integer("count").nullable(true))),
            )
    }
}

fn app() -> MvcApplication {
    log().clear();
    MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(RecordingFilter::new("global", &log()))
        .build()
        .unwrap()
}

fn orders(request: HttpRequest, action: &str) -> RequestContext {
    routed(request, "Orders", action)
}

#[test]
fn test_filters_wrap_the_action_in_scope_order() {
    let app = app();
    let response = app.process_request(orders(get("/orders"), "Index")).unwrap();

    assert_eq!(response.body_text(), "orders");
    assert_eq!(
        log().entries(),
        [
            "controller.OnActionExecuting",
            "global.OnActionExecuting",
            "class.OnActionExecuting",
            "method.OnActionExecuting",
            "Index",
            "method.OnActionExecuted",
            "class.OnActionExecuted",
            "global.OnActionExecuted",
            "controller.OnActionExecuted",
            "controller.OnResultExecuting",
            "global.OnResultExecuting",
            "class.OnResultExecuting",
            "method.OnResultExecuting",
            "method.OnResultExecuted",
            "class.OnResultExecuted",
            "global.OnResultExecuted",
            "controller.OnResultExecuted",
        ]
    );
}

#[test]
fn test_action_filter_short_circuit_skips_inner_filters() {
    log().clear();
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(
            RecordingFilter::new("cache", &log())
                .short_circuit_with(ActionResult::content("cached")),
        )
        .build()
        .unwrap();

    let response = app.process_request(orders(get("/orders"), "Index")).unwrap();

    assert_eq!(response.body_text(), "cached");
    let entries = log().entries();
    assert_eq!(
        &entries[..3],
        [
            "controller.OnActionExecuting",
            "cache.OnActionExecuting",
            "controller.OnActionExecuted",
        ]
    );
    assert!(!entries.iter().any(|e| e == "Index" || e.starts_with("class.OnAction")));
}

#[test]
fn test_failing_executing_hook_unwinds_outer_filters() {
    log().clear();
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(RecordingFilter::new("audit", &log()).fail_on(Hook::ActionExecuting))
        .build()
        .unwrap();

    let error = app.process_request(orders(get("/orders"), "Index")).unwrap_err();

    assert!(matches!(error, MvcError::Filter { filter: "audit", .. }));
    assert_eq!(
        log().entries(),
        [
            "controller.OnActionExecuting",
            "audit.OnActionExecuting",
            "controller.OnActionExecuted!",
        ]
    );
}

#[test]
fn test_authorization_result_skips_action_but_runs_result_filters() {
    let app = app();
    let response = app.process_request(orders(get("/orders/guarded"), "Guarded")).unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    let entries = log().entries();
    assert_eq!(entries[0], "guard.OnAuthorization");
    assert!(!entries.iter().any(|e| e == "Guarded" || e.contains("OnAction")));
    assert_eq!(entries.last().map(String::as_str), Some("controller.OnResultExecuted"));
}

#[test]
fn test_action_executed_hook_can_handle_a_failure() {
    log().clear();
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(
            RecordingFilter::new("rescue", &log()).handle_exceptions(Some(ActionResult::content("recovered"))),
        )
        .build()
        .unwrap();

    let response = app.process_request(orders(get("/orders/fail"), "Fail")).unwrap();

    assert_eq!(response.body_text(), "recovered");
    assert_eq!(
        log().entries(),
        [
            "controller.OnActionExecuting",
            "rescue.OnActionExecuting",
            "class.OnActionExecuting",
            "Fail",
            "class.OnActionExecuted!",
            "rescue.OnActionExecuted!",
            "controller.OnActionExecuted!",
            "controller.OnResultExecuting",
            "rescue.OnResultExecuting",
            "class.OnResultExecuting",
            "class.OnResultExecuted",
            "rescue.OnResultExecuted",
            "controller.OnResultExecuted",
        ]
    );
}

#[test]
fn test_failing_result_executing_hook_unwinds_outer_result_filters() {
    log().clear();
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(RecordingFilter::new("rf", &log()).fail_on(Hook::ResultExecuting))
        .build()
        .unwrap();

    let error = app.process_request(orders(get("/orders"), "Index")).unwrap_err();

    assert!(matches!(error, MvcError::Filter { filter: "rf", .. }));
    let entries = log().entries();
    let result_stage: Vec<&str> = entries
        .iter()
        .map(String::as_str)
        .skip_while(|e| *e != "controller.OnResultExecuting")
        .collect();
    assert_eq!(
        result_stage,
        [
            "controller.OnResultExecuting",
            "rf.OnResultExecuting",
            "controller.OnResultExecuted!",
        ]
    );
}

#[test]
fn test_canceled_result_skips_execution_and_inner_filters() {
    log().clear();
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(RecordingFilter::new("gate", &log()).cancel_result())
        .build()
        .unwrap();

    let response = app.process_request(orders(get("/orders"), "Index")).unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_text(), "");
    let entries = log().entries();
    let result_stage: Vec<&str> = entries
        .iter()
        .map(String::as_str)
        .skip_while(|e| *e != "controller.OnResultExecuting")
        .collect();
    assert_eq!(
        result_stage,
        [
            "controller.OnResultExecuting",
            "gate.OnResultExecuting",
            "controller.OnResultExecuted",
        ]
    );
}

#[test]
fn test_single_use_filter_keeps_the_last_after_sorting() {
    log().clear();
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(
            RecordingFilter::new("audit", &log())
                .single()
                .with_order(2)
                .short_circuit_with(ActionResult::content("kept")),
        )
        .global_filter(RecordingFilter::new("audit", &log()).single().with_order(1))
        .build()
        .unwrap();

    let response = app.process_request(orders(get("/orders"), "Index")).unwrap();

    assert_eq!(response.body_text(), "kept");
    let entries = log().entries();
    assert_eq!(
        entries.iter().filter(|e| *e == "audit.OnActionExecuting").count(),
        1
    );
    assert!(!entries.iter().any(|e| e == "Index"));
}

#[test]
fn test_unhandled_action_failure_is_returned() {
    let app = app();
    let error = app.process_request(orders(get("/orders/fail"), "Fail")).unwrap_err();

    assert!(matches!(error, MvcError::Action { .. }));
    assert!(log().entries().contains(&"global.OnActionExecuted!".to_string()));
}

#[test]
fn test_exception_filter_replaces_failed_result() {
    log().clear();
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(
            RecordingFilter::new("errors", &log())
                .exception_only()
                .handle_exceptions(Some(ActionResult::content("sorry"))),
        )
        .build()
        .unwrap();

    let response = app.process_request(orders(get("/orders/fail"), "Fail")).unwrap();

    assert_eq!(response.body_text(), "sorry");
    assert_eq!(log().entries().last().map(String::as_str), Some("errors.OnException!"));
}

#[test]
fn test_handle_error_filter_renders_error_view() {
    log().clear();
    let files = Arc::new(InMemoryVirtualPathProvider::new(["~/Views/Shared/Error.html"]));
    let renderer = StubTemplateRenderer::new()
        .with_template("~/Views/Shared/Error.html", "Error in {{controller}}.{{action}}");
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .global_filter(HandleErrorFilter::new())
        .view_engine(Arc::new(TemplateViewEngine::new(files, Arc::new(renderer), "html")))
        .build()
        .unwrap();

    let response = app.process_request(orders(get("/orders/fail"), "Fail")).unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body_text(), "Error in Orders.Fail");
}

#[test]
fn test_verb_mismatch_is_not_found_before_authorization() {
    let app = app();
    let error = app.process_request(orders(get("/orders/save"), "Save")).unwrap_err();

    assert!(matches!(error, MvcError::ActionNotFound { ref action, .. } if action == "Save"));
    assert!(error.is_not_found());
    assert!(log().entries().is_empty());
}

#[test]
fn test_method_selector_wins_over_plain_action() {
    let app = app();

    let response = app.process_request(orders(get("/orders/edit"), "Edit")).unwrap();
    assert_eq!(response.body_text(), "edit form");

    let response = app.process_request(orders(post("/orders/edit"), "edit")).unwrap();
    assert_eq!(response.body_text(), "edit posted");
}

#[test]
fn test_same_name_without_selectors_is_ambiguous() {
    let app = app();
    let error = app.process_request(orders(get("/orders/list"), "List")).unwrap_err();

    match error {
        MvcError::AmbiguousAction { candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn test_form_values_take_precedence_over_query() {
    let app = app();
    let request = post("/orders/greet")
        .with_query("name", "query")
        .with_form("name", "form");

    let response = app.process_request(orders(request, "Greet")).unwrap();

    assert_eq!(response.body_text(), "Hello, form");
}

#[test]
fn test_invalid_model_reports_errors_to_the_action() {
    let app = app();
    let request = post("/orders/register").with_form("UserName", "a-much-too-long-name");

    let response = app.process_request(orders(request, "Register")).unwrap();

    let body = response.body_text();
    assert!(body.starts_with("UserName: "), "{body}");
    assert!(body.contains("User name"), "{body}");

    let request = post("/orders/register").with_form("UserName", "ada");
    let response = app.process_request(orders(request, "Register")).unwrap();
    assert_eq!(response.body_text(), "registered ada");
}

#[test]
fn test_markup_in_form_fails_request_validation() {
    let app = app();
    let request = post("/orders/register").with_form("UserName", "<script>x</script>");

    let error = app.process_request(orders(request, "Register")).unwrap_err();

    assert!(matches!(error, MvcError::RequestValidation { .. }));
}

#[test]
fn test_views_are_located_once_and_then_cached() {
    log().clear();
    let files = Arc::new(InMemoryVirtualPathProvider::new(["~/Views/Shared/Details.html"]));
    let renderer = StubTemplateRenderer::new().with_template("~/Views/Shared/Details.html", "<h1>{{Name}}</h1>");
    let engine = TemplateViewEngine::new(files.clone(), Arc::new(renderer), "html")
        .with_location_cache(Arc::new(DefaultViewLocationCache::default()));
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .view_engine(Arc::new(engine))
        .build()
        .unwrap();

    let first = app.process_request(orders(get("/orders/details"), "Details")).unwrap();
    let second = app.process_request(orders(get("/orders/details"), "Details")).unwrap();

    assert_eq!(first.body_text(), "<h1>Ada</h1>");
    assert_eq!(second.body_text(), "<h1>Ada</h1>");
    assert_eq!(
        files.probes(),
        ["~/Views/Orders/Details.html", "~/Views/Shared/Details.html"]
    );
}

#[test]
fn test_missing_view_lists_searched_locations() {
    log().clear();
    let files = Arc::new(InMemoryVirtualPathProvider::default());
    let engine = TemplateViewEngine::new(files, Arc::new(StubTemplateRenderer::new()), "html");
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .view_engine(Arc::new(engine))
        .build()
        .unwrap();

    let error = app.process_request(orders(get("/orders/lost"), "Lost")).unwrap_err();

    match error {
        MvcError::ViewNotFound {
            name,
            searched_locations,
        } => {
            assert_eq!(name, "Nowhere");
            assert_eq!(
                searched_locations,
                ["~/Views/Orders/Nowhere.html", "~/Views/Shared/Nowhere.html"]
            );
        }
        other => panic!("expected a missing view, got {other:?}"),
    }
}

#[test]
fn test_child_only_action_renders_inside_a_parent() {
    let app = app();

    let response = app.process_request(orders(get("/orders/summary"), "Summary")).unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let parent = TestController::context();
    let mut values = IndexMap::new();
    values.insert("count".to_string(), json!(3));
    let html = app
        .render_child_action(&parent, "Summary", Some("Orders"), values)
        .unwrap();
    assert_eq!(html, "3 open orders");
}

#[test]
fn test_view_lookup_uses_registered_controller_name() {
    log().clear();
    let files = Arc::new(InMemoryVirtualPathProvider::new(["~/Views/Orders/Details.html"]));
    let renderer = StubTemplateRenderer::new().with_template("~/Views/Orders/Details.html", "<h1>{{Name}}</h1>");
    let app = MvcApplication::builder()
        .controller::<OrdersController>()
        .view_engine(Arc::new(TemplateViewEngine::new(files.clone(), Arc::new(renderer), "html")))
        .build()
        .unwrap();

    let response = app
        .process_request(routed(get("/orders/Details"), "orders", "Details"))
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_text(), "<h1>Ada</h1>");
    assert_eq!(files.probes(), ["~/Views/Orders/Details.html"]);
}
