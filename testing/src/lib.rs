//! # Composable MVC Testing
//!
//! Testing utilities and helpers for the Composable MVC action pipeline.
//!
//! This crate provides:
//! - Recording filters that log every hook they run
//! - In-memory view files and a stub template renderer
//! - A minimal controller and request builders
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use composable_mvc_testing::{EventLog, RecordingFilter};
//!
//! let log = EventLog::new();
//! let filter = RecordingFilter::new("outer", &log).with_order(1);
//! assert_eq!(filter.name(), "outer");
//! assert!(log.entries().is_empty());
//! ```

/// Test doubles for filters and views.
pub mod mocks {
    use anyhow::anyhow;
    use composable_mvc_core::error::{MvcError, MvcResult};
    use composable_mvc_core::filters::{
        ActionExecutedContext, ActionExecutingContext, ActionFilter, AuthorizationContext,
        AuthorizationFilter, ExceptionContext, ExceptionFilter, MvcFilter, ResultExecutedContext,
        ResultExecutingContext, ResultFilter,
    };
    use composable_mvc_core::results::ActionResult;
    use composable_mvc_core::view::{TemplateRenderer, View, ViewContext, VirtualPathProvider};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    /// Shared, ordered log of strings.
    #[derive(Debug, Clone, Default)]
    pub struct EventLog(Arc<Mutex<Vec<String>>>);

    impl EventLog {
        /// An empty log.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append an entry.
        pub fn record(&self, entry: impl Into<String>) {
            self.0.lock().push(entry.into());
        }

        /// Snapshot of every entry in order.
        #[must_use]
        pub fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }

        /// Remove every entry.
        pub fn clear(&self) {
            self.0.lock().clear();
        }
    }

    /// A filter hook.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Hook {
        /// `on_authorization`
        Authorization,
        /// `on_action_executing`
        ActionExecuting,
        /// `on_action_executed`
        ActionExecuted,
        /// `on_result_executing`
        ResultExecuting,
        /// `on_result_executed`
        ResultExecuted,
        /// `on_exception`
        Exception,
    }

    impl Hook {
        const fn label(self) -> &'static str {
            match self {
                Self::Authorization => "OnAuthorization",
                Self::ActionExecuting => "OnActionExecuting",
                Self::ActionExecuted => "OnActionExecuted",
                Self::ResultExecuting => "OnResultExecuting",
                Self::ResultExecuted => "OnResultExecuted",
                Self::Exception => "OnException",
            }
        }
    }

    /// A filter that logs `name.Hook` for every hook it runs.
    ///
    /// Executed hooks that observe a failure log `name.Hook!`. By default the
    /// filter takes part in the action and result stages only.
    #[derive(Debug, Clone)]
    pub struct RecordingFilter {
        name: &'static str,
        log: EventLog,
        order: i32,
        authorization: bool,
        action: bool,
        result: bool,
        exception: bool,
        allow_multiple: bool,
        deny_with: Option<ActionResult>,
        short_circuit_with: Option<ActionResult>,
        cancel_result: bool,
        fail_on: Option<Hook>,
        handle_with: Option<Option<ActionResult>>,
    }

    impl RecordingFilter {
        /// An action and result filter logging into `log`.
        #[must_use]
        pub fn new(name: &'static str, log: &EventLog) -> Self {
            Self {
                name,
                log: log.clone(),
                order: composable_mvc_core::filters::DEFAULT_ORDER,
                authorization: false,
                action: true,
                result: true,
                exception: false,
                allow_multiple: true,
                deny_with: None,
                short_circuit_with: None,
                cancel_result: false,
                fail_on: None,
                handle_with: None,
            }
        }

        /// The filter's name.
        #[must_use]
        pub const fn name(&self) -> &'static str {
            self.name
        }

        /// Set the order within its scope.
        #[must_use]
        pub const fn with_order(mut self, order: i32) -> Self {
            self.order = order;
            self
        }

        /// Also take part in authorization.
        #[must_use]
        pub const fn authorization(mut self) -> Self {
            self.authorization = true;
            self
        }

        /// Also take part in exception handling.
        #[must_use]
        pub const fn exception(mut self) -> Self {
            self.exception = true;
            self
        }

        /// Take part in authorization only.
        #[must_use]
        pub const fn authorization_only(mut self) -> Self {
            self.authorization = true;
            self.action = false;
            self.result = false;
            self
        }

        /// Take part in exception handling only.
        #[must_use]
        pub const fn exception_only(mut self) -> Self {
            self.exception = true;
            self.action = false;
            self.result = false;
            self
        }

        /// Report `allow_multiple() == false`.
        #[must_use]
        pub const fn single(mut self) -> Self {
            self.allow_multiple = false;
            self
        }

        /// Set `result` during authorization.
        #[must_use]
        pub fn deny_with(mut self, result: ActionResult) -> Self {
            self.deny_with = Some(result);
            self
        }

        /// Set `result` while the action is executing.
        #[must_use]
        pub fn short_circuit_with(mut self, result: ActionResult) -> Self {
            self.short_circuit_with = Some(result);
            self
        }

        /// Cancel the result while it is executing.
        #[must_use]
        pub const fn cancel_result(mut self) -> Self {
            self.cancel_result = true;
            self
        }

        /// Fail in `hook`.
        #[must_use]
        pub const fn fail_on(mut self, hook: Hook) -> Self {
            self.fail_on = Some(hook);
            self
        }

        /// Mark observed failures handled, replacing the result with `result`
        /// when one is given.
        #[must_use]
        pub fn handle_exceptions(mut self, result: Option<ActionResult>) -> Self {
            self.handle_with = Some(result);
            self
        }

        fn enter(&self, hook: Hook, faulted: bool) -> anyhow::Result<()> {
            let marker = if faulted { "!" } else { "" };
            self.log
                .record(format!("{}.{}{marker}", self.name, hook.label()));
            if self.fail_on == Some(hook) {
                return Err(anyhow!("{} failed in {}", self.name, hook.label()));
            }
            Ok(())
        }
    }

    impl MvcFilter for RecordingFilter {
        fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
            self.authorization.then_some(self as &dyn AuthorizationFilter)
        }

        fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
            self.action.then_some(self as &dyn ActionFilter)
        }

        fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
            self.result.then_some(self as &dyn ResultFilter)
        }

        fn as_exception_filter(&self) -> Option<&dyn ExceptionFilter> {
            self.exception.then_some(self as &dyn ExceptionFilter)
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn allow_multiple(&self) -> bool {
            self.allow_multiple
        }

        fn filter_name(&self) -> &'static str {
            self.name
        }
    }

    impl AuthorizationFilter for RecordingFilter {
        fn on_authorization(&self, context: &mut AuthorizationContext<'_>) -> anyhow::Result<()> {
            self.enter(Hook::Authorization, false)?;
            if let Some(result) = &self.deny_with {
                context.result = Some(result.clone());
            }
            Ok(())
        }
    }

    impl ActionFilter for RecordingFilter {
        fn on_action_executing(&self, context: &mut ActionExecutingContext<'_>) -> anyhow::Result<()> {
            self.enter(Hook::ActionExecuting, false)?;
            if let Some(result) = &self.short_circuit_with {
                context.result = Some(result.clone());
            }
            Ok(())
        }

        fn on_action_executed(&self, context: &mut ActionExecutedContext<'_>) -> anyhow::Result<()> {
            self.enter(Hook::ActionExecuted, context.exception.is_some())?;
            if let Some(result) = &self.handle_with {
                if context.exception.is_some() {
                    context.exception_handled = true;
                    if let Some(result) = result {
                        context.result = Some(result.clone());
                    }
                }
            }
            Ok(())
        }
    }

    impl ResultFilter for RecordingFilter {
        fn on_result_executing(&self, context: &mut ResultExecutingContext<'_>) -> anyhow::Result<()> {
            self.enter(Hook::ResultExecuting, false)?;
            if self.cancel_result {
                context.cancel = true;
            }
            Ok(())
        }

        fn on_result_executed(&self, context: &mut ResultExecutedContext<'_>) -> anyhow::Result<()> {
            self.enter(Hook::ResultExecuted, context.exception.is_some())?;
            if self.handle_with.is_some() && context.exception.is_some() {
                context.exception_handled = true;
            }
            Ok(())
        }
    }

    impl ExceptionFilter for RecordingFilter {
        fn on_exception(&self, context: &mut ExceptionContext<'_>) -> anyhow::Result<()> {
            self.enter(Hook::Exception, true)?;
            if let Some(result) = &self.handle_with {
                context.exception_handled = true;
                context.result.clone_from(result);
            }
            Ok(())
        }
    }

    /// Virtual file system holding a fixed set of paths, logging every probe.
    #[derive(Debug, Default)]
    pub struct InMemoryVirtualPathProvider {
        files: HashSet<String>,
        probes: Mutex<Vec<String>>,
    }

    impl InMemoryVirtualPathProvider {
        /// A file system containing `paths`.
        #[must_use]
        pub fn new<I, S>(paths: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                files: paths.into_iter().map(Into::into).collect(),
                probes: Mutex::new(Vec::new()),
            }
        }

        /// Every path probed so far, in order.
        #[must_use]
        pub fn probes(&self) -> Vec<String> {
            self.probes.lock().clone()
        }
    }

    impl VirtualPathProvider for InMemoryVirtualPathProvider {
        fn file_exists(&self, virtual_path: &str) -> bool {
            self.probes.lock().push(virtual_path.to_string());
            self.files.contains(virtual_path)
        }
    }

    /// A view rendering a template with `{{name}}` placeholders.
    ///
    /// Placeholders resolve against the model's fields first, then view data.
    /// `{{Model}}` renders the whole model.
    #[derive(Debug, Clone)]
    pub struct TemplateView {
        path: String,
        template: String,
        layout: Option<String>,
    }

    impl TemplateView {
        /// The path the view was created from.
        #[must_use]
        pub fn path(&self) -> &str {
            &self.path
        }
    }

    fn text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    fn expand(template: &str, context: &ViewContext<'_>) -> MvcResult<String> {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| MvcError::Render(format!("unclosed placeholder in `{template}`")))?;
            let name = after[..end].trim();
            let value = if name == "Model" {
                context.model().map(text)
            } else {
                context
                    .model()
                    .and_then(|m| m.get(name))
                    .or_else(|| context.view_data().get(name))
                    .map(text)
            };
            output.push_str(&value.unwrap_or_default());
            rest = &after[end + 2..];
        }
        output.push_str(rest);
        Ok(output)
    }

    impl View for TemplateView {
        fn render(&self, context: &ViewContext<'_>, output: &mut String) -> MvcResult<()> {
            let body = expand(&self.template, context)?;
            match &self.layout {
                Some(layout) => output.push_str(&expand(layout, context)?.replace("@RenderBody", &body)),
                None => output.push_str(&body),
            }
            Ok(())
        }
    }

    /// Renderer holding template text by virtual path.
    #[derive(Debug, Default)]
    pub struct StubTemplateRenderer {
        templates: HashMap<String, String>,
    }

    impl StubTemplateRenderer {
        /// An empty renderer.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a template at `path`.
        #[must_use]
        pub fn with_template(mut self, path: impl Into<String>, template: impl Into<String>) -> Self {
            self.templates.insert(path.into(), template.into());
            self
        }

        fn template(&self, path: &str) -> MvcResult<String> {
            self.templates
                .get(path)
                .cloned()
                .ok_or_else(|| MvcError::Render(format!("no template at `{path}`")))
        }
    }

    impl TemplateRenderer for StubTemplateRenderer {
        fn create_view(&self, view_path: &str, master_path: Option<&str>) -> MvcResult<Arc<dyn View>> {
            Ok(Arc::new(TemplateView {
                path: view_path.to_string(),
                template: self.template(view_path)?,
                layout: master_path.map(|p| self.template(p)).transpose()?,
            }))
        }

        fn create_partial_view(&self, partial_path: &str) -> MvcResult<Arc<dyn View>> {
            Ok(Arc::new(TemplateView {
                path: partial_path.to_string(),
                template: self.template(partial_path)?,
                layout: None,
            }))
        }
    }
}

/// Builders for requests and contexts.
pub mod helpers {
    use chrono::{DateTime, TimeZone, Utc};
    use composable_mvc_core::controller::{
        Controller, ControllerContext, ControllerInstance, ControllerType,
    };
    use composable_mvc_core::descriptor::{ActionBuilder, ControllerDescriptorBuilder};
    use composable_mvc_core::filters::MvcFilter;
    use composable_mvc_core::http::{HttpRequest, RequestContext, RouteData};
    use composable_mvc_core::results::ActionResult;
    use http::Method;
    use std::any::Any;

    /// Fixed timestamp stamped on requests built here.
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// A `GET` request for `path`.
    #[must_use]
    pub fn get(path: &str) -> HttpRequest {
        HttpRequest::new(Method::GET, path).received_at(test_time())
    }

    /// A `POST` request for `path`.
    #[must_use]
    pub fn post(path: &str) -> HttpRequest {
        HttpRequest::new(Method::POST, path).received_at(test_time())
    }

    /// A request routed to `controller` / `action`.
    #[must_use]
    pub fn routed(request: HttpRequest, controller: &str, action: &str) -> RequestContext {
        RequestContext::new(request, RouteData::for_action(controller, action))
    }

    /// Controller with a single `Index` action returning `"index"`.
    #[derive(Debug, Default)]
    pub struct TestController;

    impl MvcFilter for TestController {}

    impl Controller for TestController {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl TestController {
        fn index(&self, _context: &mut ControllerContext) -> ActionResult {
            ActionResult::content("index")
        }

        /// A context for a `GET /test/index` request handled by this controller.
        #[must_use]
        pub fn context() -> ControllerContext {
            Self::context_for(routed(get("/test/index"), "Test", "Index"))
        }

        /// A context for `request_context` handled by this controller.
        #[must_use]
        pub fn context_for(request_context: RequestContext) -> ControllerContext {
            ControllerContext::new(request_context, Self::NAME, ControllerInstance::new(Self))
        }
    }

    impl ControllerType for TestController {
        const NAME: &'static str = "Test";

        fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
            descriptor.action(ActionBuilder::new("Index", Self::index))
        }
    }
}

/// Property-based testing strategies.
pub mod properties {
    use proptest::prelude::*;

    /// A binder key segment such as `Address` or `items`.
    pub fn key_segment() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9]{0,7}"
    }

    /// A dotted or indexed binder key such as `order.Lines[2].Sku`.
    pub fn model_key() -> impl Strategy<Value = String> {
        prop::collection::vec((key_segment(), prop::option::of(0usize..4)), 1..4).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(name, index)| match index {
                    Some(i) => format!("{name}[{i}]"),
                    None => name,
                })
                .collect::<Vec<_>>()
                .join(".")
        })
    }
}

pub use helpers::{TestController, get, post, routed, test_time};
pub use mocks::{
    EventLog, Hook, InMemoryVirtualPathProvider, RecordingFilter, StubTemplateRenderer, TemplateView,
};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use composable_mvc_core::filters::MvcFilter;
    use composable_mvc_core::view::{TemplateRenderer, View, ViewContext, VirtualPathProvider};
    use serde_json::json;

    #[test]
    fn test_template_view_fills_placeholders_inside_layout() {
        let renderer = StubTemplateRenderer::new()
            .with_template("~/Views/Test/Index.html", "Hi {{Name}} ({{Role}})")
            .with_template("~/Views/Shared/Site.html", "<main>@RenderBody</main>");
        let view = renderer
            .create_view("~/Views/Test/Index.html", Some("~/Views/Shared/Site.html"))
            .unwrap();

        let mut context = TestController::context();
        context.view_data.model = Some(json!({ "Name": "Ada" }));
        context.view_data.insert("Role", "admin");

        let mut output = String::new();
        view.render(&ViewContext::new(&context, "Index"), &mut output).unwrap();
        assert_eq!(output, "<main>Hi Ada (admin)</main>");
    }

    #[test]
    fn test_missing_template_is_a_render_error() {
        let renderer = StubTemplateRenderer::new();
        assert!(renderer.create_partial_view("~/Views/Nope.html").is_err());
    }

    #[test]
    fn test_path_provider_records_probes() {
        let files = InMemoryVirtualPathProvider::new(["~/a.html"]);
        assert!(!files.file_exists("~/b.html"));
        assert!(files.file_exists("~/a.html"));
        assert_eq!(files.probes(), ["~/b.html", "~/a.html"]);
    }

    #[test]
    fn test_recording_filter_capabilities() {
        let log = EventLog::new();
        let filter = RecordingFilter::new("f", &log);
        assert!(filter.as_action_filter().is_some());
        assert!(filter.as_authorization_filter().is_none());

        let filter = filter.exception_only().single();
        assert!(filter.as_action_filter().is_none());
        assert!(filter.as_exception_filter().is_some());
        assert!(!filter.allow_multiple());
    }
}
