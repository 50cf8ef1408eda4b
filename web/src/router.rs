//! The route table handed to axum.

use crate::handlers::{dispatch, health_check};
use crate::middleware::request_id_layer;
use crate::state::MvcState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{any, get},
};
use tower_http::trace::TraceLayer;

/// Routes `/{controller}`, `/{controller}/{action}` and
/// `/{controller}/{action}/{id}` into the pipeline, plus `GET /health`.
///
/// Bodies larger than the application's `max_body_bytes` are rejected with
/// 413 before the pipeline runs.
pub fn router(state: MvcState) -> Router {
    let body_limit = state.app().options().max_body_bytes;
    Router::new()
        .route("/health", get(health_check))
        .route("/:controller", any(dispatch))
        .route("/:controller/:action", any(dispatch))
        .route("/:controller/:action/:id", any(dispatch))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unused_self, clippy::needless_pass_by_value)]
mod tests {
    use super::*;
    use crate::middleware::REQUEST_ID_HEADER;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use composable_mvc_core::config::MvcOptions;
    use composable_mvc_core::prelude::*;
    use composable_mvc_runtime::MvcApplication;
    use composable_mvc_testing::{InMemoryVirtualPathProvider, StubTemplateRenderer};
    use std::any::Any;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Default)]
    struct ProductsController;

    impl MvcFilter for ProductsController {}

    impl Controller for ProductsController {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl ProductsController {
        fn index(&self, _ctx: &mut ControllerContext) -> ActionResult {
            ActionResult::View(ViewResult::default().with_model(json!({ "Count": 2 })))
        }

        fn details(&self, _ctx: &mut ControllerContext, id: i64) -> ActionResult {
            ActionResult::Json(json!({ "id": id, "name": format!("Product {id}") }))
        }

        fn rename(&self, _ctx: &mut ControllerContext, id: i64, name: String) -> String {
            format!("{id} is now {name}")
        }
    }

    impl ControllerType for ProductsController {
        const NAME: &'static str = "Products";

        fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
            descriptor
                .action(ActionBuilder::new("Index", Self::index))
                .action(
                    ActionBuilder::new("Details", Self::details)
                        .http_get()
                        .parameter(ParameterDescriptor::new("id", ModelMetadata::integer("id"))),
                )
                .action(
                    ActionBuilder::new("Rename", Self::rename)
                        .http_post()
                        .parameter(ParameterDescriptor::new("id", ModelMetadata::integer("id")))
                        .parameter(ParameterDescriptor::new("name", ModelMetadata::string("name"))),
                )
        }
    }

    fn app(options: MvcOptions) -> Router {
        let files = Arc::new(InMemoryVirtualPathProvider::new(["~/Views/Products/Index.html"]));
        let renderer = StubTemplateRenderer::new()
            .with_template("~/Views/Products/Index.html", "<p>{{Count}} products</p>");
        let mvc = MvcApplication::builder()
            .options(options)
            .controller::<ProductsController>()
            .template_views(files, Arc::new(renderer))
            .build()
            .unwrap();
        router(MvcState::new(mvc))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_view_response() {
        let response = app(MvcOptions::default()).oneshot(get("/products")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(body_text(response).await, "<p>2 products</p>");
    }

    #[tokio::test]
    async fn test_json_response_binds_route_id() {
        let response = app(MvcOptions::default())
            .oneshot(get("/products/details/7"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body, json!({ "id": 7, "name": "Product 7" }));
    }

    #[tokio::test]
    async fn test_form_post() {
        let request = Request::builder()
            .method("POST")
            .uri("/products/rename/7")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=Widget"))
            .unwrap();

        let response = app(MvcOptions::default()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "7 is now Widget");
    }

    #[tokio::test]
    async fn test_unknown_action_is_404() {
        let response = app(MvcOptions::default())
            .oneshot(get("/products/missing"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_controller_is_404() {
        let response = app(MvcOptions::default()).oneshot(get("/nothing/here")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_verb_is_404() {
        let response = app(MvcOptions::default())
            .oneshot(get("/products/rename/7?name=Widget"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_markup_is_rejected_with_400() {
        let response = app(MvcOptions::default())
            .oneshot(get("/products/details/7?comment=%3Cscript%3E"))
            .await
            .unwrap();
        // Only bound keys are validated.
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .method("POST")
            .uri("/products/rename/7")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=%3Cscript%3Ealert(1)%3C%2Fscript%3E"))
            .unwrap();
        let response = app(MvcOptions::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let options = MvcOptions {
            max_body_bytes: 8,
            ..MvcOptions::default()
        };
        let request = Request::builder()
            .method("POST")
            .uri("/products/rename/7")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=a-name-longer-than-eight-bytes"))
            .unwrap();

        let response = app(options).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(MvcOptions::default()).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }
}
