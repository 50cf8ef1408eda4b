//! The catch-all MVC handler: axum request in, pipeline response out.
//!
//! Route parameters `controller`, `action` (default `Index`) and `id` become
//! route data. Query strings and url-encoded forms are decoded into ordered
//! pairs and JSON bodies are parsed. The pipeline itself is synchronous and
//! runs on the blocking pool.

use crate::error::AppError;
use crate::middleware::RequestId;
use crate::state::MvcState;
use axum::{
    Extension,
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, Method, header},
    response::Response,
};
use composable_mvc_core::http::{HttpRequest, HttpResponse, RequestContext, RouteData};
use std::collections::HashMap;
use thiserror::Error;

/// Default action when the route names none.
pub const DEFAULT_ACTION: &str = "Index";

/// Why a request could not be turned into an [`HttpRequest`].
#[derive(Error, Debug)]
pub enum RequestConversionError {
    /// The query string did not decode
    #[error("malformed query string: {0}")]
    Query(#[source] serde_urlencoded::de::Error),

    /// The url-encoded form body did not decode
    #[error("malformed form body: {0}")]
    Form(#[source] serde_urlencoded::de::Error),

    /// The JSON body did not parse
    #[error("malformed JSON body: {0}")]
    Json(#[source] serde_json::Error),
}

impl From<RequestConversionError> for AppError {
    fn from(error: RequestConversionError) -> Self {
        Self::bad_request(error.to_string())
    }
}

/// Route an axum request through the MVC pipeline.
///
/// # Errors
///
/// Returns [`AppError`] for undecodable input and for pipeline failures no
/// exception filter handled.
#[allow(clippy::implicit_hasher)]
pub async fn dispatch(
    State(state): State<MvcState>,
    Path(params): Path<HashMap<String, String>>,
    RawQuery(query): RawQuery,
    request_id: Option<Extension<RequestId>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let path = request_path(&params);
    let request = convert_request(method, path, &headers, query.as_deref(), &body)?;
    let route_data = route_data(params);

    let mut context = RequestContext::new(request, route_data);
    if let Some(Extension(id)) = request_id {
        context = context.with_request_id(id.to_string());
    }

    let app = state.app().clone();
    let result = tokio::task::spawn_blocking(move || app.process_request(context))
        .await
        .map_err(|e| AppError::internal("An internal error occurred").with_source(e.into()))?;

    match result {
        Ok(response) => {
            metrics::counter!("mvc_http_responses_total", "status" => response.status.as_u16().to_string())
                .increment(1);
            Ok(convert_response(response))
        }
        Err(error) => {
            let error = AppError::from(error);
            metrics::counter!("mvc_http_responses_total", "status" => error.status().as_u16().to_string())
                .increment(1);
            Err(error)
        }
    }
}

fn request_path(params: &HashMap<String, String>) -> String {
    ["controller", "action", "id"]
        .iter()
        .filter_map(|key| params.get(*key))
        .fold(String::new(), |mut path, segment| {
            path.push('/');
            path.push_str(segment);
            path
        })
}

fn route_data(mut params: HashMap<String, String>) -> RouteData {
    let controller = params.remove("controller").unwrap_or_default();
    let action = params
        .remove("action")
        .unwrap_or_else(|| DEFAULT_ACTION.to_string());
    let mut route_data = RouteData::for_action(controller, action);
    for (key, value) in params {
        route_data.insert(key, value);
    }
    route_data
}

/// Build the pipeline's view of a request.
///
/// # Errors
///
/// Returns [`RequestConversionError`] when the query string, a form body or
/// a JSON body is malformed.
pub fn convert_request(
    method: Method,
    path: String,
    headers: &HeaderMap,
    query: Option<&str>,
    body: &[u8],
) -> Result<HttpRequest, RequestConversionError> {
    let mut request = HttpRequest::new(method, path);
    request.headers = headers.clone();
    request.is_secure = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        request.query = serde_urlencoded::from_str(query).map_err(RequestConversionError::Query)?;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());
    match content_type.as_deref() {
        Some("application/x-www-form-urlencoded") => {
            request.form = serde_urlencoded::from_bytes(body).map_err(RequestConversionError::Form)?;
        }
        Some(json) if !body.is_empty() && (json == "application/json" || json.ends_with("+json")) => {
            request.json_body = Some(serde_json::from_slice(body).map_err(RequestConversionError::Json)?);
        }
        _ => {}
    }
    Ok(request)
}

/// Turn the pipeline's buffered response into an axum response.
#[must_use]
pub fn convert_response(response: HttpResponse) -> Response {
    let HttpResponse {
        status,
        headers,
        content_type,
        body,
        ..
    } = response;

    let mut out = Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    if let Some(value) = content_type.and_then(|c| HeaderValue::from_str(&c).ok()) {
        out.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    out
}
