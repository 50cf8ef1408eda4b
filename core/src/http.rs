//! Host-neutral request and response abstractions.
//!
//! The pipeline never talks to a concrete HTTP server. A host adapter (see the
//! `composable-mvc-web` crate) converts its own request type into an
//! [`HttpRequest`], supplies the routed [`RouteData`], and turns the buffered
//! [`HttpResponse`] back into its own response type.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying a verb override for clients that can only send GET/POST.
pub const HTTP_METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

bitflags! {
    /// Set of HTTP verbs an action accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HttpVerbs: u16 {
        /// GET
        const GET = 1;
        /// POST
        const POST = 1 << 1;
        /// PUT
        const PUT = 1 << 2;
        /// DELETE
        const DELETE = 1 << 3;
        /// HEAD
        const HEAD = 1 << 4;
        /// PATCH
        const PATCH = 1 << 5;
        /// OPTIONS
        const OPTIONS = 1 << 6;
    }
}

impl HttpVerbs {
    /// Upper-case verb names contained in the set, in declaration order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::GET, "GET"),
            (Self::POST, "POST"),
            (Self::PUT, "PUT"),
            (Self::DELETE, "DELETE"),
            (Self::HEAD, "HEAD"),
            (Self::PATCH, "PATCH"),
            (Self::OPTIONS, "OPTIONS"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

/// A file uploaded with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedFile {
    /// Client-supplied file name
    pub file_name: String,
    /// Declared content type
    pub content_type: String,
    /// File contents
    pub content: Vec<u8>,
}

/// The authenticated user, as established by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    /// User name
    pub name: String,
    /// Roles the user belongs to
    pub roles: Vec<String>,
}

impl Principal {
    /// Create a principal with the given name and roles.
    #[must_use]
    pub fn new(name: impl Into<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Case-insensitive role membership test.
    #[must_use]
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// An incoming request as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method
    pub method: Method,
    /// Absolute path (no query string)
    pub path: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Decoded query string pairs, in order
    pub query: Vec<(String, String)>,
    /// Decoded form pairs, in order
    pub form: Vec<(String, String)>,
    /// Uploaded files keyed by form field name
    pub files: Vec<(String, PostedFile)>,
    /// Parsed JSON body, when the request carried one
    pub json_body: Option<Value>,
    /// Authenticated user
    pub user: Option<Principal>,
    /// Whether the request arrived over TLS
    pub is_secure: bool,
    /// When the host received the request
    pub received_at: DateTime<Utc>,
}

impl HttpRequest {
    /// Create a request with the given method and path.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            form: Vec::new(),
            files: Vec::new(),
            json_body: None,
            user: None,
            is_secure: false,
            received_at: Utc::now(),
        }
    }

    /// Add a query string pair.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a form pair.
    #[must_use]
    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Add an uploaded file.
    #[must_use]
    pub fn with_file(mut self, key: impl Into<String>, file: PostedFile) -> Self {
        self.files.push((key.into(), file));
        self
    }

    /// Attach a JSON body and the matching content type.
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.json_body = Some(body);
        self
    }

    /// Add a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Set the authenticated user.
    #[must_use]
    pub fn with_user(mut self, user: Principal) -> Self {
        self.user = Some(user);
        self
    }

    /// Mark the request as received over TLS.
    #[must_use]
    pub const fn secure(mut self, is_secure: bool) -> Self {
        self.is_secure = is_secure;
        self
    }

    /// Override the receive timestamp.
    #[must_use]
    pub const fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }

    /// The `Content-Type` header, if present and readable.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Whether the request declares a JSON body.
    #[must_use]
    pub fn has_json_content(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"))
    }

    /// The verb the client intends, honouring a method override on POST.
    ///
    /// The override is read from the `X-HTTP-Method-Override` header, then from
    /// a form field of the same name. Overrides to GET or POST are ignored.
    #[must_use]
    pub fn http_method_override(&self) -> Method {
        if self.method != Method::POST {
            return self.method.clone();
        }
        let requested = self
            .headers
            .get(HTTP_METHOD_OVERRIDE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| {
                self.form
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(HTTP_METHOD_OVERRIDE_HEADER))
                    .map(|(_, v)| v.clone())
            });
        match requested.and_then(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok()) {
            Some(method) if method != Method::GET && method != Method::POST => method,
            _ => self.method.clone(),
        }
    }
}

/// Buffered response produced by executing a result.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,
    /// Optional status description
    pub status_description: Option<String>,
    /// Response headers
    pub headers: HeaderMap,
    /// Content type of the body
    pub content_type: Option<String>,
    /// Body bytes
    pub body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            status_description: None,
            headers: HeaderMap::new(),
            content_type: None,
            body: Vec::new(),
        }
    }
}

impl HttpResponse {
    /// Append text to the body.
    pub fn write(&mut self, text: &str) {
        self.body.extend_from_slice(text.as_bytes());
    }

    /// Body interpreted as UTF-8 (lossy).
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Set a header. Invalid values are ignored.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
    }
}

/// Values produced by the external router.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteData {
    values: IndexMap<String, Value>,
}

impl RouteData {
    /// Route data with `controller` and `action` values set.
    #[must_use]
    pub fn for_action(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::default()
            .with_value("controller", Value::String(controller.into()))
            .with_value("action", Value::String(action.into()))
    }

    /// Add a route value. Keys are compared case-insensitively.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a route value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let existing = self
            .values
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&key))
            .cloned();
        match existing {
            Some(existing) => {
                self.values.insert(existing, value.into());
            }
            None => {
                self.values.insert(key, value.into());
            }
        }
    }

    /// Look up a route value case-insensitively.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Look up a route value rendered as a string; empty strings count as missing.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// All route values in insertion order.
    #[must_use]
    pub const fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }
}

/// Everything the pipeline knows about one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The request
    pub request: HttpRequest,
    /// Routed values
    pub route_data: RouteData,
    /// Values passed explicitly to a child action
    pub child_action_values: Option<IndexMap<String, Value>>,
    /// Correlation id assigned by the host, if any
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Create a context for a routed request.
    #[must_use]
    pub const fn new(request: HttpRequest, route_data: RouteData) -> Self {
        Self {
            request,
            route_data,
            child_action_values: None,
            request_id: None,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Whether this context executes a child action.
    #[must_use]
    pub const fn is_child_action(&self) -> bool {
        self.child_action_values.is_some()
    }
}
