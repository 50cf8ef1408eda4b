use super::{
    AuthorizationContext, AuthorizationFilter, ExceptionContext, ExceptionFilter, MvcFilter,
};
use crate::results::{ActionResult, ViewResult};
use http::{Method, StatusCode, header};
use serde_json::json;

/// Requires an authenticated user, optionally restricted to named users or roles.
///
/// Unauthorized requests are short-circuited with a 401 result.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeFilter {
    users: Vec<String>,
    roles: Vec<String>,
    order: Option<i32>,
}

impl AuthorizeFilter {
    /// Any authenticated user.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the named users (case-insensitive).
    #[must_use]
    pub fn users(mut self, users: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }

    /// Only users in at least one of the roles.
    #[must_use]
    pub fn roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Explicit order within the filter's scope.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    fn authorize_core(&self, context: &AuthorizationContext<'_>) -> bool {
        let Some(user) = context.controller_context.request().user.as_ref() else {
            return false;
        };
        if !self.users.is_empty() && !self.users.iter().any(|u| u.eq_ignore_ascii_case(&user.name)) {
            return false;
        }
        self.roles.is_empty() || self.roles.iter().any(|r| user.is_in_role(r))
    }
}

impl MvcFilter for AuthorizeFilter {
    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        Some(self)
    }

    fn order(&self) -> i32 {
        self.order.unwrap_or(super::DEFAULT_ORDER)
    }
}

impl AuthorizationFilter for AuthorizeFilter {
    fn on_authorization(&self, context: &mut AuthorizationContext<'_>) -> anyhow::Result<()> {
        if !self.authorize_core(context) {
            tracing::debug!(
                action = context.action_descriptor.unique_id(),
                "authorization denied"
            );
            context.result = Some(ActionResult::http_unauthorized());
        }
        Ok(())
    }
}

/// Forces requests onto HTTPS: GET requests are redirected, other verbs get 403.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireHttpsFilter;

impl MvcFilter for RequireHttpsFilter {
    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        Some(self)
    }

    fn allow_multiple(&self) -> bool {
        false
    }
}

impl AuthorizationFilter for RequireHttpsFilter {
    fn on_authorization(&self, context: &mut AuthorizationContext<'_>) -> anyhow::Result<()> {
        let request = context.controller_context.request();
        if request.is_secure {
            return Ok(());
        }
        if request.method != Method::GET {
            context.result = Some(ActionResult::status_with_description(
                StatusCode::FORBIDDEN,
                "The requested resource can only be accessed via SSL.",
            ));
            return Ok(());
        }
        let host = request
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        let mut url = format!("https://{host}{}", request.path);
        if !request.query.is_empty() {
            url.push('?');
            url.push_str(&serde_urlencoded::to_string(&request.query)?);
        }
        context.result = Some(ActionResult::redirect(url));
        Ok(())
    }
}

/// Makes an action reachable only as a child action.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildActionOnlyFilter;

impl MvcFilter for ChildActionOnlyFilter {
    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        Some(self)
    }

    fn allow_multiple(&self) -> bool {
        false
    }
}

impl AuthorizationFilter for ChildActionOnlyFilter {
    fn on_authorization(&self, context: &mut AuthorizationContext<'_>) -> anyhow::Result<()> {
        if !context.controller_context.is_child_action() {
            context.result = Some(ActionResult::http_not_found());
        }
        Ok(())
    }
}

/// Renders an error view with status 500 for unhandled failures.
///
/// The view model carries the controller name, action name and error message.
/// Failures inside child actions are left to the parent request.
#[derive(Debug, Clone)]
pub struct HandleErrorFilter {
    view: String,
    master: Option<String>,
    order: Option<i32>,
}

impl Default for HandleErrorFilter {
    fn default() -> Self {
        Self {
            view: "Error".to_string(),
            master: None,
            order: None,
        }
    }
}

impl HandleErrorFilter {
    /// Render the `Error` view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `view` instead.
    #[must_use]
    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = view.into();
        self
    }

    /// Render inside `master`.
    #[must_use]
    pub fn master(mut self, master: impl Into<String>) -> Self {
        self.master = Some(master.into());
        self
    }

    /// Explicit order within the filter's scope.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

impl MvcFilter for HandleErrorFilter {
    fn as_exception_filter(&self) -> Option<&dyn ExceptionFilter> {
        Some(self)
    }

    fn order(&self) -> i32 {
        self.order.unwrap_or(super::DEFAULT_ORDER)
    }
}

impl ExceptionFilter for HandleErrorFilter {
    fn on_exception(&self, context: &mut ExceptionContext<'_>) -> anyhow::Result<()> {
        if context.exception_handled || context.controller_context.is_child_action() {
            return Ok(());
        }
        let model = json!({
            "controller": context.action_descriptor.controller_name(),
            "action": context.action_descriptor.action_name(),
            "message": context.exception.to_string(),
        });
        let mut view = ViewResult::named(self.view.clone()).with_model(model);
        if let Some(master) = &self.master {
            view = view.with_master(master.clone());
        }
        context.result = Some(ActionResult::View(view));
        context.exception_handled = true;
        context.controller_context.response.status = StatusCode::INTERNAL_SERVER_ERROR;
        Ok(())
    }
}
