//! Action selection.
//!
//! Selectors are declared per action. Name selectors decide which names an
//! action answers to; method selectors decide whether it may handle the
//! current request. [`ActionSelector`] applies both to a controller's actions.

use crate::controller::ControllerContext;
use crate::descriptor::{ActionDescriptor, ControllerDescriptor};
use crate::error::{MvcError, MvcResult};
use crate::http::HttpVerbs;
use http::Method;
use std::sync::Arc;

/// Decides whether an action may handle the current request.
pub trait ActionMethodSelector: Send + Sync {
    /// `true` when the action is eligible.
    fn is_valid_for_request(&self, context: &ControllerContext, action: &ActionDescriptor) -> bool;
}

/// Decides whether an action answers to a requested name.
pub trait ActionNameSelector: Send + Sync {
    /// `true` when the action answers to `action_name`.
    fn is_valid_name(&self, context: &ControllerContext, action_name: &str, action: &ActionDescriptor) -> bool;
}

/// Accepts requests whose (possibly overridden) verb is in a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptVerbs {
    verbs: HttpVerbs,
}

impl AcceptVerbs {
    /// Accept `verbs`.
    #[must_use]
    pub const fn new(verbs: HttpVerbs) -> Self {
        Self { verbs }
    }

    /// The accepted verbs.
    #[must_use]
    pub const fn verbs(&self) -> HttpVerbs {
        self.verbs
    }

    fn verb_of(method: &Method) -> Option<HttpVerbs> {
        [
            (Method::GET, HttpVerbs::GET),
            (Method::POST, HttpVerbs::POST),
            (Method::PUT, HttpVerbs::PUT),
            (Method::DELETE, HttpVerbs::DELETE),
            (Method::HEAD, HttpVerbs::HEAD),
            (Method::PATCH, HttpVerbs::PATCH),
            (Method::OPTIONS, HttpVerbs::OPTIONS),
        ]
        .into_iter()
        .find_map(|(m, verb)| (m == *method).then_some(verb))
    }
}

impl ActionMethodSelector for AcceptVerbs {
    fn is_valid_for_request(&self, context: &ControllerContext, _action: &ActionDescriptor) -> bool {
        let method = context.request().http_method_override();
        Self::verb_of(&method).is_some_and(|verb| self.verbs.contains(verb))
    }
}

/// Excludes an action from selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonAction;

impl ActionMethodSelector for NonAction {
    fn is_valid_for_request(&self, _context: &ControllerContext, _action: &ActionDescriptor) -> bool {
        false
    }
}

/// Routes an action under an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionNameAlias {
    name: String,
}

impl ActionNameAlias {
    /// Alias `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The alias.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ActionNameSelector for ActionNameAlias {
    fn is_valid_name(&self, _context: &ControllerContext, action_name: &str, _action: &ActionDescriptor) -> bool {
        self.name.eq_ignore_ascii_case(action_name)
    }
}

/// The selectors an action can declare.
#[derive(Clone)]
pub enum SelectorAttribute {
    /// Verb restriction
    AcceptVerbs(AcceptVerbs),
    /// Never selectable
    NonAction,
    /// Name alias
    ActionName(ActionNameAlias),
    /// User-defined method selector
    Custom(Arc<dyn ActionMethodSelector>),
    /// User-defined name selector
    CustomName(Arc<dyn ActionNameSelector>),
}

impl std::fmt::Debug for SelectorAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptVerbs(verbs) => f.debug_tuple("AcceptVerbs").field(&verbs.verbs().names()).finish(),
            Self::NonAction => f.write_str("NonAction"),
            Self::ActionName(alias) => f.debug_tuple("ActionName").field(&alias.name()).finish(),
            Self::Custom(_) => f.write_str("Custom"),
            Self::CustomName(_) => f.write_str("CustomName"),
        }
    }
}

impl SelectorAttribute {
    /// Accept `verbs`.
    #[must_use]
    pub const fn accept_verbs(verbs: HttpVerbs) -> Self {
        Self::AcceptVerbs(AcceptVerbs::new(verbs))
    }

    /// GET only.
    #[must_use]
    pub const fn http_get() -> Self {
        Self::accept_verbs(HttpVerbs::GET)
    }

    /// POST only.
    #[must_use]
    pub const fn http_post() -> Self {
        Self::accept_verbs(HttpVerbs::POST)
    }

    /// PUT only.
    #[must_use]
    pub const fn http_put() -> Self {
        Self::accept_verbs(HttpVerbs::PUT)
    }

    /// DELETE only.
    #[must_use]
    pub const fn http_delete() -> Self {
        Self::accept_verbs(HttpVerbs::DELETE)
    }

    /// HEAD only.
    #[must_use]
    pub const fn http_head() -> Self {
        Self::accept_verbs(HttpVerbs::HEAD)
    }

    /// PATCH only.
    #[must_use]
    pub const fn http_patch() -> Self {
        Self::accept_verbs(HttpVerbs::PATCH)
    }

    /// OPTIONS only.
    #[must_use]
    pub const fn http_options() -> Self {
        Self::accept_verbs(HttpVerbs::OPTIONS)
    }

    /// Alias the action as `name`.
    #[must_use]
    pub fn action_name(name: impl Into<String>) -> Self {
        Self::ActionName(ActionNameAlias::new(name))
    }

    /// A user-defined method selector.
    #[must_use]
    pub fn custom(selector: impl ActionMethodSelector + 'static) -> Self {
        Self::Custom(Arc::new(selector))
    }

    /// A user-defined name selector.
    #[must_use]
    pub fn custom_name(selector: impl ActionNameSelector + 'static) -> Self {
        Self::CustomName(Arc::new(selector))
    }

    /// The method-selector behaviour, if this is a method selector.
    #[must_use]
    pub fn as_method_selector(&self) -> Option<&dyn ActionMethodSelector> {
        match self {
            Self::AcceptVerbs(verbs) => Some(verbs),
            Self::NonAction => Some(&NonAction),
            Self::Custom(selector) => Some(selector.as_ref()),
            Self::ActionName(_) | Self::CustomName(_) => None,
        }
    }

    /// The name-selector behaviour, if this is a name selector.
    #[must_use]
    pub fn as_name_selector(&self) -> Option<&dyn ActionNameSelector> {
        match self {
            Self::ActionName(alias) => Some(alias),
            Self::CustomName(selector) => Some(selector.as_ref()),
            Self::AcceptVerbs(_) | Self::NonAction | Self::Custom(_) => None,
        }
    }
}

/// Picks the single action of a controller that handles a request.
#[derive(Debug, Clone, Copy)]
pub struct ActionSelector<'a> {
    descriptor: &'a ControllerDescriptor,
}

impl<'a> ActionSelector<'a> {
    /// A selector over `descriptor`'s actions.
    #[must_use]
    pub const fn new(descriptor: &'a ControllerDescriptor) -> Self {
        Self { descriptor }
    }

    /// Select the action for `action_name`.
    ///
    /// Actions that declare method selectors and accept the request win over
    /// actions that declare none.
    ///
    /// # Errors
    ///
    /// Returns [`MvcError::AmbiguousAction`] when more than one action remains.
    pub fn find_action(
        &self,
        context: &ControllerContext,
        action_name: &str,
    ) -> MvcResult<Option<Arc<ActionDescriptor>>> {
        let named = self
            .descriptor
            .actions()
            .iter()
            .filter(|a| a.is_valid_name(context, action_name));

        let mut with_selectors: Vec<&Arc<ActionDescriptor>> = Vec::new();
        let mut without_selectors: Vec<&Arc<ActionDescriptor>> = Vec::new();
        for action in named {
            if action.has_method_selectors() {
                if action.is_valid_for_request(context) {
                    with_selectors.push(action);
                }
            } else {
                without_selectors.push(action);
            }
        }

        let candidates = if with_selectors.is_empty() {
            without_selectors
        } else {
            with_selectors
        };

        match candidates.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(Arc::clone(single))),
            many => Err(MvcError::AmbiguousAction {
                controller: self.descriptor.controller_name().to_string(),
                action: action_name.to_string(),
                candidates: many.iter().map(|a| a.unique_id().to_string()).collect(),
            }),
        }
    }
}
