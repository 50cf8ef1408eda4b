//! Error types for the action pipeline.
//!
//! Every failure the pipeline can surface to the host is a variant of
//! [`MvcError`]. Failures raised by user code (filters, actions) are carried
//! as `anyhow::Error` sources so their original context survives.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors produced while selecting, binding, invoking or rendering an action.
#[derive(Error, Debug)]
pub enum MvcError {
    /// A required argument was missing or empty.
    #[error("argument `{name}` is invalid: {message}")]
    Argument {
        /// Name of the offending argument
        name: &'static str,
        /// What was wrong with it
        message: String,
    },

    /// The route data did not carry a required value.
    #[error("route value `{0}` is required but was not supplied")]
    MissingRouteValue(String),

    /// No controller is registered under the requested name.
    #[error("controller `{0}` was not found")]
    ControllerNotFound(String),

    /// No action on the controller is eligible for the request.
    #[error("action `{action}` was not found on controller `{controller}`")]
    ActionNotFound {
        /// Controller name from the route
        controller: String,
        /// Action name from the route
        action: String,
    },

    /// More than one action is eligible for the request.
    #[error(
        "the request for action `{action}` on controller `{controller}` is ambiguous between: {}",
        candidates.join(", ")
    )]
    AmbiguousAction {
        /// Controller name from the route
        controller: String,
        /// Action name from the route
        action: String,
        /// Unique ids of every eligible action
        candidates: Vec<String>,
    },

    /// The controller instance handed to a dispatcher is not of the registered type.
    #[error("controller instance is not a `{expected}`")]
    ControllerTypeMismatch {
        /// Type name the dispatcher was registered for
        expected: &'static str,
    },

    /// The number of bound arguments does not match the action signature.
    #[error("action `{action}` expects {expected} arguments but received {actual}")]
    ArgumentCount {
        /// Action unique id
        action: String,
        /// Arity of the registered function
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// A bound argument could not be converted to the parameter type.
    #[error("argument {index} of action `{action}` could not be converted: {source}")]
    ArgumentConversion {
        /// Action unique id
        action: String,
        /// Zero-based parameter position
        index: usize,
        /// Deserialization failure
        #[source]
        source: serde_json::Error,
    },

    /// A request value looked like markup or script and validation was enabled.
    #[error("a potentially dangerous value was detected from the client ({key})")]
    RequestValidation {
        /// Key of the rejected value
        key: String,
    },

    /// No view engine could locate the requested view.
    #[error("view `{name}` was not found; searched: {}", searched_locations.join(", "))]
    ViewNotFound {
        /// Requested view name
        name: String,
        /// Every location the engines probed
        searched_locations: Vec<String>,
    },

    /// A view failed while rendering.
    #[error("view rendering failed: {0}")]
    Render(String),

    /// A filter hook returned an error.
    #[error("filter `{filter}` failed: {source}")]
    Filter {
        /// Type name of the failing filter
        filter: &'static str,
        /// Error raised by the filter
        #[source]
        source: anyhow::Error,
    },

    /// The action body returned an error.
    #[error("action `{action}` failed: {source}")]
    Action {
        /// Action unique id
        action: String,
        /// Error raised by the action
        #[source]
        source: anyhow::Error,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MvcError {
    /// Build an [`MvcError::Argument`] for an empty or missing argument.
    #[must_use]
    pub fn argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::Argument {
            name,
            message: message.into(),
        }
    }

    /// Wrap an error raised by a filter hook.
    #[must_use]
    pub const fn filter(filter: &'static str, source: anyhow::Error) -> Self {
        Self::Filter { filter, source }
    }

    /// Whether this error means "nothing matched the request" and should map to a 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ControllerNotFound(_) | Self::ActionNotFound { .. }
        )
    }
}

/// Result alias used throughout the pipeline.
pub type MvcResult<T> = Result<T, MvcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = MvcError::AmbiguousAction {
            controller: "Home".to_string(),
            action: "Index".to_string(),
            candidates: vec!["Home::Index#0".to_string(), "Home::Index#1".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "the request for action `Index` on controller `Home` is ambiguous between: Home::Index#0, Home::Index#1"
        );
    }

    #[test]
    fn test_not_found_kinds() {
        assert!(MvcError::ControllerNotFound("Nope".to_string()).is_not_found());
        assert!(
            MvcError::ActionNotFound {
                controller: "Home".to_string(),
                action: "Nope".to_string()
            }
            .is_not_found()
        );
        assert!(!MvcError::Render("boom".to_string()).is_not_found());
    }
}
