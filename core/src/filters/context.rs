use crate::controller::ControllerContext;
use crate::descriptor::ActionDescriptor;
use crate::error::MvcError;
use crate::results::ActionResult;
use indexmap::IndexMap;
use serde_json::Value;

/// Passed to authorization filters.
pub struct AuthorizationContext<'a> {
    /// The request's controller context
    pub controller_context: &'a mut ControllerContext,
    /// The selected action
    pub action_descriptor: &'a ActionDescriptor,
    /// Set to short-circuit the request with this result
    pub result: Option<ActionResult>,
}

/// Passed to [`super::ActionFilter::on_action_executing`].
pub struct ActionExecutingContext<'a> {
    /// The request's controller context
    pub controller_context: &'a mut ControllerContext,
    /// The selected action
    pub action_descriptor: &'a ActionDescriptor,
    /// Bound arguments by parameter name; filters may replace them
    pub action_parameters: &'a mut IndexMap<String, Value>,
    /// Set to cancel the inner chain with this result
    pub result: Option<ActionResult>,
}

/// How an action (or the part of the action chain inside a filter) ended.
#[derive(Debug, Default)]
pub struct ActionOutcome {
    /// A filter's executing hook supplied the result
    pub canceled: bool,
    /// The failure, if the chain failed
    pub exception: Option<MvcError>,
    /// Whether an executed hook handled `exception`
    pub exception_handled: bool,
    /// Result to execute
    pub result: Option<ActionResult>,
}

impl ActionOutcome {
    /// The action ran to completion.
    #[must_use]
    pub const fn completed(result: Option<ActionResult>) -> Self {
        Self {
            canceled: false,
            exception: None,
            exception_handled: false,
            result,
        }
    }

    /// An executing hook supplied `result`.
    #[must_use]
    pub const fn canceled(result: Option<ActionResult>) -> Self {
        Self {
            canceled: true,
            exception: None,
            exception_handled: false,
            result,
        }
    }

    /// The chain failed with `error`.
    #[must_use]
    pub const fn failed(error: MvcError) -> Self {
        Self {
            canceled: false,
            exception: Some(error),
            exception_handled: false,
            result: None,
        }
    }

    /// Whether the outcome still carries an unhandled failure.
    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        self.exception.is_some() && !self.exception_handled
    }
}

/// Passed to [`super::ActionFilter::on_action_executed`].
pub struct ActionExecutedContext<'a> {
    /// The request's controller context
    pub controller_context: &'a mut ControllerContext,
    /// The selected action
    pub action_descriptor: &'a ActionDescriptor,
    /// Whether an executing hook canceled the inner chain
    pub canceled: bool,
    /// The failure from the inner chain, if any
    pub exception: Option<MvcError>,
    /// Set to stop `exception` propagating
    pub exception_handled: bool,
    /// Result to execute; may be replaced
    pub result: Option<ActionResult>,
}

impl<'a> ActionExecutedContext<'a> {
    /// Build the context from an inner outcome.
    #[must_use]
    pub fn new(
        controller_context: &'a mut ControllerContext,
        action_descriptor: &'a ActionDescriptor,
        outcome: ActionOutcome,
    ) -> Self {
        Self {
            controller_context,
            action_descriptor,
            canceled: outcome.canceled,
            exception: outcome.exception,
            exception_handled: outcome.exception_handled,
            result: outcome.result,
        }
    }

    /// The outcome after the hook ran.
    #[must_use]
    pub fn into_outcome(self) -> ActionOutcome {
        ActionOutcome {
            canceled: self.canceled,
            exception: self.exception,
            exception_handled: self.exception_handled,
            result: self.result,
        }
    }
}

/// Passed to [`super::ResultFilter::on_result_executing`].
pub struct ResultExecutingContext<'a> {
    /// The request's controller context
    pub controller_context: &'a mut ControllerContext,
    /// The result about to execute; may be replaced
    pub result: ActionResult,
    /// Set to skip result execution and the inner chain
    pub cancel: bool,
}

/// How result execution (or the part of the chain inside a filter) ended.
#[derive(Debug)]
pub struct ResultOutcome {
    /// The result that ran, or would have
    pub result: ActionResult,
    /// A filter's executing hook canceled execution
    pub canceled: bool,
    /// The failure, if the chain failed
    pub exception: Option<MvcError>,
    /// Whether an executed hook handled `exception`
    pub exception_handled: bool,
}

impl ResultOutcome {
    /// The result executed.
    #[must_use]
    pub const fn completed(result: ActionResult) -> Self {
        Self {
            result,
            canceled: false,
            exception: None,
            exception_handled: false,
        }
    }

    /// An executing hook canceled execution.
    #[must_use]
    pub const fn canceled(result: ActionResult) -> Self {
        Self {
            result,
            canceled: true,
            exception: None,
            exception_handled: false,
        }
    }

    /// Execution failed with `error`.
    #[must_use]
    pub const fn failed(result: ActionResult, error: MvcError) -> Self {
        Self {
            result,
            canceled: false,
            exception: Some(error),
            exception_handled: false,
        }
    }

    /// Whether the outcome still carries an unhandled failure.
    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        self.exception.is_some() && !self.exception_handled
    }
}

/// Passed to [`super::ResultFilter::on_result_executed`].
pub struct ResultExecutedContext<'a> {
    /// The request's controller context
    pub controller_context: &'a mut ControllerContext,
    /// The result that ran, or would have
    pub result: ActionResult,
    /// Whether an executing hook canceled execution
    pub canceled: bool,
    /// The failure from the inner chain, if any
    pub exception: Option<MvcError>,
    /// Set to stop `exception` propagating
    pub exception_handled: bool,
}

impl<'a> ResultExecutedContext<'a> {
    /// Build the context from an inner outcome.
    #[must_use]
    pub fn new(controller_context: &'a mut ControllerContext, outcome: ResultOutcome) -> Self {
        Self {
            controller_context,
            result: outcome.result,
            canceled: outcome.canceled,
            exception: outcome.exception,
            exception_handled: outcome.exception_handled,
        }
    }

    /// The outcome after the hook ran.
    #[must_use]
    pub fn into_outcome(self) -> ResultOutcome {
        ResultOutcome {
            result: self.result,
            canceled: self.canceled,
            exception: self.exception,
            exception_handled: self.exception_handled,
        }
    }
}

/// Passed to exception filters.
pub struct ExceptionContext<'a> {
    /// The request's controller context
    pub controller_context: &'a mut ControllerContext,
    /// The selected action
    pub action_descriptor: &'a ActionDescriptor,
    /// The failure
    pub exception: MvcError,
    /// Set to stop the failure propagating
    pub exception_handled: bool,
    /// Result to execute once handled; empty when unset
    pub result: Option<ActionResult>,
}
