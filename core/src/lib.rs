//! # Composable MVC Core
//!
//! Core traits and types for the Composable MVC action pipeline.
//!
//! This crate describes everything a request meets between routing and
//! response: controllers and their descriptors, action selection, value
//! providers, model metadata and validation, the filter pipeline, action
//! results and view engines. It performs no I/O; the runtime crate drives
//! these pieces for each request.
//!
//! ## Core Concepts
//!
//! - **Controller**: A type whose actions are registered through an explicit descriptor
//! - **Selector**: Decides whether an action answers a name or an HTTP method
//! - **Value provider**: Supplies raw request values by key
//! - **Filter**: Authorization, action, result and exception hooks around an action
//! - **Validator**: Checks bound models and describes client-side rules
//! - **View engine**: Locates and renders views by name
//!
//! ## Example
//!
//! ```
//! use composable_mvc_core::prelude::*;
//! use std::any::Any;
//!
//! struct PingController;
//!
//! impl MvcFilter for PingController {}
//!
//! impl Controller for PingController {
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! impl PingController {
//!     fn ping(&self, _ctx: &mut ControllerContext) -> &'static str {
//!         "pong"
//!     }
//! }
//!
//! impl ControllerType for PingController {
//!     const NAME: &'static str = "Ping";
//!
//!     fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
//!         descriptor.action(ActionBuilder::new("Ping", Self::ping))
//!     }
//! }
//!
//! let descriptor = ControllerDescriptor::of::<PingController>();
//! assert_eq!(descriptor.actions()[0].action_name(), "Ping");
//! ```

// Re-export commonly used types
pub use serde_json::{Value, json};

/// Model binder abstraction and binding context
pub mod binding;

/// Thread-safe memoizing cache shared by the descriptor and dispatcher caches
pub mod cache;

/// Pipeline configuration
pub mod config;

/// Controllers and the per-request controller context
pub mod controller;

/// Service location
pub mod dependency;

/// Controller and action descriptors
pub mod descriptor;

/// Typed action invocation
pub mod dispatcher;

/// Pipeline errors
pub mod error;

/// Filter contracts, ordering and providers
pub mod filters;

/// Request, response and route data
pub mod http;

/// Model metadata
pub mod metadata;

/// Binding and validation errors keyed by model name
pub mod model_state;

/// Detection of potentially dangerous request input
pub mod request_validation;

/// Action results and their execution
pub mod results;

/// Action selectors
pub mod selectors;

/// Model validation
pub mod validation;

/// Value providers
pub mod value_providers;

/// View engines and view location
pub mod view;

/// Items needed to write controllers and filters.
pub mod prelude {
    pub use crate::controller::{
        Controller, ControllerContext, ControllerInstance, ControllerType, SessionStateBehavior,
        ViewDataDictionary,
    };
    pub use crate::descriptor::{
        ActionBuilder, ActionDescriptor, ControllerDescriptor, ControllerDescriptorBuilder,
        ParameterDescriptor,
    };
    pub use crate::error::{MvcError, MvcResult};
    pub use crate::filters::{
        ActionExecutedContext, ActionExecutingContext, ActionFilter, AuthorizationContext,
        AuthorizationFilter, ExceptionContext, ExceptionFilter, MvcFilter, ResultExecutedContext,
        ResultExecutingContext, ResultFilter,
    };
    pub use crate::http::{HttpRequest, HttpResponse, HttpVerbs, RequestContext, RouteData};
    pub use crate::metadata::{ModelKind, ModelMetadata};
    pub use crate::results::{ActionResult, ViewResult};
    pub use crate::selectors::SelectorAttribute;
    pub use crate::validation::DataAnnotation;
    pub use serde_json::{Value, json};
}
