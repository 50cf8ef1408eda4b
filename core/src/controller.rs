//! Controllers and the per-request controller context.
//!
//! A controller is any `Send + Sync` type implementing [`Controller`]. Its
//! actions are registered explicitly through [`ControllerType::describe`],
//! which replaces runtime reflection: the description lists each action, the
//! function that implements it, its parameters, selectors and filters.
//!
//! A controller may also act as a filter for its own actions by overriding the
//! capability accessors of [`MvcFilter`]; it then runs outermost.
//!
//! # Example
//!
//! ```
//! use composable_mvc_core::prelude::*;
//! use std::any::Any;
//!
//! struct HomeController;
//!
//! impl MvcFilter for HomeController {}
//!
//! impl Controller for HomeController {
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! impl HomeController {
//!     fn index(&self, _ctx: &mut ControllerContext) -> ActionResult {
//!         ActionResult::content("welcome")
//!     }
//! }
//!
//! impl ControllerType for HomeController {
//!     const NAME: &'static str = "Home";
//!
//!     fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
//!         descriptor.action(ActionBuilder::new("Index", Self::index).http_get())
//!     }
//! }
//!
//! let descriptor = ControllerDescriptor::of::<HomeController>();
//! assert_eq!(descriptor.controller_name(), "Home");
//! assert_eq!(descriptor.actions().len(), 1);
//! ```

use crate::descriptor::{ControllerDescriptor, ControllerDescriptorBuilder};
use crate::filters::MvcFilter;
use crate::http::{HttpRequest, HttpResponse, RequestContext, RouteData};
use crate::model_state::ModelStateDictionary;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// A controller instance.
pub trait Controller: MvcFilter + Any {
    /// `self` as `Any`, for typed dispatch.
    fn as_any(&self) -> &dyn Any;
}

/// A controller type with a registration-time description of its actions.
pub trait ControllerType: Controller + Sized {
    /// Name the router uses for this controller, e.g. `Home`.
    const NAME: &'static str;

    /// Describe the controller's actions, filters and session behaviour.
    fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self>;
}

/// Session-state requirements a controller declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStateBehavior {
    /// Let the host decide
    #[default]
    Default,
    /// Full read/write session access
    Required,
    /// Read-only session access
    ReadOnly,
    /// No session access
    Disabled,
}

/// A type-erased controller instance together with how to describe its type.
#[derive(Clone)]
pub struct ControllerInstance {
    instance: Arc<dyn Controller>,
    type_id: TypeId,
    type_name: &'static str,
    controller_name: &'static str,
    describe: fn() -> ControllerDescriptor,
}

impl std::fmt::Debug for ControllerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerInstance")
            .field("type_name", &self.type_name)
            .field("controller_name", &self.controller_name)
            .finish_non_exhaustive()
    }
}

impl ControllerInstance {
    /// Wrap a controller value.
    #[must_use]
    pub fn new<C: ControllerType>(controller: C) -> Self {
        Self::from_arc(Arc::new(controller))
    }

    /// Wrap a shared controller.
    #[must_use]
    pub fn from_arc<C: ControllerType>(controller: Arc<C>) -> Self {
        Self {
            instance: controller,
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            controller_name: C::NAME,
            describe: ControllerDescriptor::of::<C>,
        }
    }

    /// The controller.
    #[must_use]
    pub fn instance(&self) -> &Arc<dyn Controller> {
        &self.instance
    }

    /// `TypeId` of the concrete controller type.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the concrete controller type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The controller's registered name ([`ControllerType::NAME`]), whatever
    /// casing the route used.
    #[must_use]
    pub const fn controller_name(&self) -> &'static str {
        self.controller_name
    }

    /// Build a fresh description of the controller type.
    #[must_use]
    pub fn describe(&self) -> ControllerDescriptor {
        (self.describe)()
    }
}

/// Data passed from an action to its view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewDataDictionary {
    /// The view model
    pub model: Option<Value>,
    values: IndexMap<String, Value>,
}

impl ViewDataDictionary {
    /// Set a named value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.values.insert(key.into(), value);
    }

    /// Read a named value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// All named values in insertion order.
    #[must_use]
    pub const fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }
}

/// Everything known about a request once its controller exists.
#[derive(Debug)]
pub struct ControllerContext {
    /// Request and routing information
    pub request_context: RequestContext,
    /// Controller name as routed
    pub controller_name: String,
    /// The controller handling the request
    pub controller: ControllerInstance,
    /// Data for the view
    pub view_data: ViewDataDictionary,
    /// Attempted values and errors from binding
    pub model_state: ModelStateDictionary,
    /// Buffered response
    pub response: HttpResponse,
    /// Session requirements declared by the controller
    pub session_state: SessionStateBehavior,
}

impl ControllerContext {
    /// Create a context for `controller`.
    #[must_use]
    pub fn new(
        request_context: RequestContext,
        controller_name: impl Into<String>,
        controller: ControllerInstance,
    ) -> Self {
        Self {
            request_context,
            controller_name: controller_name.into(),
            controller,
            view_data: ViewDataDictionary::default(),
            model_state: ModelStateDictionary::new(),
            response: HttpResponse::default(),
            session_state: SessionStateBehavior::Default,
        }
    }

    /// The request.
    #[must_use]
    pub const fn request(&self) -> &HttpRequest {
        &self.request_context.request
    }

    /// The route values.
    #[must_use]
    pub const fn route_data(&self) -> &RouteData {
        &self.request_context.route_data
    }

    /// Whether this context executes a child action.
    #[must_use]
    pub const fn is_child_action(&self) -> bool {
        self.request_context.is_child_action()
    }
}
