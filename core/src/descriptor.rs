//! Controller, action and parameter descriptors.
//!
//! Descriptors are built once per controller type from its
//! [`ControllerType::describe`] registration and shared immutably afterwards
//! through the [`ControllerDescriptorCache`].

use crate::binding::ModelBinder;
use crate::cache::ReaderWriterCache;
use crate::controller::{Controller, ControllerContext, ControllerInstance, ControllerType, SessionStateBehavior};
use crate::dispatcher::{ActionFn, ActionMethod, TypedActionMethod};
use crate::error::MvcResult;
use crate::filters::MvcFilter;
use crate::http::HttpVerbs;
use crate::metadata::ModelMetadata;
use crate::selectors::{ActionSelector, SelectorAttribute};
use serde_json::Value;
use smallvec::SmallVec;
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

/// One action parameter.
#[derive(Clone)]
pub struct ParameterDescriptor {
    name: String,
    metadata: Arc<ModelMetadata>,
    binding_prefix: Option<String>,
    default_value: Option<Value>,
    binder: Option<Arc<dyn ModelBinder>>,
}

impl std::fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("metadata", &self.metadata.name())
            .field("binding_prefix", &self.binding_prefix)
            .field("default_value", &self.default_value)
            .field("custom_binder", &self.binder.is_some())
            .finish()
    }
}

impl ParameterDescriptor {
    /// A parameter bound by name.
    #[must_use]
    pub fn new(name: impl Into<String>, metadata: impl Into<Arc<ModelMetadata>>) -> Self {
        Self {
            name: name.into(),
            metadata: metadata.into(),
            binding_prefix: None,
            default_value: None,
            binder: None,
        }
    }

    /// Bind from `prefix` instead of the parameter name.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.binding_prefix = Some(prefix.into());
        self
    }

    /// Value used when nothing was bound.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Bind with `binder` instead of the default binder.
    #[must_use]
    pub fn with_binder(mut self, binder: Arc<dyn ModelBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Arc<ModelMetadata> {
        &self.metadata
    }

    /// Explicit binding prefix.
    #[must_use]
    pub fn binding_prefix(&self) -> Option<&str> {
        self.binding_prefix.as_deref()
    }

    /// Default value.
    #[must_use]
    pub const fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Custom binder.
    #[must_use]
    pub const fn binder(&self) -> Option<&Arc<dyn ModelBinder>> {
        self.binder.as_ref()
    }
}

/// One action of a controller type.
pub struct ActionDescriptor {
    unique_id: String,
    controller_type: TypeId,
    index: usize,
    action_name: String,
    controller_name: String,
    parameters: Vec<ParameterDescriptor>,
    selectors: SmallVec<[SelectorAttribute; 2]>,
    filters: Vec<Arc<dyn MvcFilter>>,
    controller_filters: Vec<Arc<dyn MvcFilter>>,
    validate_request: bool,
    method: Arc<dyn ActionMethod>,
}

impl std::fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("unique_id", &self.unique_id)
            .field("parameters", &self.parameters)
            .field("selectors", &self.selectors)
            .field("filters", &self.filters.iter().map(|f| f.filter_name()).collect::<Vec<_>>())
            .field("validate_request", &self.validate_request)
            .finish_non_exhaustive()
    }
}

impl ActionDescriptor {
    /// Id unique across all actions of all controllers.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// The owning controller type and the action's declaration index; unique
    /// per action across the process.
    #[must_use]
    pub const fn key(&self) -> (TypeId, usize) {
        (self.controller_type, self.index)
    }

    /// Action name (before any alias is applied).
    #[must_use]
    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    /// Owning controller's name.
    #[must_use]
    pub fn controller_name(&self) -> &str {
        &self.controller_name
    }

    /// Parameters in call order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Declared selectors.
    #[must_use]
    pub fn selectors(&self) -> &[SelectorAttribute] {
        &self.selectors
    }

    /// Filters declared on the action.
    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn MvcFilter>] {
        &self.filters
    }

    /// Filters declared on the owning controller.
    #[must_use]
    pub fn controller_filters(&self) -> &[Arc<dyn MvcFilter>] {
        &self.controller_filters
    }

    /// Whether request values are validated for dangerous input.
    #[must_use]
    pub const fn validate_request(&self) -> bool {
        self.validate_request
    }

    /// The registered function.
    #[must_use]
    pub const fn method(&self) -> &Arc<dyn ActionMethod> {
        &self.method
    }

    /// Whether the action declares a name selector.
    #[must_use]
    pub fn has_name_selectors(&self) -> bool {
        self.selectors.iter().any(|s| s.as_name_selector().is_some())
    }

    /// Whether the action declares a method selector.
    #[must_use]
    pub fn has_method_selectors(&self) -> bool {
        self.selectors.iter().any(|s| s.as_method_selector().is_some())
    }

    /// Whether the action answers to `name`: every name selector agrees, or,
    /// without name selectors, the action name matches case-insensitively.
    #[must_use]
    pub fn is_valid_name(&self, context: &ControllerContext, name: &str) -> bool {
        let mut name_selectors = self
            .selectors
            .iter()
            .filter_map(SelectorAttribute::as_name_selector)
            .peekable();
        if name_selectors.peek().is_none() {
            return self.action_name.eq_ignore_ascii_case(name);
        }
        name_selectors.all(|s| s.is_valid_name(context, name, self))
    }

    /// Whether every method selector accepts the request.
    #[must_use]
    pub fn is_valid_for_request(&self, context: &ControllerContext) -> bool {
        self.selectors
            .iter()
            .filter_map(SelectorAttribute::as_method_selector)
            .all(|s| s.is_valid_for_request(context, self))
    }
}

/// Registration-time builder for one action of controller `C`.
pub struct ActionBuilder<C> {
    action_name: String,
    method: Arc<dyn ActionMethod>,
    parameters: Vec<ParameterDescriptor>,
    selectors: SmallVec<[SelectorAttribute; 2]>,
    filters: Vec<Arc<dyn MvcFilter>>,
    validate_request: bool,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Controller> ActionBuilder<C> {
    /// An action named `action_name` implemented by `function`.
    #[must_use]
    pub fn new<Args, F>(action_name: impl Into<String>, function: F) -> Self
    where
        Args: 'static,
        F: ActionFn<C, Args>,
    {
        Self {
            action_name: action_name.into(),
            method: Arc::new(TypedActionMethod::<C, Args, F>::new(function)),
            parameters: Vec::new(),
            selectors: SmallVec::new(),
            filters: Vec::new(),
            validate_request: true,
            _controller: PhantomData,
        }
    }

    /// Append a parameter; parameters are bound in declaration order.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declare a selector.
    #[must_use]
    pub fn selector(mut self, selector: SelectorAttribute) -> Self {
        self.selectors.push(selector);
        self
    }

    /// Accept only the given verbs.
    #[must_use]
    pub fn accept_verbs(self, verbs: HttpVerbs) -> Self {
        self.selector(SelectorAttribute::accept_verbs(verbs))
    }

    /// Accept only GET.
    #[must_use]
    pub fn http_get(self) -> Self {
        self.selector(SelectorAttribute::http_get())
    }

    /// Accept only POST.
    #[must_use]
    pub fn http_post(self) -> Self {
        self.selector(SelectorAttribute::http_post())
    }

    /// Route the action under `alias` instead of its name.
    #[must_use]
    pub fn named(self, alias: impl Into<String>) -> Self {
        self.selector(SelectorAttribute::action_name(alias))
    }

    /// Exclude the action from selection.
    #[must_use]
    pub fn non_action(self) -> Self {
        self.selector(SelectorAttribute::NonAction)
    }

    /// Declare a filter on the action.
    #[must_use]
    pub fn filter(self, filter: impl MvcFilter + 'static) -> Self {
        self.filter_arc(Arc::new(filter))
    }

    /// Declare a shared filter on the action.
    #[must_use]
    pub fn filter_arc(mut self, filter: Arc<dyn MvcFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Turn request validation on or off for this action.
    #[must_use]
    pub const fn validate_request(mut self, enabled: bool) -> Self {
        self.validate_request = enabled;
        self
    }
}

/// One controller type.
pub struct ControllerDescriptor {
    controller_name: String,
    controller_type: TypeId,
    type_name: &'static str,
    actions: Vec<Arc<ActionDescriptor>>,
    filters: Vec<Arc<dyn MvcFilter>>,
    session_state: SessionStateBehavior,
}

impl std::fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("controller_name", &self.controller_name)
            .field("type_name", &self.type_name)
            .field("actions", &self.actions)
            .field("session_state", &self.session_state)
            .finish_non_exhaustive()
    }
}

impl ControllerDescriptor {
    /// Describe controller type `C`.
    #[must_use]
    pub fn of<C: ControllerType>() -> Self {
        C::describe(ControllerDescriptorBuilder::new()).build()
    }

    /// Controller name as routed.
    #[must_use]
    pub fn controller_name(&self) -> &str {
        &self.controller_name
    }

    /// `TypeId` of the controller type.
    #[must_use]
    pub const fn controller_type(&self) -> TypeId {
        self.controller_type
    }

    /// Rust type name of the controller.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Every registered action, including non-actions.
    #[must_use]
    pub fn actions(&self) -> &[Arc<ActionDescriptor>] {
        &self.actions
    }

    /// Filters declared on the controller.
    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn MvcFilter>] {
        &self.filters
    }

    /// Declared session-state behaviour.
    #[must_use]
    pub const fn session_state(&self) -> SessionStateBehavior {
        self.session_state
    }

    /// Select the action for `action_name` and the current request.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::MvcError::AmbiguousAction`] when several actions qualify.
    pub fn find_action(
        &self,
        context: &ControllerContext,
        action_name: &str,
    ) -> MvcResult<Option<Arc<ActionDescriptor>>> {
        ActionSelector::new(self).find_action(context, action_name)
    }
}

/// Registration-time builder for controller `C`.
pub struct ControllerDescriptorBuilder<C> {
    actions: Vec<ActionBuilder<C>>,
    filters: Vec<Arc<dyn MvcFilter>>,
    session_state: SessionStateBehavior,
}

impl<C> Default for ControllerDescriptorBuilder<C> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            filters: Vec::new(),
            session_state: SessionStateBehavior::Default,
        }
    }
}

impl<C: ControllerType> ControllerDescriptorBuilder<C> {
    /// An empty description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action.
    #[must_use]
    pub fn action(mut self, action: ActionBuilder<C>) -> Self {
        self.actions.push(action);
        self
    }

    /// Declare a filter on the controller.
    #[must_use]
    pub fn filter(self, filter: impl MvcFilter + 'static) -> Self {
        self.filter_arc(Arc::new(filter))
    }

    /// Declare a shared filter on the controller.
    #[must_use]
    pub fn filter_arc(mut self, filter: Arc<dyn MvcFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Declare the controller's session-state behaviour.
    #[must_use]
    pub const fn session_state(mut self, behavior: SessionStateBehavior) -> Self {
        self.session_state = behavior;
        self
    }

    /// Freeze the description.
    #[must_use]
    pub fn build(self) -> ControllerDescriptor {
        let type_name = std::any::type_name::<C>();
        let actions = self
            .actions
            .into_iter()
            .enumerate()
            .map(|(index, action)| {
                if action.parameters.len() != action.method.arity() {
                    tracing::warn!(
                        controller = C::NAME,
                        action = %action.action_name,
                        parameters = action.parameters.len(),
                        arity = action.method.arity(),
                        "declared parameters do not match the action's arity"
                    );
                }
                Arc::new(ActionDescriptor {
                    unique_id: format!("{type_name}::{}#{index}", action.action_name),
                    controller_type: TypeId::of::<C>(),
                    index,
                    action_name: action.action_name,
                    controller_name: C::NAME.to_string(),
                    parameters: action.parameters,
                    selectors: action.selectors,
                    filters: action.filters,
                    controller_filters: self.filters.clone(),
                    validate_request: action.validate_request,
                    method: action.method,
                })
            })
            .collect();

        ControllerDescriptor {
            controller_name: C::NAME.to_string(),
            controller_type: TypeId::of::<C>(),
            type_name,
            actions,
            filters: self.filters,
            session_state: self.session_state,
        }
    }
}

/// Controller descriptors keyed by controller type.
#[derive(Debug, Default)]
pub struct ControllerDescriptorCache {
    cache: ReaderWriterCache<TypeId, Arc<ControllerDescriptor>>,
}

impl ControllerDescriptorCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The descriptor for the controller's type, built on first use.
    #[must_use]
    pub fn get_descriptor(&self, controller: &ControllerInstance) -> Arc<ControllerDescriptor> {
        self.cache
            .fetch_or_create_item(controller.type_id(), || Arc::new(controller.describe()))
    }

    /// Number of cached descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
