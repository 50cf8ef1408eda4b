//! The controller action invoker: selection, binding and the filter pipeline.
//!
//! For one request the invoker
//!
//! 1. selects the action from the controller's cached descriptor,
//! 2. collects and sorts the applicable filters,
//! 3. runs authorization filters, any of which may substitute a result,
//! 4. binds the action's parameters,
//! 5. runs the action inside the action filters,
//! 6. executes the result inside the result filters,
//! 7. offers any failure from steps 3 to 6 to the exception filters.
//!
//! Action and result filters nest: executing hooks run outer to inner and
//! executed hooks inner to outer. A failure inside the chain is delivered to
//! every executed hook that was entered, and a hook may mark it handled.

use crate::binder::DefaultModelBinder;
use crate::metrics::PipelineMetrics;
use composable_mvc_core::binding::{ModelBinder, ModelBindingContext};
use composable_mvc_core::controller::ControllerContext;
use composable_mvc_core::descriptor::{ActionDescriptor, ControllerDescriptorCache};
use composable_mvc_core::dispatcher::ActionMethodDispatcherCache;
use composable_mvc_core::error::{MvcError, MvcResult};
use composable_mvc_core::filters::{
    ActionExecutedContext, ActionExecutingContext, ActionOutcome, AuthorizationContext,
    ExceptionContext, FilterInfo, FilterProviderCollection, GlobalFilterCollection, MvcFilter,
    ResultExecutedContext, ResultExecutingContext, ResultOutcome,
};
use composable_mvc_core::results::ActionResult;
use composable_mvc_core::value_providers::ValueProviderFactoryCollection;
use composable_mvc_core::view::ViewEngineCollection;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

type Filters = [Arc<dyn MvcFilter>];

/// Runs actions for controller contexts.
#[derive(Clone)]
pub struct ControllerActionInvoker {
    descriptor_cache: Arc<ControllerDescriptorCache>,
    dispatcher_cache: Arc<ActionMethodDispatcherCache>,
    filter_providers: FilterProviderCollection,
    value_provider_factories: ValueProviderFactoryCollection,
    view_engines: ViewEngineCollection,
    binder: Arc<dyn ModelBinder>,
}

impl Default for ControllerActionInvoker {
    fn default() -> Self {
        Self::new(
            FilterProviderCollection::new(GlobalFilterCollection::new()),
            ValueProviderFactoryCollection::default(),
            ViewEngineCollection::new(),
            Arc::new(DefaultModelBinder::default()),
        )
    }
}

impl std::fmt::Debug for ControllerActionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerActionInvoker")
            .field("descriptors", &self.descriptor_cache.len())
            .field("dispatchers", &self.dispatcher_cache.len())
            .field("filter_providers", &self.filter_providers)
            .field("value_provider_factories", &self.value_provider_factories)
            .field("view_engines", &self.view_engines)
            .finish_non_exhaustive()
    }
}

impl ControllerActionInvoker {
    /// An invoker over the given registries, with empty caches.
    #[must_use]
    pub fn new(
        filter_providers: FilterProviderCollection,
        value_provider_factories: ValueProviderFactoryCollection,
        view_engines: ViewEngineCollection,
        binder: Arc<dyn ModelBinder>,
    ) -> Self {
        Self {
            descriptor_cache: Arc::new(ControllerDescriptorCache::new()),
            dispatcher_cache: Arc::new(ActionMethodDispatcherCache::new()),
            filter_providers,
            value_provider_factories,
            view_engines,
            binder,
        }
    }

    /// Share descriptor and dispatcher caches with other invokers.
    #[must_use]
    pub fn with_caches(
        mut self,
        descriptor_cache: Arc<ControllerDescriptorCache>,
        dispatcher_cache: Arc<ActionMethodDispatcherCache>,
    ) -> Self {
        self.descriptor_cache = descriptor_cache;
        self.dispatcher_cache = dispatcher_cache;
        self
    }

    /// Controller descriptors resolved so far.
    #[must_use]
    pub const fn descriptor_cache(&self) -> &Arc<ControllerDescriptorCache> {
        &self.descriptor_cache
    }

    /// Dispatchers resolved so far.
    #[must_use]
    pub const fn dispatcher_cache(&self) -> &Arc<ActionMethodDispatcherCache> {
        &self.dispatcher_cache
    }

    /// The view engines results render with.
    #[must_use]
    pub const fn view_engines(&self) -> &ViewEngineCollection {
        &self.view_engines
    }

    /// Select and run `action_name` on the context's controller.
    ///
    /// Returns `Ok(false)` when no action matches the request.
    ///
    /// # Errors
    ///
    /// - [`MvcError::Argument`] when `action_name` is empty
    /// - [`MvcError::AmbiguousAction`] when several actions match
    /// - any pipeline failure that no exception filter handled
    #[tracing::instrument(
        skip(self, context),
        fields(controller = %context.controller_name),
        name = "invoke_action"
    )]
    pub fn invoke_action(
        &self,
        context: &mut ControllerContext,
        action_name: &str,
    ) -> MvcResult<bool> {
        if action_name.is_empty() {
            return Err(MvcError::argument(
                "action_name",
                "Value cannot be null or empty.",
            ));
        }

        let descriptor = self.descriptor_cache.get_descriptor(&context.controller);
        let Some(action) = descriptor.find_action(context, action_name)? else {
            PipelineMetrics::record_not_found();
            tracing::debug!("No action matched the request");
            return Ok(false);
        };
        tracing::debug!(action = action.unique_id(), "Action selected");

        let filters = self.filter_providers.get_filters(context, &action);
        let info = FilterInfo::new(&filters);
        tracing::trace!(filters = ?info, "Filters collected");

        let start = Instant::now();
        let outcome = match self.invoke_with_filters(context, &action, &info) {
            Ok(()) => Ok(()),
            Err(error) => self.invoke_exception_filters(context, &action, &info.exception_filters, error),
        };
        PipelineMetrics::record_invocation(start.elapsed());

        outcome.map(|()| true)
    }

    fn invoke_with_filters(
        &self,
        context: &mut ControllerContext,
        action: &ActionDescriptor,
        info: &FilterInfo,
    ) -> MvcResult<()> {
        if let Some(result) =
            invoke_authorization_filters(context, action, &info.authorization_filters)?
        {
            PipelineMetrics::record_short_circuit();
            tracing::warn!(
                action = action.unique_id(),
                result = result.kind(),
                "Authorization filter short-circuited the action"
            );
            return self.invoke_action_result_with_filters(context, &info.result_filters, result);
        }

        let mut parameters = self.get_parameter_values(context, action)?;
        let ActionOutcome {
            exception,
            exception_handled,
            result,
            ..
        } = self.invoke_action_filter(context, action, &info.action_filters, &mut parameters);
        if let Some(error) = exception {
            if !exception_handled {
                return Err(error);
            }
            tracing::warn!(action = action.unique_id(), %error, "Action filter handled an exception");
        }

        let result = result.unwrap_or(ActionResult::Empty);
        self.invoke_action_result_with_filters(context, &info.result_filters, result)
    }

    fn get_parameter_values(
        &self,
        context: &mut ControllerContext,
        action: &ActionDescriptor,
    ) -> MvcResult<IndexMap<String, Value>> {
        let value_provider = self.value_provider_factories.get_value_provider(context);
        let mut values = IndexMap::with_capacity(action.parameters().len());
        for parameter in action.parameters() {
            let binder: &dyn ModelBinder = match parameter.binder() {
                Some(binder) => binder.as_ref(),
                None => self.binder.as_ref(),
            };
            let binding = ModelBindingContext {
                model_name: parameter
                    .binding_prefix()
                    .unwrap_or(parameter.name())
                    .to_string(),
                model_metadata: Arc::clone(parameter.metadata()),
                value_provider: &value_provider,
                fallback_to_empty_prefix: parameter.binding_prefix().is_none(),
                validate_request: action.validate_request(),
            };
            let value = binder
                .bind_model(context, &binding)?
                .filter(|value| !value.is_null())
                .or_else(|| parameter.default_value().cloned())
                .unwrap_or(Value::Null);
            values.insert(parameter.name().to_string(), value);
        }
        tracing::debug!(
            parameters = values.len(),
            valid = context.model_state.is_valid(),
            "Parameters bound"
        );
        Ok(values)
    }

    fn invoke_action_method(
        &self,
        context: &mut ControllerContext,
        action: &ActionDescriptor,
        parameters: &IndexMap<String, Value>,
    ) -> MvcResult<ActionResult> {
        let arguments: Vec<Value> = action
            .parameters()
            .iter()
            .map(|p| parameters.get(p.name()).cloned().unwrap_or(Value::Null))
            .collect();
        let dispatcher = self.dispatcher_cache.get_dispatcher(action);
        Ok(dispatcher.execute(context, &arguments)?.into_result())
    }

    fn invoke_action_filter(
        &self,
        context: &mut ControllerContext,
        action: &ActionDescriptor,
        filters: &Filters,
        parameters: &mut IndexMap<String, Value>,
    ) -> ActionOutcome {
        let Some((instance, rest)) = filters.split_first() else {
            return match self.invoke_action_method(context, action, parameters) {
                Ok(result) => ActionOutcome::completed(Some(result)),
                Err(error) => ActionOutcome::failed(error),
            };
        };
        let Some(filter) = instance.as_action_filter() else {
            return self.invoke_action_filter(context, action, rest, parameters);
        };

        let mut executing = ActionExecutingContext {
            controller_context: &mut *context,
            action_descriptor: action,
            action_parameters: &mut *parameters,
            result: None,
        };
        let entered = filter.on_action_executing(&mut executing);
        let short_circuit = executing.result.take();
        if let Err(error) = entered {
            return ActionOutcome::failed(MvcError::filter(instance.filter_name(), error));
        }
        if let Some(result) = short_circuit {
            tracing::debug!(filter = instance.filter_name(), "Action filter canceled the action");
            return ActionOutcome::canceled(Some(result));
        }

        let inner = self.invoke_action_filter(context, action, rest, parameters);
        let mut executed = ActionExecutedContext::new(context, action, inner);
        match filter.on_action_executed(&mut executed) {
            Ok(()) => executed.into_outcome(),
            Err(error) => ActionOutcome::failed(MvcError::filter(instance.filter_name(), error)),
        }
    }

    fn invoke_action_result_with_filters(
        &self,
        context: &mut ControllerContext,
        filters: &Filters,
        result: ActionResult,
    ) -> MvcResult<()> {
        let ResultOutcome {
            exception,
            exception_handled,
            ..
        } = self.invoke_result_filter(context, filters, result);
        match exception {
            Some(error) if !exception_handled => Err(error),
            Some(error) => {
                tracing::warn!(%error, "Result filter handled an exception");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn invoke_result_filter(
        &self,
        context: &mut ControllerContext,
        filters: &Filters,
        result: ActionResult,
    ) -> ResultOutcome {
        let Some((instance, rest)) = filters.split_first() else {
            return match result.execute(context, &self.view_engines) {
                Ok(()) => ResultOutcome::completed(result),
                Err(error) => ResultOutcome::failed(result, error),
            };
        };
        let Some(filter) = instance.as_result_filter() else {
            return self.invoke_result_filter(context, rest, result);
        };

        let mut executing = ResultExecutingContext {
            controller_context: &mut *context,
            result,
            cancel: false,
        };
        let entered = filter.on_result_executing(&mut executing);
        let ResultExecutingContext { result, cancel, .. } = executing;
        if let Err(error) = entered {
            return ResultOutcome::failed(result, MvcError::filter(instance.filter_name(), error));
        }
        if cancel {
            tracing::debug!(filter = instance.filter_name(), "Result filter canceled the result");
            return ResultOutcome::canceled(result);
        }

        let inner = self.invoke_result_filter(context, rest, result);
        let mut executed = ResultExecutedContext::new(context, inner);
        match filter.on_result_executed(&mut executed) {
            Ok(()) => executed.into_outcome(),
            Err(error) => {
                ResultOutcome::failed(executed.result, MvcError::filter(instance.filter_name(), error))
            }
        }
    }

    fn invoke_exception_filters(
        &self,
        context: &mut ControllerContext,
        action: &ActionDescriptor,
        filters: &Filters,
        error: MvcError,
    ) -> MvcResult<()> {
        let mut exception = ExceptionContext {
            controller_context: &mut *context,
            action_descriptor: action,
            exception: error,
            exception_handled: false,
            result: None,
        };
        // Innermost filters see the failure first.
        for instance in filters.iter().rev() {
            if let Some(filter) = instance.as_exception_filter() {
                filter
                    .on_exception(&mut exception)
                    .map_err(|e| MvcError::filter(instance.filter_name(), e))?;
            }
        }

        let ExceptionContext {
            exception: error,
            exception_handled,
            result,
            ..
        } = exception;
        if !exception_handled {
            PipelineMetrics::record_unhandled_exception();
            return Err(error);
        }

        PipelineMetrics::record_handled_exception();
        tracing::warn!(action = action.unique_id(), %error, "Exception filter handled an exception");
        result
            .unwrap_or(ActionResult::Empty)
            .execute(context, &self.view_engines)
    }
}

fn invoke_authorization_filters(
    context: &mut ControllerContext,
    action: &ActionDescriptor,
    filters: &Filters,
) -> MvcResult<Option<ActionResult>> {
    for instance in filters {
        let Some(filter) = instance.as_authorization_filter() else {
            continue;
        };
        let mut authorization = AuthorizationContext {
            controller_context: &mut *context,
            action_descriptor: action,
            result: None,
        };
        filter
            .on_authorization(&mut authorization)
            .map_err(|e| MvcError::filter(instance.filter_name(), e))?;
        if let Some(result) = authorization.result {
            tracing::debug!(filter = instance.filter_name(), "Authorization filter set a result");
            return Ok(Some(result));
        }
    }
    Ok(None)
}
