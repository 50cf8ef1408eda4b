//! Typed action invocation.
//!
//! Actions are plain functions or methods of the shape
//! `fn(&C, &mut ControllerContext, A1, ..., An) -> R` for up to six arguments,
//! where each `Ai` is deserializable and `R` implements [`IntoActionReturn`].
//! [`ActionFn`] is implemented for every such function, so registering an
//! action compiles a dispatcher that downcasts the controller, converts the
//! bound `serde_json::Value` arguments and normalizes the return value.
//!
//! Dispatchers are built once per action and cached by the action's unique id
//! in an [`ActionMethodDispatcherCache`].

use crate::cache::ReaderWriterCache;
use crate::controller::{Controller, ControllerContext};
use crate::descriptor::ActionDescriptor;
use crate::error::{MvcError, MvcResult};
use crate::results::ActionResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

/// What an action produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionReturn {
    /// The action returned nothing; an empty result executes
    NoResult,
    /// The action returned a result
    Result(ActionResult),
}

impl ActionReturn {
    /// The result to execute.
    #[must_use]
    pub fn into_result(self) -> ActionResult {
        match self {
            Self::NoResult => ActionResult::Empty,
            Self::Result(result) => result,
        }
    }
}

/// Conversion of an action's return value.
pub trait IntoActionReturn {
    /// Normalize the value.
    ///
    /// # Errors
    ///
    /// Returns the action's own failure.
    fn into_action_return(self) -> anyhow::Result<ActionReturn>;
}

impl IntoActionReturn for () {
    fn into_action_return(self) -> anyhow::Result<ActionReturn> {
        Ok(ActionReturn::NoResult)
    }
}

impl IntoActionReturn for ActionResult {
    fn into_action_return(self) -> anyhow::Result<ActionReturn> {
        Ok(ActionReturn::Result(self))
    }
}

impl IntoActionReturn for String {
    fn into_action_return(self) -> anyhow::Result<ActionReturn> {
        Ok(ActionReturn::Result(ActionResult::content(self)))
    }
}

impl IntoActionReturn for &'static str {
    fn into_action_return(self) -> anyhow::Result<ActionReturn> {
        Ok(ActionReturn::Result(ActionResult::content(self)))
    }
}

impl<T, E> IntoActionReturn for Result<T, E>
where
    T: IntoActionReturn,
    E: Into<anyhow::Error>,
{
    fn into_action_return(self) -> anyhow::Result<ActionReturn> {
        self.map_err(Into::into)?.into_action_return()
    }
}

/// Why a typed call failed before or inside the action body.
#[derive(Debug)]
pub enum ActionCallError {
    /// The controller is not of the registered type
    ControllerType(&'static str),
    /// Argument `index` did not deserialize
    Conversion {
        /// Zero-based parameter position
        index: usize,
        /// Deserialization failure
        source: serde_json::Error,
    },
    /// The action body failed
    Failed(anyhow::Error),
}

/// A function usable as an action on controller `C` with argument tuple `Args`.
pub trait ActionFn<C, Args>: Send + Sync + 'static {
    /// Number of bound arguments the function takes.
    fn arity(&self) -> usize;

    /// Call the function with converted arguments.
    ///
    /// # Errors
    ///
    /// See [`ActionCallError`].
    fn call(
        &self,
        controller: &C,
        context: &mut ControllerContext,
        arguments: &[Value],
    ) -> Result<ActionReturn, ActionCallError>;
}

fn convert_argument<T: DeserializeOwned>(arguments: &[Value], index: usize) -> Result<T, ActionCallError> {
    let value = arguments.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|source| ActionCallError::Conversion { index, source })
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! impl_action_fn {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<C, F, R, $($arg,)*> ActionFn<C, ($($arg,)*)> for F
        where
            C: 'static,
            F: Fn(&C, &mut ControllerContext, $($arg),*) -> R + Send + Sync + 'static,
            R: IntoActionReturn,
            $($arg: DeserializeOwned,)*
        {
            fn arity(&self) -> usize {
                count!($($arg)*)
            }

            fn call(
                &self,
                controller: &C,
                context: &mut ControllerContext,
                arguments: &[Value],
            ) -> Result<ActionReturn, ActionCallError> {
                let mut index = 0usize;
                $(
                    let $arg: $arg = convert_argument(arguments, index)?;
                    index += 1;
                )*
                (self)(controller, context, $($arg),*)
                    .into_action_return()
                    .map_err(ActionCallError::Failed)
            }
        }
    };
}

impl_action_fn!();
impl_action_fn!(A1);
impl_action_fn!(A1, A2);
impl_action_fn!(A1, A2, A3);
impl_action_fn!(A1, A2, A3, A4);
impl_action_fn!(A1, A2, A3, A4, A5);
impl_action_fn!(A1, A2, A3, A4, A5, A6);

/// A registered action function with its controller type erased.
pub trait ActionMethod: Send + Sync {
    /// Number of bound arguments.
    fn arity(&self) -> usize;

    /// Call the function on `controller`.
    ///
    /// # Errors
    ///
    /// See [`ActionCallError`].
    fn invoke(
        &self,
        controller: &dyn Controller,
        context: &mut ControllerContext,
        arguments: &[Value],
    ) -> Result<ActionReturn, ActionCallError>;
}

pub(crate) struct TypedActionMethod<C, Args, F> {
    function: F,
    _marker: PhantomData<fn() -> (C, Args)>,
}

impl<C, Args, F> TypedActionMethod<C, Args, F> {
    pub(crate) const fn new(function: F) -> Self {
        Self {
            function,
            _marker: PhantomData,
        }
    }
}

impl<C, Args, F> ActionMethod for TypedActionMethod<C, Args, F>
where
    C: Controller,
    Args: 'static,
    F: ActionFn<C, Args>,
{
    fn arity(&self) -> usize {
        self.function.arity()
    }

    fn invoke(
        &self,
        controller: &dyn Controller,
        context: &mut ControllerContext,
        arguments: &[Value],
    ) -> Result<ActionReturn, ActionCallError> {
        let typed = controller
            .as_any()
            .downcast_ref::<C>()
            .ok_or(ActionCallError::ControllerType(std::any::type_name::<C>()))?;
        self.function.call(typed, context, arguments)
    }
}

/// Invokes one action with positional arguments.
pub struct ActionMethodDispatcher {
    action_id: String,
    method: Arc<dyn ActionMethod>,
}

impl std::fmt::Debug for ActionMethodDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionMethodDispatcher")
            .field("action_id", &self.action_id)
            .field("arity", &self.method.arity())
            .finish()
    }
}

impl ActionMethodDispatcher {
    /// Build a dispatcher for `action`.
    #[must_use]
    pub fn new(action: &ActionDescriptor) -> Self {
        Self {
            action_id: action.unique_id().to_string(),
            method: Arc::clone(action.method()),
        }
    }

    /// Call the action on the context's controller.
    ///
    /// # Errors
    ///
    /// - [`MvcError::ArgumentCount`] when `arguments` does not match the arity
    /// - [`MvcError::ControllerTypeMismatch`] when the controller has the wrong type
    /// - [`MvcError::ArgumentConversion`] when an argument does not deserialize
    /// - [`MvcError::Action`] when the action fails
    pub fn execute(&self, context: &mut ControllerContext, arguments: &[Value]) -> MvcResult<ActionReturn> {
        let expected = self.method.arity();
        if arguments.len() != expected {
            return Err(MvcError::ArgumentCount {
                action: self.action_id.clone(),
                expected,
                actual: arguments.len(),
            });
        }

        let controller = Arc::clone(context.controller.instance());
        self.method
            .invoke(controller.as_ref(), context, arguments)
            .map_err(|e| match e {
                ActionCallError::ControllerType(expected) => MvcError::ControllerTypeMismatch { expected },
                ActionCallError::Conversion { index, source } => MvcError::ArgumentConversion {
                    action: self.action_id.clone(),
                    index,
                    source,
                },
                ActionCallError::Failed(source) => MvcError::Action {
                    action: self.action_id.clone(),
                    source,
                },
            })
    }
}

/// Dispatchers keyed by controller type and action index.
#[derive(Debug, Default)]
pub struct ActionMethodDispatcherCache {
    cache: ReaderWriterCache<(TypeId, usize), Arc<ActionMethodDispatcher>>,
}

impl ActionMethodDispatcherCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The dispatcher for `action`, built on first use.
    #[must_use]
    pub fn get_dispatcher(&self, action: &ActionDescriptor) -> Arc<ActionMethodDispatcher> {
        self.cache
            .fetch_or_create_item(action.key(), || {
                Arc::new(ActionMethodDispatcher::new(action))
            })
    }

    /// Number of cached dispatchers.
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::controller::{ControllerInstance, ControllerType};
    use crate::descriptor::{
        ActionBuilder, ControllerDescriptor, ControllerDescriptorBuilder, ParameterDescriptor,
    };
    use crate::filters::MvcFilter;
    use crate::http::{HttpRequest, RequestContext, RouteData};
    use crate::metadata::ModelMetadata;
    use http::Method;
    use serde_json::json;
    use std::any::Any;

    struct Calculator {
        offset: i64,
    }

    impl MvcFilter for Calculator {}

    impl Controller for Calculator {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl Calculator {
        fn add(&self, _ctx: &mut ControllerContext, a: i64, b: i64) -> String {
            (a + b + self.offset).to_string()
        }

        fn touch(&self, ctx: &mut ControllerContext) {
            ctx.view_data.insert("touched", true);
        }

        fn fail(&self, _ctx: &mut ControllerContext) -> anyhow::Result<ActionResult> {
            anyhow::bail!("boom")
        }
    }

    impl ControllerType for Calculator {
        const NAME: &'static str = "Calculator";

        fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
            descriptor
                .action(
                    ActionBuilder::new("Add", Self::add)
                        .parameter(ParameterDescriptor::new("a", ModelMetadata::integer("a")))
                        .parameter(ParameterDescriptor::new("b", ModelMetadata::integer("b"))),
                )
                .action(ActionBuilder::new("Touch", Self::touch))
                .action(ActionBuilder::new("Fail", Self::fail))
        }
    }

    struct Other;
    impl MvcFilter for Other {}
    impl Controller for Other {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }
    impl ControllerType for Other {
        const NAME: &'static str = "Other";
        fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
            descriptor
        }
    }

    fn context_for(controller: ControllerInstance) -> ControllerContext {
        ControllerContext::new(
            RequestContext::new(HttpRequest::new(Method::GET, "/"), RouteData::default()),
            "Calculator",
            controller,
        )
    }

    fn action(name: &str) -> Arc<ActionDescriptor> {
        ControllerDescriptor::of::<Calculator>()
            .actions()
            .iter()
            .find(|a| a.action_name() == name)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_typed_arguments_and_string_return() {
        let mut ctx = context_for(ControllerInstance::new(Calculator { offset: 1 }));
        let dispatcher = ActionMethodDispatcher::new(&action("Add"));
        let result = dispatcher.execute(&mut ctx, &[json!(2), json!(3)]).unwrap();
        assert_eq!(result, ActionReturn::Result(ActionResult::content("6")));
    }

    #[test]
    fn test_unit_return_is_no_result() {
        let mut ctx = context_for(ControllerInstance::new(Calculator { offset: 0 }));
        let dispatcher = ActionMethodDispatcher::new(&action("Touch"));
        assert_eq!(dispatcher.execute(&mut ctx, &[]).unwrap(), ActionReturn::NoResult);
        assert_eq!(ctx.view_data.get("touched"), Some(&json!(true)));
    }

    #[test]
    fn test_failures_are_classified() {
        let mut ctx = context_for(ControllerInstance::new(Calculator { offset: 0 }));
        let add = ActionMethodDispatcher::new(&action("Add"));
        assert!(matches!(
            add.execute(&mut ctx, &[json!(1)]),
            Err(MvcError::ArgumentCount { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            add.execute(&mut ctx, &[json!(1), json!("two")]),
            Err(MvcError::ArgumentConversion { index: 1, .. })
        ));

        let fail = ActionMethodDispatcher::new(&action("Fail"));
        assert!(matches!(fail.execute(&mut ctx, &[]), Err(MvcError::Action { .. })));

        let mut wrong = context_for(ControllerInstance::new(Other));
        assert!(matches!(
            add.execute(&mut wrong, &[json!(1), json!(2)]),
            Err(MvcError::ControllerTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_cache_returns_same_dispatcher() {
        let cache = ActionMethodDispatcherCache::new();
        let add = action("Add");
        let first = cache.get_dispatcher(&add);
        let second = cache.get_dispatcher(&add);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_separates_controller_types_at_the_same_index() {
        struct Twin;
        impl MvcFilter for Twin {}
        impl Controller for Twin {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        impl Twin {
            fn add(&self, _ctx: &mut ControllerContext) -> String {
                "twin".to_string()
            }
        }
        impl ControllerType for Twin {
            const NAME: &'static str = "Calculator";
            fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
                descriptor.action(ActionBuilder::new("Add", Self::add))
            }
        }

        let cache = ActionMethodDispatcherCache::new();
        let twin_add = ControllerDescriptor::of::<Twin>().actions()[0].clone();
        let calculator_add = action("Add");
        assert_eq!(twin_add.key().1, calculator_add.key().1);

        let twin = cache.get_dispatcher(&twin_add);
        let calculator = cache.get_dispatcher(&calculator_add);

        assert!(!Arc::ptr_eq(&twin, &calculator));
        assert_eq!(cache.len(), 2);
        let mut ctx = context_for(ControllerInstance::new(Twin));
        assert_eq!(
            twin.execute(&mut ctx, &[]).unwrap(),
            ActionReturn::Result(ActionResult::content("twin"))
        );
    }
}
