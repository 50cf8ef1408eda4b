//! Controller creation by route name.

use composable_mvc_core::controller::{ControllerInstance, ControllerType, SessionStateBehavior};
use composable_mvc_core::descriptor::ControllerDescriptor;
use composable_mvc_core::error::{MvcError, MvcResult};
use composable_mvc_core::http::RequestContext;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates controllers for routed requests.
pub trait ControllerFactory: Send + Sync {
    /// A controller for `controller_name`.
    ///
    /// # Errors
    ///
    /// - [`MvcError::Argument`] when the name is empty
    /// - [`MvcError::ControllerNotFound`] when nothing answers the name
    fn create_controller(
        &self,
        request_context: &RequestContext,
        controller_name: &str,
    ) -> MvcResult<ControllerInstance>;

    /// Session requirements of the controller answering `controller_name`.
    fn session_state_behavior(
        &self,
        request_context: &RequestContext,
        controller_name: &str,
    ) -> SessionStateBehavior;

    /// Hand back a controller once its request is done.
    fn release_controller(&self, controller: ControllerInstance) {
        drop(controller);
    }
}

type Activator = Arc<dyn Fn() -> ControllerInstance + Send + Sync>;

#[derive(Clone)]
struct Registration {
    type_name: &'static str,
    session_state: SessionStateBehavior,
    activator: Activator,
}

/// Registry of controller types keyed by case-insensitive name.
#[derive(Clone, Default)]
pub struct DefaultControllerFactory {
    registrations: HashMap<String, Registration>,
}

impl std::fmt::Debug for DefaultControllerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut controllers: Vec<(&str, &str)> = self
            .registrations
            .iter()
            .map(|(name, r)| (name.as_str(), r.type_name))
            .collect();
        controllers.sort_unstable();
        f.debug_struct("DefaultControllerFactory")
            .field("controllers", &controllers)
            .finish()
    }
}

impl DefaultControllerFactory {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `C` under [`ControllerType::NAME`], created with `Default`.
    #[must_use]
    pub fn register<C: ControllerType + Default>(self) -> Self {
        self.register_with(C::default)
    }

    /// Register `C` under [`ControllerType::NAME`], created by `activator`.
    ///
    /// A later registration under the same name replaces the earlier one.
    #[must_use]
    pub fn register_with<C, F>(mut self, activator: F) -> Self
    where
        C: ControllerType,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let registration = Registration {
            type_name: std::any::type_name::<C>(),
            session_state: ControllerDescriptor::of::<C>().session_state(),
            activator: Arc::new(move || ControllerInstance::new(activator())),
        };
        if let Some(previous) = self
            .registrations
            .insert(C::NAME.to_ascii_lowercase(), registration)
        {
            tracing::warn!(
                controller = C::NAME,
                replaced = previous.type_name,
                "Controller registration replaced"
            );
        }
        self
    }

    /// Number of registered controllers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether no controllers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    fn lookup(&self, controller_name: &str) -> Option<&Registration> {
        self.registrations.get(&controller_name.to_ascii_lowercase())
    }
}

impl ControllerFactory for DefaultControllerFactory {
    fn create_controller(
        &self,
        _request_context: &RequestContext,
        controller_name: &str,
    ) -> MvcResult<ControllerInstance> {
        if controller_name.is_empty() {
            return Err(MvcError::argument(
                "controller_name",
                "Value cannot be null or empty.",
            ));
        }
        let registration = self
            .lookup(controller_name)
            .ok_or_else(|| MvcError::ControllerNotFound(controller_name.to_string()))?;
        Ok((registration.activator)())
    }

    fn session_state_behavior(
        &self,
        _request_context: &RequestContext,
        controller_name: &str,
    ) -> SessionStateBehavior {
        self.lookup(controller_name)
            .map_or(SessionStateBehavior::Default, |r| r.session_state)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use composable_mvc_core::prelude::*;
    use std::any::Any;

    #[derive(Default)]
    struct AccountController;

    impl MvcFilter for AccountController {}

    impl Controller for AccountController {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl AccountController {
        fn login(&self, _ctx: &mut ControllerContext) -> ActionResult {
            ActionResult::view()
        }
    }

    impl ControllerType for AccountController {
        const NAME: &'static str = "Account";

        fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
            descriptor
                .session_state(SessionStateBehavior::ReadOnly)
                .action(ActionBuilder::new("Login", Self::login))
        }
    }

    fn request() -> RequestContext {
        RequestContext::new(
            HttpRequest::new(http::Method::GET, "/account/login"),
            RouteData::for_action("account", "login"),
        )
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let factory = DefaultControllerFactory::new().register::<AccountController>();
        let controller = factory.create_controller(&request(), "ACCOUNT").unwrap();
        assert!(controller.instance().as_any().is::<AccountController>());
        assert_eq!(
            factory.session_state_behavior(&request(), "account"),
            SessionStateBehavior::ReadOnly
        );
    }

    #[test]
    fn test_unknown_and_empty_names() {
        let factory = DefaultControllerFactory::new().register::<AccountController>();
        assert!(matches!(
            factory.create_controller(&request(), "Billing"),
            Err(MvcError::ControllerNotFound(name)) if name == "Billing"
        ));
        assert!(matches!(
            factory.create_controller(&request(), ""),
            Err(MvcError::Argument { name: "controller_name", .. })
        ));
        assert_eq!(
            factory.session_state_behavior(&request(), "Billing"),
            SessionStateBehavior::Default
        );
    }
}
