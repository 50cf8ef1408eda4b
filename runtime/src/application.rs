//! The application entry point: from a routed request to a response.
//!
//! # Example
//!
//! ```
//! use composable_mvc_core::prelude::*;
//! use composable_mvc_runtime::MvcApplication;
//! use std::any::Any;
//!
//! #[derive(Default)]
//! struct GreetingController;
//!
//! impl MvcFilter for GreetingController {}
//!
//! impl Controller for GreetingController {
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! impl GreetingController {
//!     fn hello(&self, _ctx: &mut ControllerContext, name: Option<String>) -> String {
//!         format!("Hello, {}!", name.as_deref().unwrap_or("world"))
//!     }
//! }
//!
//! impl ControllerType for GreetingController {
//!     const NAME: &'static str = "Greeting";
//!
//!     fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
//!         descriptor.action(
//!             ActionBuilder::new("Hello", Self::hello)
//!                 .parameter(ParameterDescriptor::new("name", ModelMetadata::string("name"))),
//!         )
//!     }
//! }
//!
//! # fn main() -> Result<(), MvcError> {
//! let app = MvcApplication::builder()
//!     .controller::<GreetingController>()
//!     .build()?;
//!
//! let request = HttpRequest::new(http::Method::GET, "/greeting/hello").with_query("name", "Ada");
//! let response = app.process_request(RequestContext::new(
//!     request,
//!     RouteData::for_action("Greeting", "Hello"),
//! ))?;
//! assert_eq!(response.body_text(), "Hello, Ada!");
//! # Ok(())
//! # }
//! ```

use crate::binder::DefaultModelBinder;
use crate::controller_factory::{ControllerFactory, DefaultControllerFactory};
use crate::invoker::ControllerActionInvoker;
use composable_mvc_core::binding::ModelBinder;
use composable_mvc_core::config::MvcOptions;
use composable_mvc_core::controller::{ControllerContext, ControllerType};
use composable_mvc_core::dependency::{DependencyResolver, DependencyResolverExt, EmptyResolver};
use composable_mvc_core::error::{MvcError, MvcResult};
use composable_mvc_core::filters::{
    FilterProvider, FilterProviderCollection, GlobalFilterCollection, MvcFilter,
};
use composable_mvc_core::http::{HttpResponse, RequestContext, RouteData};
use composable_mvc_core::validation::{ModelValidatorProvider, ModelValidatorProviderCollection};
use composable_mvc_core::value_providers::{ValueProviderFactory, ValueProviderFactoryCollection};
use composable_mvc_core::view::{
    TemplateRenderer, TemplateViewEngine, ViewEngine, ViewEngineCollection, VirtualPathProvider,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// A configured pipeline, shared by every request.
#[derive(Clone)]
pub struct MvcApplication {
    options: Arc<MvcOptions>,
    controller_factory: Arc<dyn ControllerFactory>,
    validator_providers: ModelValidatorProviderCollection,
    invoker: ControllerActionInvoker,
}

impl std::fmt::Debug for MvcApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MvcApplication")
            .field("options", &self.options)
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}

impl MvcApplication {
    /// Start configuring an application.
    #[must_use]
    pub fn builder() -> MvcApplicationBuilder {
        MvcApplicationBuilder::default()
    }

    /// The options the application was built with.
    #[must_use]
    pub fn options(&self) -> &MvcOptions {
        &self.options
    }

    /// The validator providers, for rendering client validation rules.
    #[must_use]
    pub const fn validator_providers(&self) -> &ModelValidatorProviderCollection {
        &self.validator_providers
    }

    /// The action invoker.
    #[must_use]
    pub const fn invoker(&self) -> &ControllerActionInvoker {
        &self.invoker
    }

    /// Handle a routed request.
    ///
    /// # Errors
    ///
    /// - [`MvcError::MissingRouteValue`] without `controller` or `action` route values
    /// - [`MvcError::ControllerNotFound`] when no controller answers the name
    /// - [`MvcError::ActionNotFound`] when no action matches the request
    /// - any failure the pipeline did not handle
    pub fn process_request(&self, request_context: RequestContext) -> MvcResult<HttpResponse> {
        let controller_name = required_route_value(&request_context.route_data, "controller")?;
        let action_name = required_route_value(&request_context.route_data, "action")?;

        let controller = self
            .controller_factory
            .create_controller(&request_context, &controller_name)?;
        let session_state = self
            .controller_factory
            .session_state_behavior(&request_context, &controller_name);

        let mut context = ControllerContext::new(request_context, &controller_name, controller);
        context.session_state = session_state;

        let invoked = self.invoker.invoke_action(&mut context, &action_name);
        let ControllerContext {
            controller,
            response,
            ..
        } = context;
        self.controller_factory.release_controller(controller);

        if !invoked? {
            return Err(MvcError::ActionNotFound {
                controller: controller_name,
                action: action_name,
            });
        }

        tracing::info!(
            controller = %controller_name,
            action = %action_name,
            status = response.status.as_u16(),
            "Request completed"
        );
        Ok(response)
    }

    /// Run an action as a child of `parent` and return its rendered output.
    ///
    /// The child sees the parent's request, route data made of the target
    /// controller, `action_name` and `route_values`, and `route_values` as
    /// its child-action values. `controller_name` defaults to the parent's.
    ///
    /// # Errors
    ///
    /// See [`MvcApplication::process_request`].
    pub fn render_child_action(
        &self,
        parent: &ControllerContext,
        action_name: &str,
        controller_name: Option<&str>,
        route_values: IndexMap<String, Value>,
    ) -> MvcResult<String> {
        let controller_name = controller_name.unwrap_or(parent.controller_name.as_str());
        let mut route_data = RouteData::for_action(controller_name, action_name);
        for (key, value) in &route_values {
            route_data.insert(key.clone(), value.clone());
        }

        let mut request_context = RequestContext::new(parent.request().clone(), route_data);
        request_context.child_action_values = Some(route_values);
        request_context.request_id.clone_from(&parent.request_context.request_id);

        tracing::debug!(controller = controller_name, action = action_name, "Rendering child action");
        let response = self.process_request(request_context)?;
        Ok(response.body_text())
    }
}

fn required_route_value(route_data: &RouteData, key: &str) -> MvcResult<String> {
    route_data
        .get_string(key)
        .ok_or_else(|| MvcError::MissingRouteValue(key.to_string()))
}

/// Builder for [`MvcApplication`].
///
/// Services registered with the dependency resolver take precedence: a
/// resolved `dyn ControllerFactory` or `dyn ModelBinder` replaces the
/// configured one, and resolved filter providers, value-provider factories,
/// view engines and validator providers are consulted before the registered
/// ones.
pub struct MvcApplicationBuilder {
    options: MvcOptions,
    resolver: Arc<dyn DependencyResolver>,
    controllers: DefaultControllerFactory,
    controller_factory: Option<Arc<dyn ControllerFactory>>,
    global_filters: GlobalFilterCollection,
    filter_providers: Vec<Arc<dyn FilterProvider>>,
    value_provider_factories: ValueProviderFactoryCollection,
    view_engines: ViewEngineCollection,
    template_views: Vec<(Arc<dyn VirtualPathProvider>, Arc<dyn TemplateRenderer>)>,
    validator_providers: Vec<Arc<dyn ModelValidatorProvider>>,
    binder: Option<Arc<dyn ModelBinder>>,
}

impl Default for MvcApplicationBuilder {
    fn default() -> Self {
        Self {
            options: MvcOptions::default(),
            resolver: Arc::new(EmptyResolver),
            controllers: DefaultControllerFactory::new(),
            controller_factory: None,
            global_filters: GlobalFilterCollection::new(),
            filter_providers: Vec::new(),
            value_provider_factories: ValueProviderFactoryCollection::default(),
            view_engines: ViewEngineCollection::new(),
            template_views: Vec::new(),
            validator_providers: Vec::new(),
            binder: None,
        }
    }
}

impl MvcApplicationBuilder {
    /// Use `options` instead of the defaults.
    #[must_use]
    pub fn options(mut self, options: MvcOptions) -> Self {
        self.options = options;
        self
    }

    /// Consult `resolver` for services.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Register controller `C`, created with `Default`.
    #[must_use]
    pub fn controller<C: ControllerType + Default>(mut self) -> Self {
        self.controllers = self.controllers.register::<C>();
        self
    }

    /// Register controller `C`, created by `activator`.
    #[must_use]
    pub fn controller_with<C, F>(mut self, activator: F) -> Self
    where
        C: ControllerType,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.controllers = self.controllers.register_with(activator);
        self
    }

    /// Replace the controller registry with a custom factory.
    #[must_use]
    pub fn controller_factory(mut self, factory: Arc<dyn ControllerFactory>) -> Self {
        self.controller_factory = Some(factory);
        self
    }

    /// Apply `filter` to every action.
    #[must_use]
    pub fn global_filter(mut self, filter: impl MvcFilter + 'static) -> Self {
        self.global_filters.add(Arc::new(filter));
        self
    }

    /// Apply `filter` to every action with an explicit order.
    #[must_use]
    pub fn global_filter_with_order(mut self, filter: Arc<dyn MvcFilter>, order: i32) -> Self {
        self.global_filters.add_with_order(filter, order);
        self
    }

    /// Add a filter provider after the built-in ones.
    #[must_use]
    pub fn filter_provider(mut self, provider: Arc<dyn FilterProvider>) -> Self {
        self.filter_providers.push(provider);
        self
    }

    /// Add a value-provider factory with the lowest precedence.
    #[must_use]
    pub fn value_provider_factory(mut self, factory: Arc<dyn ValueProviderFactory>) -> Self {
        self.value_provider_factories.push(factory);
        self
    }

    /// Replace the value-provider factories.
    #[must_use]
    pub fn value_provider_factories(mut self, factories: ValueProviderFactoryCollection) -> Self {
        self.value_provider_factories = factories;
        self
    }

    /// Add a view engine.
    #[must_use]
    pub fn view_engine(mut self, engine: Arc<dyn ViewEngine>) -> Self {
        self.view_engines.push(engine);
        self
    }

    /// Add a [`TemplateViewEngine`] configured from the application's options
    /// (view file extension and location cache window). Such engines follow
    /// the ones added with [`MvcApplicationBuilder::view_engine`].
    #[must_use]
    pub fn template_views(
        mut self,
        path_provider: Arc<dyn VirtualPathProvider>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        self.template_views.push((path_provider, renderer));
        self
    }

    /// Add a validator provider after the default ones.
    #[must_use]
    pub fn validator_provider(mut self, provider: Arc<dyn ModelValidatorProvider>) -> Self {
        self.validator_providers.push(provider);
        self
    }

    /// Replace the default model binder.
    #[must_use]
    pub fn binder(mut self, binder: Arc<dyn ModelBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Assemble the application.
    ///
    /// # Errors
    ///
    /// Returns [`MvcError::Config`] when the options do not validate.
    pub fn build(self) -> MvcResult<MvcApplication> {
        self.options.validate()?;
        let resolver = self.resolver.as_ref();

        let controller_factory: Arc<dyn ControllerFactory> = resolver
            .service::<dyn ControllerFactory>()
            .or(self.controller_factory)
            .unwrap_or_else(|| -> Arc<dyn ControllerFactory> { Arc::new(self.controllers) });

        let mut filter_providers = FilterProviderCollection::new(self.global_filters);
        for provider in self.filter_providers {
            filter_providers.push(provider);
        }

        let mut validator_providers = ModelValidatorProviderCollection::with_options(&self.options);
        for provider in self.validator_providers {
            validator_providers.push(provider);
        }
        let validator_providers = validator_providers.combined_with(resolver);

        let request_validation = self.options.request_validation;
        let binder: Arc<dyn ModelBinder> = resolver
            .service::<dyn ModelBinder>()
            .or(self.binder)
            .unwrap_or_else(|| -> Arc<dyn ModelBinder> {
                Arc::new(DefaultModelBinder::new(validator_providers.clone(), request_validation))
            });

        let mut view_engines = self.view_engines;
        for (path_provider, renderer) in self.template_views {
            view_engines.push(Arc::new(TemplateViewEngine::from_options(
                path_provider,
                renderer,
                &self.options,
            )));
        }

        let invoker = ControllerActionInvoker::new(
            filter_providers.combined_with(resolver),
            self.value_provider_factories.combined_with(resolver),
            view_engines.combined_with(resolver),
            binder,
        );

        tracing::debug!(options = ?self.options, "MVC application built");
        Ok(MvcApplication {
            options: Arc::new(self.options),
            controller_factory,
            validator_providers,
            invoker,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use composable_mvc_core::http::HttpRequest;
    use composable_mvc_core::metadata::ModelMetadata;
    use composable_mvc_core::validation::DataAnnotation;
    use composable_mvc_testing::{InMemoryVirtualPathProvider, StubTemplateRenderer, TestController};

    #[test]
    fn test_missing_route_values() {
        let app = MvcApplication::builder()
            .controller::<TestController>()
            .build()
            .unwrap();
        let request = HttpRequest::new(http::Method::GET, "/");

        let context = RequestContext::new(request.clone(), RouteData::default());
        assert!(matches!(
            app.process_request(context),
            Err(MvcError::MissingRouteValue(key)) if key == "controller"
        ));

        let context = RequestContext::new(
            request,
            RouteData::default().with_value("controller", "Test"),
        );
        assert!(matches!(
            app.process_request(context),
            Err(MvcError::MissingRouteValue(key)) if key == "action"
        ));
    }

    #[test]
    fn test_unknown_controller_and_action() {
        let app = MvcApplication::builder()
            .controller::<TestController>()
            .build()
            .unwrap();
        let request = HttpRequest::new(http::Method::GET, "/");

        let context = RequestContext::new(request.clone(), RouteData::for_action("Nope", "Index"));
        assert!(matches!(
            app.process_request(context),
            Err(MvcError::ControllerNotFound(_))
        ));

        let context = RequestContext::new(request, RouteData::for_action("Test", "Nope"));
        assert!(matches!(
            app.process_request(context),
            Err(MvcError::ActionNotFound { action, .. }) if action == "Nope"
        ));
    }

    #[test]
    fn test_template_views_follow_the_options() {
        let files = Arc::new(InMemoryVirtualPathProvider::default());
        let options = MvcOptions::builder()
            .view_file_extension("tera")
            .client_validation(false)
            .build()
            .unwrap();
        let app = MvcApplication::builder()
            .options(options)
            .controller::<TestController>()
            .template_views(files, Arc::new(StubTemplateRenderer::new()))
            .build()
            .unwrap();

        let result = app
            .invoker()
            .view_engines()
            .find_view(&TestController::context(), "Index", None)
            .unwrap();
        assert_eq!(
            result.searched_locations,
            ["~/Views/Test/Index.tera", "~/Views/Shared/Index.tera"]
        );

        let metadata = ModelMetadata::string("Name")
            .annotate(DataAnnotation::required())
            .build();
        assert!(!app.validator_providers().client_validation_enabled());
        assert!(
            app.validator_providers()
                .client_validation_rules(&TestController::context(), &metadata, None)
                .is_empty()
        );
    }

    #[test]
    fn test_invalid_options_fail_the_build() {
        let options = MvcOptions {
            view_file_extension: String::new(),
            ..MvcOptions::default()
        };
        assert!(matches!(
            MvcApplication::builder().options(options).build(),
            Err(MvcError::Config(_))
        ));
    }
}
