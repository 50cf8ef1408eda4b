use super::{
    ActionFilter, AuthorizationFilter, ExceptionFilter, Filter, FilterScope, MvcFilter, ResultFilter,
    remove_duplicates, sort_filters,
};
use crate::controller::{Controller, ControllerContext};
use crate::dependency::{DependencyResolver, DependencyResolverExt};
use crate::descriptor::ActionDescriptor;
use std::sync::Arc;

/// Supplies filters for an action.
pub trait FilterProvider: Send + Sync {
    /// Filters that apply to `action` for this request.
    fn get_filters(&self, context: &ControllerContext, action: &ActionDescriptor) -> Vec<Filter>;
}

/// Filters registered for every action in the application.
#[derive(Clone, Default)]
pub struct GlobalFilterCollection {
    filters: Vec<Filter>,
}

impl std::fmt::Debug for GlobalFilterCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.filters).finish()
    }
}

impl GlobalFilterCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter using its own order.
    pub fn add(&mut self, filter: Arc<dyn MvcFilter>) {
        self.filters.push(Filter::new(filter, FilterScope::Global, None));
    }

    /// Register a filter with an explicit order.
    pub fn add_with_order(&mut self, filter: Arc<dyn MvcFilter>, order: i32) {
        self.filters
            .push(Filter::new(filter, FilterScope::Global, Some(order)));
    }

    /// Number of registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no filters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl FilterProvider for GlobalFilterCollection {
    fn get_filters(&self, _context: &ControllerContext, _action: &ActionDescriptor) -> Vec<Filter> {
        self.filters.clone()
    }
}

/// Filters declared on the controller and on the action.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterAttributeFilterProvider;

impl FilterProvider for FilterAttributeFilterProvider {
    fn get_filters(&self, _context: &ControllerContext, action: &ActionDescriptor) -> Vec<Filter> {
        let controller = action
            .controller_filters()
            .iter()
            .map(|f| Filter::new(Arc::clone(f), FilterScope::Controller, None));
        let declared = action
            .filters()
            .iter()
            .map(|f| Filter::new(Arc::clone(f), FilterScope::Action, None));
        controller.chain(declared).collect()
    }
}

/// Wraps a controller so it can take part in its own filter pipeline.
pub struct ControllerFilter(pub Arc<dyn Controller>);

impl MvcFilter for ControllerFilter {
    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        self.0.as_authorization_filter()
    }

    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        self.0.as_action_filter()
    }

    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        self.0.as_result_filter()
    }

    fn as_exception_filter(&self) -> Option<&dyn ExceptionFilter> {
        self.0.as_exception_filter()
    }

    fn filter_name(&self) -> &'static str {
        self.0.filter_name()
    }
}

/// The controller instance, when it implements any filter capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerInstanceFilterProvider;

impl FilterProvider for ControllerInstanceFilterProvider {
    fn get_filters(&self, context: &ControllerContext, _action: &ActionDescriptor) -> Vec<Filter> {
        let controller = context.controller.instance();
        if !controller.has_capability() {
            return Vec::new();
        }
        vec![Filter::new(
            Arc::new(ControllerFilter(Arc::clone(controller))),
            FilterScope::First,
            Some(i32::MIN),
        )]
    }
}

/// The ordered provider registry.
///
/// Default order: global filters, declared filters, controller instance.
#[derive(Clone)]
pub struct FilterProviderCollection {
    providers: Vec<Arc<dyn FilterProvider>>,
}

impl Default for FilterProviderCollection {
    fn default() -> Self {
        Self::new(GlobalFilterCollection::new())
    }
}

impl std::fmt::Debug for FilterProviderCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterProviderCollection")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl FilterProviderCollection {
    /// The default providers, using `global` for application-wide filters.
    #[must_use]
    pub fn new(global: GlobalFilterCollection) -> Self {
        Self {
            providers: vec![
                Arc::new(global),
                Arc::new(FilterAttributeFilterProvider),
                Arc::new(ControllerInstanceFilterProvider),
            ],
        }
    }

    /// A registry with no providers.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Append a provider.
    pub fn push(&mut self, provider: Arc<dyn FilterProvider>) {
        self.providers.push(provider);
    }

    /// Number of providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// A registry with the resolver's providers ahead of these.
    #[must_use]
    pub fn combined_with(&self, resolver: &dyn DependencyResolver) -> Self {
        let mut providers = resolver.services::<dyn FilterProvider>();
        providers.extend(self.providers.iter().cloned());
        Self { providers }
    }

    /// Every provider's filters, sorted and de-duplicated.
    #[must_use]
    pub fn get_filters(&self, context: &ControllerContext, action: &ActionDescriptor) -> Vec<Filter> {
        let mut filters: Vec<Filter> = self
            .providers
            .iter()
            .flat_map(|p| p.get_filters(context, action))
            .collect();
        sort_filters(&mut filters);
        remove_duplicates(filters)
    }
}
