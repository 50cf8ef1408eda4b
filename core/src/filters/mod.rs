//! Filters: code that runs around authorization, action invocation, result
//! execution and error handling.
//!
//! A filter is any [`MvcFilter`]. It opts into pipeline stages by returning
//! itself from the matching capability accessor, so one type may act as an
//! authorization, action, result and exception filter at once.
//!
//! Filters are collected per request by the [`FilterProviderCollection`],
//! sorted by ([`FilterScope`], order) and split into the four stage lists of a
//! [`FilterInfo`].

mod builtin;
mod context;
mod providers;

pub use builtin::{AuthorizeFilter, ChildActionOnlyFilter, HandleErrorFilter, RequireHttpsFilter};
pub use context::{
    ActionExecutedContext, ActionExecutingContext, ActionOutcome, AuthorizationContext,
    ExceptionContext, ResultExecutedContext, ResultExecutingContext, ResultOutcome,
};
pub use providers::{
    ControllerFilter, ControllerInstanceFilterProvider, FilterAttributeFilterProvider,
    FilterProvider, FilterProviderCollection, GlobalFilterCollection,
};

use std::sync::Arc;

/// Order used when a filter does not specify one.
pub const DEFAULT_ORDER: i32 = -1;

/// A filter instance and the pipeline stages it takes part in.
pub trait MvcFilter: Send + Sync {
    /// The authorization capability, if any.
    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        None
    }

    /// The action capability, if any.
    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        None
    }

    /// The result capability, if any.
    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        None
    }

    /// The exception capability, if any.
    fn as_exception_filter(&self) -> Option<&dyn ExceptionFilter> {
        None
    }

    /// Order within the filter's scope; lower runs first.
    fn order(&self) -> i32 {
        DEFAULT_ORDER
    }

    /// Whether several instances of this filter type may apply to one action.
    ///
    /// When `false`, only the most specific instance survives.
    fn allow_multiple(&self) -> bool {
        true
    }

    /// Name used to identify the filter type in logs, errors and de-duplication.
    fn filter_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether the filter takes part in any stage.
    fn has_capability(&self) -> bool {
        self.as_authorization_filter().is_some()
            || self.as_action_filter().is_some()
            || self.as_result_filter().is_some()
            || self.as_exception_filter().is_some()
    }
}

/// Runs before binding; may short-circuit by setting a result.
pub trait AuthorizationFilter {
    /// Inspect the request.
    ///
    /// # Errors
    ///
    /// Any error aborts the request and is offered to exception filters.
    fn on_authorization(&self, context: &mut AuthorizationContext<'_>) -> anyhow::Result<()>;
}

/// Runs around action invocation.
pub trait ActionFilter {
    /// Called before the action; setting a result cancels the inner chain.
    ///
    /// # Errors
    ///
    /// Any error is delivered to the outer executed hooks.
    fn on_action_executing(&self, context: &mut ActionExecutingContext<'_>) -> anyhow::Result<()> {
        let _ = context;
        Ok(())
    }

    /// Called after the action, or after the inner chain failed or was canceled.
    ///
    /// # Errors
    ///
    /// Any error replaces the current outcome.
    fn on_action_executed(&self, context: &mut ActionExecutedContext<'_>) -> anyhow::Result<()> {
        let _ = context;
        Ok(())
    }
}

/// Runs around result execution.
pub trait ResultFilter {
    /// Called before the result executes; setting `cancel` skips it.
    ///
    /// # Errors
    ///
    /// Any error is delivered to the outer executed hooks.
    fn on_result_executing(&self, context: &mut ResultExecutingContext<'_>) -> anyhow::Result<()> {
        let _ = context;
        Ok(())
    }

    /// Called after the result executed, was canceled, or failed.
    ///
    /// # Errors
    ///
    /// Any error replaces the current outcome.
    fn on_result_executed(&self, context: &mut ResultExecutedContext<'_>) -> anyhow::Result<()> {
        let _ = context;
        Ok(())
    }
}

/// Offered any failure that escapes the pipeline.
pub trait ExceptionFilter {
    /// Inspect the failure; mark it handled to stop it propagating.
    ///
    /// # Errors
    ///
    /// An error here replaces the original failure.
    fn on_exception(&self, context: &mut ExceptionContext<'_>) -> anyhow::Result<()>;
}

/// Where a filter was declared. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterScope {
    /// Ahead of everything else (the controller itself)
    First,
    /// Registered application-wide
    Global,
    /// Declared on the controller
    Controller,
    /// Declared on the action
    Action,
    /// After everything else
    Last,
}

/// A filter instance with its scope and order.
#[derive(Clone)]
pub struct Filter {
    /// The filter
    pub instance: Arc<dyn MvcFilter>,
    /// Where it was declared
    pub scope: FilterScope,
    /// Order within the scope
    pub order: i32,
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("filter", &self.instance.filter_name())
            .field("scope", &self.scope)
            .field("order", &self.order)
            .finish()
    }
}

impl Filter {
    /// Wrap `instance`, taking the order from the instance when none is given.
    #[must_use]
    pub fn new(instance: Arc<dyn MvcFilter>, scope: FilterScope, order: Option<i32>) -> Self {
        let order = order.unwrap_or_else(|| instance.order());
        Self {
            instance,
            scope,
            order,
        }
    }
}

/// Sort filters by (scope, order), keeping declaration order for ties.
pub fn sort_filters(filters: &mut [Filter]) {
    filters.sort_by_key(|f| (f.scope, f.order));
}

/// Drop all but the last instance of each filter type that does not allow
/// multiple instances. Expects sorted input; relative order is preserved.
#[must_use]
pub fn remove_duplicates(filters: Vec<Filter>) -> Vec<Filter> {
    let mut seen: Vec<&'static str> = Vec::new();
    let mut kept: Vec<Filter> = Vec::with_capacity(filters.len());
    for filter in filters.into_iter().rev() {
        if !filter.instance.allow_multiple() {
            let name = filter.instance.filter_name();
            if seen.contains(&name) {
                continue;
            }
            seen.push(name);
        }
        kept.push(filter);
    }
    kept.reverse();
    kept
}

/// The filters for one action, split by stage, each list in execution order.
///
/// Exception filters are stored in sorted order; the invoker offers a failure
/// to them from the end of the list backwards.
#[derive(Clone, Default)]
pub struct FilterInfo {
    /// Authorization filters
    pub authorization_filters: Vec<Arc<dyn MvcFilter>>,
    /// Action filters
    pub action_filters: Vec<Arc<dyn MvcFilter>>,
    /// Result filters
    pub result_filters: Vec<Arc<dyn MvcFilter>>,
    /// Exception filters
    pub exception_filters: Vec<Arc<dyn MvcFilter>>,
}

impl std::fmt::Debug for FilterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |list: &[Arc<dyn MvcFilter>]| list.iter().map(|f| f.filter_name()).collect::<Vec<_>>();
        f.debug_struct("FilterInfo")
            .field("authorization_filters", &names(&self.authorization_filters))
            .field("action_filters", &names(&self.action_filters))
            .field("result_filters", &names(&self.result_filters))
            .field("exception_filters", &names(&self.exception_filters))
            .finish()
    }
}

impl FilterInfo {
    /// Partition sorted filters by capability.
    #[must_use]
    pub fn new(filters: &[Filter]) -> Self {
        let mut info = Self::default();
        for filter in filters {
            let instance = &filter.instance;
            if instance.as_authorization_filter().is_some() {
                info.authorization_filters.push(Arc::clone(instance));
            }
            if instance.as_action_filter().is_some() {
                info.action_filters.push(Arc::clone(instance));
            }
            if instance.as_result_filter().is_some() {
                info.result_filters.push(Arc::clone(instance));
            }
            if instance.as_exception_filter().is_some() {
                info.exception_filters.push(Arc::clone(instance));
            }
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Named(&'static str, bool);

    impl MvcFilter for Named {
        fn allow_multiple(&self) -> bool {
            self.1
        }

        fn filter_name(&self) -> &'static str {
            self.0
        }

        fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
            Some(self)
        }
    }

    impl ActionFilter for Named {}

    fn filter(name: &'static str, scope: FilterScope, order: i32) -> Filter {
        Filter::new(Arc::new(Named(name, true)), scope, Some(order))
    }

    #[test]
    fn test_scope_is_primary_key() {
        let mut filters = vec![
            filter("action", FilterScope::Action, -10),
            filter("global", FilterScope::Global, 5),
            filter("controller", FilterScope::Controller, 0),
            filter("first", FilterScope::First, 100),
        ];
        sort_filters(&mut filters);
        let names: Vec<_> = filters.iter().map(|f| f.instance.filter_name()).collect();
        assert_eq!(names, vec!["first", "global", "controller", "action"]);
    }

    #[test]
    fn test_default_order_comes_from_instance() {
        let f = Filter::new(Arc::new(Named("x", true)), FilterScope::Action, None);
        assert_eq!(f.order, DEFAULT_ORDER);
    }

    #[test]
    fn test_single_use_filters_keep_most_specific() {
        let filters = vec![
            Filter::new(Arc::new(Named("auth", false)), FilterScope::Global, None),
            filter("log", FilterScope::Global, 0),
            Filter::new(Arc::new(Named("auth", false)), FilterScope::Action, Some(7)),
            filter("log", FilterScope::Action, 0),
        ];
        let kept = remove_duplicates(filters);
        let summary: Vec<_> = kept
            .iter()
            .map(|f| (f.instance.filter_name(), f.scope))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("log", FilterScope::Global),
                ("auth", FilterScope::Action),
                ("log", FilterScope::Action),
            ]
        );
    }

    #[test]
    fn test_filter_info_partitions_by_capability() {
        let filters = vec![filter("a", FilterScope::Action, 0)];
        let info = FilterInfo::new(&filters);
        assert_eq!(info.action_filters.len(), 1);
        assert!(info.authorization_filters.is_empty());
        assert!(info.result_filters.is_empty());
        assert!(info.exception_filters.is_empty());
    }

    fn scope_strategy() -> impl Strategy<Value = FilterScope> {
        prop_oneof![
            Just(FilterScope::First),
            Just(FilterScope::Global),
            Just(FilterScope::Controller),
            Just(FilterScope::Action),
            Just(FilterScope::Last),
        ]
    }

    proptest! {
        #[test]
        fn prop_sort_is_ordered_and_stable(entries in prop::collection::vec((scope_strategy(), -3i32..3), 0..40)) {
            let declared: Vec<Filter> = entries
                .iter()
                .map(|(scope, order)| filter("f", *scope, *order))
                .collect();
            let mut sorted = declared.clone();
            sort_filters(&mut sorted);

            // Position of each sorted filter in declaration order.
            let positions: Vec<usize> = sorted
                .iter()
                .map(|f| {
                    declared
                        .iter()
                        .position(|d| Arc::ptr_eq(&d.instance, &f.instance))
                        .unwrap_or(usize::MAX)
                })
                .collect();
            let mut seen = positions.clone();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..declared.len()).collect::<Vec<_>>());

            let tagged: Vec<(usize, &Filter)> = positions.iter().copied().zip(sorted.iter()).collect();
            for window in tagged.windows(2) {
                let (ia, a) = window[0];
                let (ib, b) = window[1];
                prop_assert!((a.scope, a.order) <= (b.scope, b.order));
                if (a.scope, a.order) == (b.scope, b.order) {
                    prop_assert!(ia < ib, "equal keys reordered: {} after {}", ia, ib);
                }
            }
        }
    }
}
