//! View engines and the registry that queries them.
//!
//! A [`ViewEngine`] turns a view name into a renderable [`View`]. The
//! [`ViewEngineCollection`] asks every engine twice: first with
//! `use_cache = true` so engines can answer from their location caches without
//! touching storage, then with `use_cache = false`. The first engine that
//! finds the view wins; if none does, the caller gets the union of every
//! location the engines searched.

mod location_cache;
mod template;

pub use location_cache::{DefaultViewLocationCache, NullViewLocationCache, ViewLocationCache};
pub use template::{TemplateRenderer, TemplateViewEngine, VirtualPathProvider};

use crate::controller::{ControllerContext, ViewDataDictionary};
use crate::dependency::{DependencyResolver, DependencyResolverExt};
use crate::error::MvcResult;
use serde_json::Value;
use std::sync::Arc;

/// What a view sees while rendering.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    /// The request's controller context
    pub controller_context: &'a ControllerContext,
    /// Name the view was requested under
    pub view_name: &'a str,
}

impl<'a> ViewContext<'a> {
    /// Create a context for rendering `view_name`.
    #[must_use]
    pub const fn new(controller_context: &'a ControllerContext, view_name: &'a str) -> Self {
        Self {
            controller_context,
            view_name,
        }
    }

    /// The view data.
    #[must_use]
    pub const fn view_data(&self) -> &'a ViewDataDictionary {
        &self.controller_context.view_data
    }

    /// The view model, if any.
    #[must_use]
    pub fn model(&self) -> Option<&'a Value> {
        self.controller_context.view_data.model.as_ref()
    }
}

/// A renderable view.
pub trait View: Send + Sync {
    /// Render into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::MvcError::Render`] when rendering fails.
    fn render(&self, context: &ViewContext<'_>, output: &mut String) -> MvcResult<()>;
}

/// Result of asking an engine (or the registry) for a view.
#[derive(Clone, Default)]
pub struct ViewEngineResult {
    /// The view, when found
    pub view: Option<Arc<dyn View>>,
    /// The engine that found it; set by the registry
    pub view_engine: Option<Arc<dyn ViewEngine>>,
    /// Locations probed without success
    pub searched_locations: Vec<String>,
}

impl std::fmt::Debug for ViewEngineResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEngineResult")
            .field("found", &self.view.is_some())
            .field("searched_locations", &self.searched_locations)
            .finish()
    }
}

impl ViewEngineResult {
    /// A found view.
    #[must_use]
    pub fn found(view: Arc<dyn View>) -> Self {
        Self {
            view: Some(view),
            view_engine: None,
            searched_locations: Vec::new(),
        }
    }

    /// Nothing found after probing `searched_locations`.
    #[must_use]
    pub const fn not_found(searched_locations: Vec<String>) -> Self {
        Self {
            view: None,
            view_engine: None,
            searched_locations,
        }
    }

    /// Whether a view was found.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        self.view.is_some()
    }
}

/// Locates views by name.
pub trait ViewEngine: Send + Sync {
    /// Find a full view, optionally inside `master_name`.
    ///
    /// With `use_cache` set the engine must answer from its cache only.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty view name, missing route data, or when
    /// the view cannot be created.
    fn find_view(
        &self,
        context: &ControllerContext,
        view_name: &str,
        master_name: Option<&str>,
        use_cache: bool,
    ) -> MvcResult<ViewEngineResult>;

    /// Find a partial view.
    ///
    /// # Errors
    ///
    /// As for [`ViewEngine::find_view`].
    fn find_partial_view(
        &self,
        context: &ControllerContext,
        partial_view_name: &str,
        use_cache: bool,
    ) -> MvcResult<ViewEngineResult>;

    /// Release a view after rendering.
    fn release_view(&self, context: &ControllerContext, view: &Arc<dyn View>) {
        let _ = (context, view);
    }
}

/// The ordered engine registry.
#[derive(Clone, Default)]
pub struct ViewEngineCollection {
    engines: Vec<Arc<dyn ViewEngine>>,
}

impl std::fmt::Debug for ViewEngineCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEngineCollection")
            .field("engines", &self.engines.len())
            .finish()
    }
}

impl ViewEngineCollection {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an engine.
    pub fn push(&mut self, engine: Arc<dyn ViewEngine>) {
        self.engines.push(engine);
    }

    /// Insert an engine at `index` (clamped to the end).
    pub fn insert(&mut self, index: usize, engine: Arc<dyn ViewEngine>) {
        let index = index.min(self.engines.len());
        self.engines.insert(index, engine);
    }

    /// Remove every engine.
    pub fn clear(&mut self) {
        self.engines.clear();
    }

    /// Number of engines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Whether no engines are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// A registry with the resolver's engines ahead of these.
    #[must_use]
    pub fn combined_with(&self, resolver: &dyn DependencyResolver) -> Self {
        let mut engines = resolver.services::<dyn ViewEngine>();
        engines.extend(self.engines.iter().cloned());
        Self { engines }
    }

    /// Find a full view.
    ///
    /// # Errors
    ///
    /// Propagates the first engine error.
    pub fn find_view(
        &self,
        context: &ControllerContext,
        view_name: &str,
        master_name: Option<&str>,
    ) -> MvcResult<ViewEngineResult> {
        self.find(|engine, use_cache| engine.find_view(context, view_name, master_name, use_cache))
    }

    /// Find a partial view.
    ///
    /// # Errors
    ///
    /// Propagates the first engine error.
    pub fn find_partial_view(
        &self,
        context: &ControllerContext,
        partial_view_name: &str,
    ) -> MvcResult<ViewEngineResult> {
        self.find(|engine, use_cache| engine.find_partial_view(context, partial_view_name, use_cache))
    }

    fn find<F>(&self, lookup: F) -> MvcResult<ViewEngineResult>
    where
        F: Fn(&dyn ViewEngine, bool) -> MvcResult<ViewEngineResult>,
    {
        let mut searched: Vec<String> = Vec::new();
        for use_cache in [true, false] {
            for engine in &self.engines {
                let mut result = lookup(engine.as_ref(), use_cache)?;
                if result.is_found() {
                    result.view_engine = Some(Arc::clone(engine));
                    return Ok(result);
                }
                for location in result.searched_locations {
                    if !searched.contains(&location) {
                        searched.push(location);
                    }
                }
            }
        }
        Ok(ViewEngineResult::not_found(searched))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::controller::{Controller, ControllerInstance, ControllerType};
    use crate::descriptor::ControllerDescriptorBuilder;
    use crate::filters::MvcFilter;
    use crate::http::{HttpRequest, RequestContext, RouteData};
    use http::Method;
    use parking_lot::Mutex;
    use std::any::Any;

    struct Blank;
    impl MvcFilter for Blank {}
    impl Controller for Blank {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }
    impl ControllerType for Blank {
        const NAME: &'static str = "Blank";
        fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
            descriptor
        }
    }

    struct Text;
    impl View for Text {
        fn render(&self, _context: &ViewContext<'_>, output: &mut String) -> MvcResult<()> {
            output.push_str("text");
            Ok(())
        }
    }

    /// Finds its view only in the uncached pass, recording every call.
    struct Probe {
        name: &'static str,
        has_view: bool,
        calls: Mutex<Vec<bool>>,
    }

    impl ViewEngine for Probe {
        fn find_view(
            &self,
            _context: &ControllerContext,
            view_name: &str,
            _master_name: Option<&str>,
            use_cache: bool,
        ) -> MvcResult<ViewEngineResult> {
            self.calls.lock().push(use_cache);
            if self.has_view && !use_cache {
                return Ok(ViewEngineResult::found(Arc::new(Text)));
            }
            Ok(ViewEngineResult::not_found(vec![format!("{}/{view_name}", self.name)]))
        }

        fn find_partial_view(
            &self,
            context: &ControllerContext,
            partial_view_name: &str,
            use_cache: bool,
        ) -> MvcResult<ViewEngineResult> {
            self.find_view(context, partial_view_name, None, use_cache)
        }
    }

    fn context() -> ControllerContext {
        ControllerContext::new(
            RequestContext::new(HttpRequest::new(Method::GET, "/"), RouteData::for_action("Blank", "Index")),
            "Blank",
            ControllerInstance::new(Blank),
        )
    }

    fn probe(name: &'static str, has_view: bool) -> Arc<Probe> {
        Arc::new(Probe {
            name,
            has_view,
            calls: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_cached_pass_runs_before_uncached_pass() {
        let first = probe("first", false);
        let second = probe("second", true);
        let mut engines = ViewEngineCollection::new();
        engines.push(first.clone());
        engines.push(second.clone());

        let result = engines.find_view(&context(), "Index", None).unwrap();
        assert!(result.is_found());
        assert!(result.view_engine.is_some());
        assert_eq!(*first.calls.lock(), vec![true, false]);
        assert_eq!(*second.calls.lock(), vec![true, false]);
    }

    #[test]
    fn test_not_found_unions_searched_locations() {
        let mut engines = ViewEngineCollection::new();
        engines.push(probe("a", false));
        engines.push(probe("b", false));

        let result = engines.find_partial_view(&context(), "Menu").unwrap();
        assert!(!result.is_found());
        assert_eq!(result.searched_locations, vec!["a/Menu", "b/Menu"]);
    }
}
