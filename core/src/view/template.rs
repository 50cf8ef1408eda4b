use super::{
    DefaultViewLocationCache, NullViewLocationCache, View, ViewEngine, ViewEngineResult, ViewLocationCache,
};
use crate::config::MvcOptions;
use crate::controller::ControllerContext;
use crate::error::{MvcError, MvcResult};
use std::sync::Arc;

/// Answers whether a virtual path exists.
pub trait VirtualPathProvider: Send + Sync {
    /// Whether a file exists at `virtual_path`.
    fn file_exists(&self, virtual_path: &str) -> bool;
}

/// Turns located template files into views.
pub trait TemplateRenderer: Send + Sync {
    /// Create a full view, optionally inside a layout.
    ///
    /// # Errors
    ///
    /// Returns [`MvcError::Render`] when the template cannot be loaded.
    fn create_view(&self, view_path: &str, master_path: Option<&str>) -> MvcResult<Arc<dyn View>>;

    /// Create a partial view.
    ///
    /// # Errors
    ///
    /// Returns [`MvcError::Render`] when the template cannot be loaded.
    fn create_partial_view(&self, partial_path: &str) -> MvcResult<Arc<dyn View>>;
}

/// A view engine that probes location formats through a [`VirtualPathProvider`].
///
/// In location formats `{0}` is the view name and `{1}` the controller's
/// registered name.
/// Names starting with `~` or `/` are treated as paths and probed as given.
pub struct TemplateViewEngine {
    view_location_formats: Vec<String>,
    master_location_formats: Vec<String>,
    partial_view_location_formats: Vec<String>,
    path_provider: Arc<dyn VirtualPathProvider>,
    renderer: Arc<dyn TemplateRenderer>,
    location_cache: Arc<dyn ViewLocationCache>,
}

impl std::fmt::Debug for TemplateViewEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateViewEngine")
            .field("view_location_formats", &self.view_location_formats)
            .field("master_location_formats", &self.master_location_formats)
            .field("partial_view_location_formats", &self.partial_view_location_formats)
            .finish_non_exhaustive()
    }
}

impl TemplateViewEngine {
    /// An engine probing `~/Views/{controller}/{name}.{extension}` then
    /// `~/Views/Shared/{name}.{extension}`, without a location cache.
    #[must_use]
    pub fn new(
        path_provider: Arc<dyn VirtualPathProvider>,
        renderer: Arc<dyn TemplateRenderer>,
        extension: &str,
    ) -> Self {
        let formats = vec![
            format!("~/Views/{{1}}/{{0}}.{extension}"),
            format!("~/Views/Shared/{{0}}.{extension}"),
        ];
        Self {
            view_location_formats: formats.clone(),
            master_location_formats: formats.clone(),
            partial_view_location_formats: formats,
            path_provider,
            renderer,
            location_cache: Arc::new(NullViewLocationCache),
        }
    }

    /// An engine probing `options.view_file_extension`, remembering locations
    /// for `options.view_location_cache_secs` (no cache when zero).
    #[must_use]
    pub fn from_options(
        path_provider: Arc<dyn VirtualPathProvider>,
        renderer: Arc<dyn TemplateRenderer>,
        options: &MvcOptions,
    ) -> Self {
        let engine = Self::new(path_provider, renderer, &options.view_file_extension);
        match options.view_location_cache_window() {
            Some(window) => engine.with_location_cache(Arc::new(DefaultViewLocationCache::new(window))),
            None => engine,
        }
    }

    /// Use `cache` to remember view locations.
    #[must_use]
    pub fn with_location_cache(mut self, cache: Arc<dyn ViewLocationCache>) -> Self {
        self.location_cache = cache;
        self
    }

    /// Replace the full-view location formats.
    #[must_use]
    pub fn with_view_location_formats(mut self, formats: Vec<String>) -> Self {
        self.view_location_formats = formats;
        self
    }

    /// Replace the layout location formats.
    #[must_use]
    pub fn with_master_location_formats(mut self, formats: Vec<String>) -> Self {
        self.master_location_formats = formats;
        self
    }

    /// Replace the partial-view location formats.
    #[must_use]
    pub fn with_partial_view_location_formats(mut self, formats: Vec<String>) -> Self {
        self.partial_view_location_formats = formats;
        self
    }

    fn controller_name(context: &ControllerContext) -> &'static str {
        context.controller.controller_name()
    }

    /// Resolve `name` against `formats`, appending failed probes to `searched`.
    fn get_path(
        &self,
        formats: &[String],
        kind: &str,
        name: &str,
        controller: &str,
        use_cache: bool,
        searched: &mut Vec<String>,
    ) -> Option<String> {
        let cache_key = format!("{kind}:{name}:{controller}");
        if use_cache {
            return self.location_cache.get_view_location(&cache_key);
        }

        let candidates: Vec<String> = if name.starts_with('~') || name.starts_with('/') {
            vec![name.to_string()]
        } else {
            formats
                .iter()
                .map(|f| f.replace("{0}", name).replace("{1}", controller))
                .collect()
        };

        for candidate in candidates {
            if self.path_provider.file_exists(&candidate) {
                self.location_cache
                    .insert_view_location(&cache_key, &candidate);
                return Some(candidate);
            }
            searched.push(candidate);
        }
        None
    }
}

impl ViewEngine for TemplateViewEngine {
    fn find_view(
        &self,
        context: &ControllerContext,
        view_name: &str,
        master_name: Option<&str>,
        use_cache: bool,
    ) -> MvcResult<ViewEngineResult> {
        if view_name.is_empty() {
            return Err(MvcError::argument("view_name", "must not be empty"));
        }
        let controller = Self::controller_name(context);
        let mut searched = Vec::new();

        let view_path = self.get_path(
            &self.view_location_formats,
            "View",
            view_name,
            controller,
            use_cache,
            &mut searched,
        );
        let master_path = match master_name.filter(|m| !m.is_empty()) {
            Some(master) => self.get_path(
                &self.master_location_formats,
                "Master",
                master,
                controller,
                use_cache,
                &mut searched,
            ),
            None => Some(String::new()),
        };

        match (view_path, master_path) {
            (Some(view_path), Some(master_path)) => {
                let master = (!master_path.is_empty()).then_some(master_path.as_str());
                tracing::debug!(view = %view_path, master = ?master, "view located");
                Ok(ViewEngineResult::found(self.renderer.create_view(&view_path, master)?))
            }
            _ => Ok(ViewEngineResult::not_found(searched)),
        }
    }

    fn find_partial_view(
        &self,
        context: &ControllerContext,
        partial_view_name: &str,
        use_cache: bool,
    ) -> MvcResult<ViewEngineResult> {
        if partial_view_name.is_empty() {
            return Err(MvcError::argument("partial_view_name", "must not be empty"));
        }
        let controller = Self::controller_name(context);
        let mut searched = Vec::new();

        match self.get_path(
            &self.partial_view_location_formats,
            "Partial",
            partial_view_name,
            controller,
            use_cache,
            &mut searched,
        ) {
            Some(path) => Ok(ViewEngineResult::found(self.renderer.create_partial_view(&path)?)),
            None => Ok(ViewEngineResult::not_found(searched)),
        }
    }
}
