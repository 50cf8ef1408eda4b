//! Application state for Axum handlers.

use composable_mvc_runtime::MvcApplication;
use std::sync::Arc;

/// State shared by every MVC handler.
#[derive(Debug, Clone)]
pub struct MvcState {
    app: Arc<MvcApplication>,
}

impl MvcState {
    /// Wrap a built application.
    #[must_use]
    pub fn new(app: MvcApplication) -> Self {
        Self { app: Arc::new(app) }
    }

    /// The application.
    #[must_use]
    pub fn app(&self) -> &Arc<MvcApplication> {
        &self.app
    }
}

impl From<MvcApplication> for MvcState {
    fn from(app: MvcApplication) -> Self {
        Self::new(app)
    }
}
