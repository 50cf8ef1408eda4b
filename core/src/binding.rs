//! The model binder seam.
//!
//! The pipeline binds each action parameter through a [`ModelBinder`]: the
//! parameter's own binder when it declares one, otherwise the application's
//! default binder.

use crate::controller::ControllerContext;
use crate::error::MvcResult;
use crate::metadata::ModelMetadata;
use crate::value_providers::ValueProvider;
use serde_json::Value;
use std::sync::Arc;

/// Everything a binder needs to bind one model.
pub struct ModelBindingContext<'a> {
    /// Key prefix for the model's values
    pub model_name: String,
    /// What is being bound
    pub model_metadata: Arc<ModelMetadata>,
    /// Request values
    pub value_provider: &'a dyn ValueProvider,
    /// Retry with the empty prefix when nothing matches `model_name`
    pub fallback_to_empty_prefix: bool,
    /// Whether the action has request validation turned on
    pub validate_request: bool,
}

impl std::fmt::Debug for ModelBindingContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBindingContext")
            .field("model_name", &self.model_name)
            .field("model", &self.model_metadata.name())
            .field("fallback_to_empty_prefix", &self.fallback_to_empty_prefix)
            .field("validate_request", &self.validate_request)
            .finish_non_exhaustive()
    }
}

/// Produces a model value from request data.
pub trait ModelBinder: Send + Sync {
    /// Bind the model, recording attempted values and errors in
    /// `context.model_state`. `None` means no value was supplied.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::MvcError::RequestValidation`] when a value is
    /// rejected by request validation.
    fn bind_model(
        &self,
        context: &mut ControllerContext,
        binding: &ModelBindingContext<'_>,
    ) -> MvcResult<Option<Value>>;
}
