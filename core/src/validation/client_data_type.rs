use super::{
    ModelClientValidationRule, ModelValidationContext, ModelValidationResult, ModelValidator,
    ModelValidatorProvider, format_message,
};
use crate::metadata::ModelMetadata;
use serde_json::Value;

/// Client-only check that a numeric field holds a number.
///
/// Server-side conversion failures are already reported by the binder, so
/// this validator never fails on the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericModelValidator;

impl ModelValidator for NumericModelValidator {
    fn validate(
        &self,
        _metadata: &ModelMetadata,
        _container: Option<&Value>,
        _model: &Value,
    ) -> Vec<ModelValidationResult> {
        Vec::new()
    }

    fn client_validation_rules(&self, metadata: &ModelMetadata) -> Vec<ModelClientValidationRule> {
        vec![ModelClientValidationRule::new(
            "number",
            format_message("The field {0} must be a number.", &[metadata.display_name()]),
        )]
    }
}

/// Adds [`NumericModelValidator`] to numeric kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientDataTypeModelValidatorProvider;

impl ModelValidatorProvider for ClientDataTypeModelValidatorProvider {
    fn get_validators(
        &self,
        metadata: &ModelMetadata,
        _context: &ModelValidationContext<'_>,
    ) -> Vec<Box<dyn ModelValidator>> {
        if metadata.kind().is_numeric() {
            vec![Box::new(NumericModelValidator)]
        } else {
            Vec::new()
        }
    }
}
