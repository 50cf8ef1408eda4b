use super::{ModelValidationContext, ModelValidationResult, ModelValidator, ModelValidatorProvider};
use crate::metadata::{DataErrorInfo, ModelMetadata};
use serde_json::Value;
use std::sync::Arc;

/// Reports the error a model's [`DataErrorInfo`] gives for the whole model.
pub struct DataErrorInfoClassModelValidator {
    info: Arc<dyn DataErrorInfo>,
}

impl DataErrorInfoClassModelValidator {
    /// Wrap `info`.
    #[must_use]
    pub fn new(info: Arc<dyn DataErrorInfo>) -> Self {
        Self { info }
    }
}

impl ModelValidator for DataErrorInfoClassModelValidator {
    fn validate(
        &self,
        _metadata: &ModelMetadata,
        _container: Option<&Value>,
        model: &Value,
    ) -> Vec<ModelValidationResult> {
        self.info
            .error(model)
            .filter(|message| !message.is_empty())
            .map(ModelValidationResult::new)
            .into_iter()
            .collect()
    }
}

/// Reports the error the container's [`DataErrorInfo`] gives for one property.
pub struct DataErrorInfoPropertyModelValidator {
    info: Arc<dyn DataErrorInfo>,
}

impl DataErrorInfoPropertyModelValidator {
    /// Wrap the container's `info`.
    #[must_use]
    pub fn new(info: Arc<dyn DataErrorInfo>) -> Self {
        Self { info }
    }
}

impl ModelValidator for DataErrorInfoPropertyModelValidator {
    fn validate(
        &self,
        metadata: &ModelMetadata,
        container: Option<&Value>,
        _model: &Value,
    ) -> Vec<ModelValidationResult> {
        container
            .and_then(|c| self.info.property_error(c, metadata.name()))
            .filter(|message| !message.is_empty())
            .map(ModelValidationResult::new)
            .into_iter()
            .collect()
    }
}

/// Validators backed by model-supplied error information.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataErrorInfoModelValidatorProvider;

impl ModelValidatorProvider for DataErrorInfoModelValidatorProvider {
    fn get_validators(
        &self,
        metadata: &ModelMetadata,
        context: &ModelValidationContext<'_>,
    ) -> Vec<Box<dyn ModelValidator>> {
        let mut validators: Vec<Box<dyn ModelValidator>> = Vec::new();
        if let Some(info) = metadata.error_info() {
            validators.push(Box::new(DataErrorInfoClassModelValidator::new(Arc::clone(info))));
        }
        if let Some(info) = context.container_metadata.and_then(ModelMetadata::error_info) {
            validators.push(Box::new(DataErrorInfoPropertyModelValidator::new(Arc::clone(info))));
        }
        validators
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Booking;

    impl DataErrorInfo for Booking {
        fn property_error(&self, model: &Value, property: &str) -> Option<String> {
            let nights = model.get("Nights")?.as_i64()?;
            (property == "Nights" && nights > 14).then(|| "Stays are limited to two weeks".to_string())
        }
    }

    #[test]
    fn test_property_error_comes_from_container() {
        let container = json!({"Nights": 20});
        let metadata = ModelMetadata::integer("Nights").build();
        let validator = DataErrorInfoPropertyModelValidator::new(Arc::new(Booking));
        let results = validator.validate(&metadata, Some(&container), &json!(20));
        assert_eq!(results, vec![ModelValidationResult::new("Stays are limited to two weeks")]);
        assert!(validator.validate(&metadata, None, &json!(20)).is_empty());
    }
}
