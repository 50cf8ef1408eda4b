//! The default model binder.
//!
//! Simple kinds bind from the single value stored under the model name.
//! Complex kinds bind each property from `prefix.Property`; collections bind
//! either the repeated values stored under the model name or the indexed
//! entries `prefix[0]`, `prefix[1]`, ... up to the first gap. Once a complex
//! or collection model is bound, it is validated and validation failures are
//! recorded for keys that bound without errors.

use composable_mvc_core::binding::{ModelBinder, ModelBindingContext};
use composable_mvc_core::config::MvcOptions;
use composable_mvc_core::controller::ControllerContext;
use composable_mvc_core::error::MvcResult;
use composable_mvc_core::metadata::{ModelKind, ModelMetadata};
use composable_mvc_core::validation::ModelValidatorProviderCollection;
use composable_mvc_core::value_providers::{
    ValueProvider, ValueProviderResult, create_sub_index_name, create_sub_property_name,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Binder used for parameters that do not declare their own.
#[derive(Debug, Clone)]
pub struct DefaultModelBinder {
    validator_providers: ModelValidatorProviderCollection,
    request_validation: bool,
}

impl Default for DefaultModelBinder {
    fn default() -> Self {
        Self::with_options(&MvcOptions::default())
    }
}

/// Per-call state shared by every node of one model.
#[derive(Clone, Copy)]
struct Scope<'a> {
    provider: &'a dyn ValueProvider,
    validate_request: bool,
}

impl DefaultModelBinder {
    /// A binder validating with `validator_providers`.
    ///
    /// `request_validation` is the application-wide switch; actions and
    /// metadata can only narrow it.
    #[must_use]
    pub const fn new(
        validator_providers: ModelValidatorProviderCollection,
        request_validation: bool,
    ) -> Self {
        Self {
            validator_providers,
            request_validation,
        }
    }

    /// A binder with the default validator providers configured from `options`.
    #[must_use]
    pub fn with_options(options: &MvcOptions) -> Self {
        Self::new(
            ModelValidatorProviderCollection::with_options(options),
            options.request_validation,
        )
    }

    /// The providers used to validate bound models.
    #[must_use]
    pub const fn validator_providers(&self) -> &ModelValidatorProviderCollection {
        &self.validator_providers
    }

    fn get_value(
        &self,
        scope: Scope<'_>,
        metadata: &ModelMetadata,
        key: &str,
    ) -> MvcResult<Option<ValueProviderResult>> {
        let skip_validation = !(self.request_validation
            && scope.validate_request
            && metadata.request_validation_enabled());
        match scope.provider.as_unvalidated() {
            Some(provider) => provider.get_value_unvalidated(key, skip_validation),
            None => scope.provider.get_value(key),
        }
    }

    fn bind_node(
        &self,
        context: &mut ControllerContext,
        scope: Scope<'_>,
        metadata: &ModelMetadata,
        key: &str,
    ) -> MvcResult<Option<Value>> {
        match metadata.kind() {
            ModelKind::Complex => Ok(Some(self.bind_complex(context, scope, metadata, key)?)),
            ModelKind::Collection(element) => match self.get_value(scope, metadata, key)? {
                Some(result) => Ok(bind_repeated(context, metadata, element, key, &result)),
                None => self.bind_indexed(context, scope, element, key),
            },
            _ => Ok(self
                .get_value(scope, metadata, key)?
                .and_then(|result| bind_simple(context, metadata, key, &result))),
        }
    }

    fn bind_complex(
        &self,
        context: &mut ControllerContext,
        scope: Scope<'_>,
        metadata: &ModelMetadata,
        key: &str,
    ) -> MvcResult<Value> {
        let mut model = Map::new();
        for property in metadata.properties() {
            let property_key = create_sub_property_name(key, property.name());
            if !scope.provider.contains_prefix(&property_key) {
                continue;
            }
            if let Some(value) = self.bind_node(context, scope, property, &property_key)? {
                model.insert(property.name().to_string(), value);
            }
        }
        Ok(Value::Object(model))
    }

    fn bind_indexed(
        &self,
        context: &mut ControllerContext,
        scope: Scope<'_>,
        element: &ModelMetadata,
        key: &str,
    ) -> MvcResult<Option<Value>> {
        let mut items = Vec::new();
        loop {
            let element_key = create_sub_index_name(key, items.len());
            if !scope.provider.contains_prefix(&element_key) {
                break;
            }
            let item = self.bind_node(context, scope, element, &element_key)?;
            items.push(item.unwrap_or(Value::Null));
        }
        Ok((!items.is_empty()).then_some(Value::Array(items)))
    }

    fn validate(
        &self,
        context: &mut ControllerContext,
        metadata: &ModelMetadata,
        model: &Value,
        key: &str,
    ) {
        let results = self.validator_providers.validate(context, metadata, model, key);
        let mut started_valid: HashMap<String, bool> = HashMap::new();
        for result in results {
            let valid = *started_valid
                .entry(result.member_name.to_ascii_lowercase())
                .or_insert_with(|| context.model_state.is_valid_field(&result.member_name));
            if valid {
                context
                    .model_state
                    .add_model_error(&result.member_name, result.message);
            }
        }
    }
}

fn conversion_failed(
    context: &mut ControllerContext,
    metadata: &ModelMetadata,
    key: &str,
    attempted_value: &str,
) {
    tracing::debug!(key, attempted_value, "Value could not be converted");
    context.model_state.add_model_error(
        key,
        format!(
            "The value '{attempted_value}' is not valid for {}.",
            metadata.display_name()
        ),
    );
}

fn bind_simple(
    context: &mut ControllerContext,
    metadata: &ModelMetadata,
    key: &str,
    result: &ValueProviderResult,
) -> Option<Value> {
    context.model_state.set_model_value(key, result.clone());
    match result.convert_to(metadata.kind()) {
        Ok(Value::String(s)) if s.trim().is_empty() && metadata.convert_empty_string_to_null() => {
            Some(Value::Null)
        }
        Ok(value) => Some(value),
        Err(error) => {
            conversion_failed(context, metadata, key, &error.attempted_value);
            None
        }
    }
}

fn bind_repeated(
    context: &mut ControllerContext,
    metadata: &ModelMetadata,
    element: &ModelMetadata,
    key: &str,
    result: &ValueProviderResult,
) -> Option<Value> {
    context.model_state.set_model_value(key, result.clone());
    let raw = result.raw_value();
    if !element.kind().is_simple() {
        return Some(raw.clone());
    }
    let items = match raw {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    };
    let mut converted = Vec::with_capacity(items.len());
    for item in items {
        let attempted = match &item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let element_result = ValueProviderResult::new(item, attempted, result.culture());
        match element_result.convert_to(element.kind()) {
            Ok(value) => converted.push(value),
            Err(error) => {
                conversion_failed(context, metadata, key, &error.attempted_value);
                return None;
            }
        }
    }
    Some(Value::Array(converted))
}

impl ModelBinder for DefaultModelBinder {
    fn bind_model(
        &self,
        context: &mut ControllerContext,
        binding: &ModelBindingContext<'_>,
    ) -> MvcResult<Option<Value>> {
        let metadata = binding.model_metadata.as_ref();
        let scope = Scope {
            provider: binding.value_provider,
            validate_request: binding.validate_request,
        };

        let mut model_name = binding.model_name.as_str();
        let mut performed_fallback = false;
        if !model_name.is_empty() && !scope.provider.contains_prefix(model_name) {
            if !binding.fallback_to_empty_prefix {
                return Ok(None);
            }
            model_name = "";
            performed_fallback = true;
        }

        let model = if performed_fallback {
            // Only complex models can be assembled from unprefixed values.
            match metadata.kind() {
                ModelKind::Complex => Some(self.bind_complex(context, scope, metadata, "")?),
                _ => None,
            }
        } else {
            self.bind_node(context, scope, metadata, model_name)?
        };

        tracing::debug!(
            model = binding.model_name.as_str(),
            prefix = model_name,
            performed_fallback,
            bound = model.is_some(),
            "Model bound"
        );

        if let Some(value) = &model {
            if matches!(metadata.kind(), ModelKind::Complex | ModelKind::Collection(_)) {
                self.validate(context, metadata, value, model_name);
            }
        }
        Ok(model)
    }
}
