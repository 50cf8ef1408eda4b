//! Model validation.
//!
//! Validators come from an ordered list of [`ModelValidatorProvider`]s. Each
//! provider inspects a model's metadata and contributes zero or more
//! [`ModelValidator`]s; a validator checks values on the server and describes
//! itself to clients as [`ModelClientValidationRule`]s.
//!
//! Default providers, in order:
//! 1. [`DataAnnotationsModelValidatorProvider`] - the metadata's data annotations
//! 2. [`DataErrorInfoModelValidatorProvider`] - model-supplied error information
//! 3. [`ClientDataTypeModelValidatorProvider`] - client-side number checks

mod client_data_type;
mod data_annotations;
mod data_error_info;
mod unobtrusive;

pub use client_data_type::{ClientDataTypeModelValidatorProvider, NumericModelValidator};
pub use data_annotations::{
    AdapterFactory, AnnotationKind, DataAnnotation, DataAnnotationsModelValidator,
    DataAnnotationsModelValidatorProvider,
};
pub use data_error_info::{
    DataErrorInfoClassModelValidator, DataErrorInfoModelValidatorProvider,
    DataErrorInfoPropertyModelValidator,
};
pub use unobtrusive::{UnobtrusiveValidationError, unobtrusive_attributes};

use crate::config::MvcOptions;
use crate::controller::ControllerContext;
use crate::dependency::{DependencyResolver, DependencyResolverExt};
use crate::metadata::{ModelKind, ModelMetadata};
use crate::value_providers::{create_sub_index_name, create_sub_property_name};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelValidationResult {
    /// Key of the failing member, relative to the validated model; empty for the model itself
    pub member_name: String,
    /// User-facing message
    pub message: String,
}

impl ModelValidationResult {
    /// A failure of the validated model itself.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            member_name: String::new(),
            message: message.into(),
        }
    }
}

/// A validation rule as described to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelClientValidationRule {
    /// Rule name, e.g. `required`
    pub validation_type: String,
    /// Message to show when the rule fails
    pub error_message: String,
    /// Rule parameters
    pub validation_parameters: IndexMap<String, Value>,
}

impl ModelClientValidationRule {
    /// A rule without parameters.
    #[must_use]
    pub fn new(validation_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            validation_type: validation_type.into(),
            error_message: error_message.into(),
            validation_parameters: IndexMap::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.validation_parameters.insert(name.into(), value.into());
        self
    }

    /// `required`.
    #[must_use]
    pub fn required(error_message: impl Into<String>) -> Self {
        Self::new("required", error_message)
    }

    /// `range` with `min` and `max`.
    #[must_use]
    pub fn range(error_message: impl Into<String>, min: Value, max: Value) -> Self {
        Self::new("range", error_message)
            .with_parameter("min", min)
            .with_parameter("max", max)
    }

    /// `regex` with `pattern`.
    #[must_use]
    pub fn regex(error_message: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new("regex", error_message).with_parameter("pattern", pattern.into())
    }

    /// `length`; `min` is omitted when 0 and `max` when `i32::MAX`.
    #[must_use]
    pub fn string_length(error_message: impl Into<String>, min: i32, max: i32) -> Self {
        let mut rule = Self::new("length", error_message);
        if min != 0 {
            rule = rule.with_parameter("min", min);
        }
        if max != i32::MAX {
            rule = rule.with_parameter("max", max);
        }
        rule
    }

    /// `equalto` against `other`.
    #[must_use]
    pub fn equal_to(error_message: impl Into<String>, other: &str) -> Self {
        Self::new("equalto", error_message).with_parameter("other", format!("*.{other}"))
    }
}

/// Checks one model value.
pub trait ModelValidator: Send + Sync {
    /// Failures for `model`; `container` is the object holding it, if any.
    fn validate(
        &self,
        metadata: &ModelMetadata,
        container: Option<&Value>,
        model: &Value,
    ) -> Vec<ModelValidationResult>;

    /// Client-side description of the check.
    fn client_validation_rules(&self, metadata: &ModelMetadata) -> Vec<ModelClientValidationRule> {
        let _ = metadata;
        Vec::new()
    }

    /// Whether the validator demands a value.
    fn is_required(&self) -> bool {
        false
    }
}

/// What a provider knows besides the metadata itself.
#[derive(Debug, Clone, Copy)]
pub struct ModelValidationContext<'a> {
    /// The request's controller context
    pub controller_context: &'a ControllerContext,
    /// Metadata of the object holding the model, for properties
    pub container_metadata: Option<&'a ModelMetadata>,
}

/// Supplies validators for a model.
pub trait ModelValidatorProvider: Send + Sync {
    /// Validators for `metadata`.
    fn get_validators(
        &self,
        metadata: &ModelMetadata,
        context: &ModelValidationContext<'_>,
    ) -> Vec<Box<dyn ModelValidator>>;
}

/// The ordered provider registry.
#[derive(Clone)]
pub struct ModelValidatorProviderCollection {
    providers: Vec<Arc<dyn ModelValidatorProvider>>,
    client_validation: bool,
}

impl Default for ModelValidatorProviderCollection {
    fn default() -> Self {
        Self::with_options(&MvcOptions::default())
    }
}

impl std::fmt::Debug for ModelValidatorProviderCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelValidatorProviderCollection")
            .field("providers", &self.providers.len())
            .field("client_validation", &self.client_validation)
            .finish()
    }
}

impl ModelValidatorProviderCollection {
    /// The default providers configured from `options`.
    #[must_use]
    pub fn with_options(options: &MvcOptions) -> Self {
        Self {
            providers: vec![
                Arc::new(DataAnnotationsModelValidatorProvider::new(
                    options.implicit_required_for_value_types,
                )),
                Arc::new(DataErrorInfoModelValidatorProvider),
                Arc::new(ClientDataTypeModelValidatorProvider),
            ],
            client_validation: options.client_validation,
        }
    }

    /// A registry with no providers.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            providers: Vec::new(),
            client_validation: true,
        }
    }

    /// Append a provider.
    pub fn push(&mut self, provider: Arc<dyn ModelValidatorProvider>) {
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
        let mut providers = resolver.services::<dyn ModelValidatorProvider>();
        providers.extend(self.providers.iter().cloned());
        Self {
            providers,
            client_validation: self.client_validation,
        }
    }

    /// Whether client rules are produced.
    #[must_use]
    pub const fn client_validation_enabled(&self) -> bool {
        self.client_validation
    }

    /// Every provider's validators for `metadata`, in provider order.
    #[must_use]
    pub fn get_validators(
        &self,
        metadata: &ModelMetadata,
        context: &ModelValidationContext<'_>,
    ) -> Vec<Box<dyn ModelValidator>> {
        self.providers
            .iter()
            .flat_map(|p| p.get_validators(metadata, context))
            .collect()
    }

    /// Client rules for a top-level model or a property of `container_metadata`.
    ///
    /// Empty when client validation is switched off.
    #[must_use]
    pub fn client_validation_rules(
        &self,
        controller_context: &ControllerContext,
        metadata: &ModelMetadata,
        container_metadata: Option<&ModelMetadata>,
    ) -> Vec<ModelClientValidationRule> {
        if !self.client_validation {
            return Vec::new();
        }
        let context = ModelValidationContext {
            controller_context,
            container_metadata,
        };
        self.get_validators(metadata, &context)
            .iter()
            .flat_map(|v| v.client_validation_rules(metadata))
            .collect()
    }

    /// Validate `model` bound under `key`.
    ///
    /// Properties are validated first, recursively; validators of a model run
    /// only when all of its properties passed. Absent non-nullable value
    /// properties are validated as their default value. Member names in the
    /// results are full keys.
    #[must_use]
    pub fn validate(
        &self,
        controller_context: &ControllerContext,
        metadata: &ModelMetadata,
        model: &Value,
        key: &str,
    ) -> Vec<ModelValidationResult> {
        let mut results = Vec::new();
        self.validate_node(controller_context, metadata, None, None, model, key, &mut results);
        results
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_node(
        &self,
        controller_context: &ControllerContext,
        metadata: &ModelMetadata,
        container_metadata: Option<&ModelMetadata>,
        container: Option<&Value>,
        model: &Value,
        key: &str,
        results: &mut Vec<ModelValidationResult>,
    ) {
        let before = results.len();
        match (metadata.kind(), model) {
            (ModelKind::Complex, Value::Object(_)) => {
                for property in metadata.properties() {
                    let value = property_value(model, property.name())
                        .cloned()
                        .unwrap_or_else(|| property.default_value());
                    self.validate_node(
                        controller_context,
                        property,
                        Some(metadata),
                        Some(model),
                        &value,
                        &create_sub_property_name(key, property.name()),
                        results,
                    );
                }
            }
            (ModelKind::Collection(element), Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    self.validate_node(
                        controller_context,
                        element,
                        None,
                        Some(model),
                        item,
                        &create_sub_index_name(key, index),
                        results,
                    );
                }
            }
            _ => {}
        }
        if results.len() > before {
            return;
        }

        let context = ModelValidationContext {
            controller_context,
            container_metadata,
        };
        for validator in self.get_validators(metadata, &context) {
            results.extend(validator.validate(metadata, container, model).into_iter().map(|r| {
                ModelValidationResult {
                    member_name: create_sub_property_name(key, &r.member_name),
                    message: r.message,
                }
            }));
        }
    }
}

/// Case-insensitive property lookup on a JSON object.
#[must_use]
pub fn property_value<'a>(model: &'a Value, property: &str) -> Option<&'a Value> {
    model
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(property))
        .map(|(_, v)| v)
}

/// Substitute `{0}`, `{1}`, ... in a message template.
///
/// Placeholders are replaced in one pass, so braces inside an argument are
/// copied as they are. Placeholders without a matching argument stay.
#[must_use]
pub fn format_message(template: &str, arguments: &[&str]) -> String {
    let mut message = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        message.push_str(&rest[..open]);
        let tail = &rest[open..];
        let argument = tail[1..]
            .find('}')
            .and_then(|close| tail[1..=close].parse::<usize>().ok().map(|index| (index, close)))
            .and_then(|(index, close)| arguments.get(index).map(|argument| (*argument, close)));
        match argument {
            Some((argument, close)) => {
                message.push_str(argument);
                rest = &tail[close + 2..];
            }
            None => {
                message.push('{');
                rest = &tail[1..];
            }
        }
    }
    message.push_str(rest);
    message
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
    use serde_json::json;
    use std::any::Any;

    struct Accounts;
    impl MvcFilter for Accounts {}
    impl Controller for Accounts {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }
    impl ControllerType for Accounts {
        const NAME: &'static str = "Accounts";
        fn describe(descriptor: ControllerDescriptorBuilder<Self>) -> ControllerDescriptorBuilder<Self> {
            descriptor
        }
    }

    fn context() -> ControllerContext {
        ControllerContext::new(
            RequestContext::new(HttpRequest::new(Method::POST, "/"), RouteData::for_action("Accounts", "Register")),
            "Accounts",
            ControllerInstance::new(Accounts),
        )
    }

    fn registration() -> Arc<ModelMetadata> {
        ModelMetadata::complex("Registration")
            .property(
                ModelMetadata::string("UserName")
                    .display_name("User name")
                    .annotate(DataAnnotation::required())
                    .annotate(DataAnnotation::string_length(12).with_minimum_length(3)),
            )
            .property(ModelMetadata::string("Password").annotate(DataAnnotation::required()))
            .property(
                ModelMetadata::string("ConfirmPassword")
                    .annotate(DataAnnotation::compare("Password")),
            )
            .property(ModelMetadata::integer("Age").annotate(DataAnnotation::range(18.0, 120.0)))
            .build()
    }

    #[test]
    fn test_valid_model_has_no_results() {
        let providers = ModelValidatorProviderCollection::default();
        let model = json!({"UserName": "alice", "Password": "pw", "ConfirmPassword": "pw", "Age": 30});
        assert!(providers.validate(&context(), &registration(), &model, "").is_empty());
    }

    #[test]
    fn test_classic_messages_and_full_keys() {
        let providers = ModelValidatorProviderCollection::default();
        let model = json!({"UserName": "al", "ConfirmPassword": "x", "Age": 7});
        let results = providers.validate(&context(), &registration(), &model, "form");
        let messages: Vec<(&str, &str)> = results
            .iter()
            .map(|r| (r.member_name.as_str(), r.message.as_str()))
            .collect();
        assert_eq!(
            messages,
            vec![
                (
                    "form.UserName",
                    "The field User name must be a string with a minimum length of 3 and a maximum length of 12."
                ),
                ("form.Password", "The Password field is required."),
                ("form.ConfirmPassword", "'ConfirmPassword' and 'Password' do not match."),
                ("form.Age", "The field Age must be between 18 and 120."),
            ]
        );
    }

    #[test]
    fn test_absent_value_property_is_implicitly_required() {
        let metadata = ModelMetadata::complex("Order")
            .property(ModelMetadata::integer("Quantity"))
            .build();
        let providers = ModelValidatorProviderCollection::default();
        // An absent non-nullable integer validates as 0, which is present.
        assert!(providers.validate(&context(), &metadata, &json!({}), "").is_empty());
        let results = providers.validate(&context(), &metadata, &json!({"Quantity": null}), "");
        assert_eq!(results[0].message, "The Quantity field is required.");
    }

    #[test]
    fn test_type_validators_skipped_when_properties_fail() {
        struct Always;
        impl crate::metadata::DataErrorInfo for Always {
            fn error(&self, _model: &Value) -> Option<String> {
                Some("model is wrong".to_string())
            }
        }
        let metadata = ModelMetadata::complex("Thing")
            .property(ModelMetadata::string("Name").annotate(DataAnnotation::required()))
            .error_info(Arc::new(Always))
            .build();
        let providers = ModelValidatorProviderCollection::default();

        let failing = providers.validate(&context(), &metadata, &json!({}), "");
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].message, "The Name field is required.");

        let passing = providers.validate(&context(), &metadata, &json!({"Name": "x"}), "");
        assert_eq!(passing.len(), 1);
        assert_eq!(passing[0].message, "model is wrong");
    }

    #[test]
    fn test_string_length_client_rule_omits_defaults() {
        let metadata = ModelMetadata::string("Code")
            .annotate(DataAnnotation::string_length(10))
            .build();
        let rules = ModelValidatorProviderCollection::default().client_validation_rules(&context(), &metadata, None);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].validation_type, "length");
        assert_eq!(rules[0].validation_parameters.get("max"), Some(&json!(10)));
        assert!(!rules[0].validation_parameters.contains_key("min"));
    }

    #[test]
    fn test_numeric_kinds_get_number_rule() {
        let metadata = ModelMetadata::float("Price").nullable(true).build();
        let rules = ModelValidatorProviderCollection::default().client_validation_rules(&context(), &metadata, None);
        let types: Vec<&str> = rules.iter().map(|r| r.validation_type.as_str()).collect();
        assert_eq!(types, vec!["number"]);
    }

    #[test]
    fn test_client_rules_follow_the_client_validation_switch() {
        let metadata = ModelMetadata::string("Code")
            .annotate(DataAnnotation::required())
            .build();
        let options = MvcOptions::builder().client_validation(false).build().unwrap();

        let disabled = ModelValidatorProviderCollection::with_options(&options);
        assert!(!disabled.client_validation_enabled());
        assert!(disabled.client_validation_rules(&context(), &metadata, None).is_empty());
        assert!(!disabled.validate(&context(), &metadata, &Value::Null, "Code").is_empty());

        let enabled = ModelValidatorProviderCollection::default();
        assert!(!enabled.client_validation_rules(&context(), &metadata, None).is_empty());
    }

    #[test]
    fn test_format_message() {
        assert_eq!(format_message("{0} and {1}", &["a", "b"]), "a and b");
        assert_eq!(format_message("{0} needs {2}", &["a"]), "a needs {2}");
        assert_eq!(format_message("{x} {", &[]), "{x} {");
    }

    #[test]
    fn test_format_message_does_not_expand_arguments() {
        assert_eq!(
            format_message("The field {0} must be at most {1}.", &["Code {1}", "12"]),
            "The field Code {1} must be at most 12."
        );
    }
}
