use super::{
    ModelClientValidationRule, ModelValidationContext, ModelValidationResult, ModelValidator,
    ModelValidatorProvider, format_message, property_value,
};
use crate::metadata::ModelMetadata;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Declarative validation rules attached to model metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum DataAnnotation {
    /// A value must be present
    Required {
        /// Message template overriding the default
        error_message: Option<String>,
        /// Whether empty or whitespace strings count as present
        allow_empty_strings: bool,
    },
    /// A numeric value must lie in `[minimum, maximum]`
    Range {
        /// Lower bound
        minimum: f64,
        /// Upper bound
        maximum: f64,
        /// Message template overriding the default
        error_message: Option<String>,
    },
    /// A value must match `pattern` in full
    RegularExpression {
        /// The pattern
        pattern: String,
        /// Message template overriding the default
        error_message: Option<String>,
    },
    /// A string's length must lie in `[minimum_length, maximum_length]`
    StringLength {
        /// Shortest allowed length
        minimum_length: i32,
        /// Longest allowed length
        maximum_length: i32,
        /// Message template overriding the default
        error_message: Option<String>,
    },
    /// A value must equal a sibling property
    Compare {
        /// Sibling property name
        other_property: String,
        /// Message template overriding the default
        error_message: Option<String>,
    },
}

/// Identifies an annotation type in the adapter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    /// [`DataAnnotation::Required`]
    Required,
    /// [`DataAnnotation::Range`]
    Range,
    /// [`DataAnnotation::RegularExpression`]
    RegularExpression,
    /// [`DataAnnotation::StringLength`]
    StringLength,
    /// [`DataAnnotation::Compare`]
    Compare,
}

impl DataAnnotation {
    /// `Required` with the default message.
    #[must_use]
    pub const fn required() -> Self {
        Self::Required {
            error_message: None,
            allow_empty_strings: false,
        }
    }

    /// `Range` over `[minimum, maximum]`.
    #[must_use]
    pub const fn range(minimum: f64, maximum: f64) -> Self {
        Self::Range {
            minimum,
            maximum,
            error_message: None,
        }
    }

    /// `RegularExpression` with `pattern`.
    #[must_use]
    pub fn regular_expression(pattern: impl Into<String>) -> Self {
        Self::RegularExpression {
            pattern: pattern.into(),
            error_message: None,
        }
    }

    /// `StringLength` with a maximum and no minimum.
    #[must_use]
    pub const fn string_length(maximum_length: i32) -> Self {
        Self::StringLength {
            minimum_length: 0,
            maximum_length,
            error_message: None,
        }
    }

    /// `Compare` against `other_property`.
    #[must_use]
    pub fn compare(other_property: impl Into<String>) -> Self {
        Self::Compare {
            other_property: other_property.into(),
            error_message: None,
        }
    }

    /// Set the minimum length of a `StringLength`; other annotations are unchanged.
    #[must_use]
    pub fn with_minimum_length(mut self, minimum: i32) -> Self {
        if let Self::StringLength { minimum_length, .. } = &mut self {
            *minimum_length = minimum;
        }
        self
    }

    /// Let a `Required` accept empty strings; other annotations are unchanged.
    #[must_use]
    pub fn allowing_empty_strings(mut self) -> Self {
        if let Self::Required {
            allow_empty_strings, ..
        } = &mut self
        {
            *allow_empty_strings = true;
        }
        self
    }

    /// Override the message template. `{0}` is the display name.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = Some(message.into());
        match &mut self {
            Self::Required { error_message, .. }
            | Self::Range { error_message, .. }
            | Self::RegularExpression { error_message, .. }
            | Self::StringLength { error_message, .. }
            | Self::Compare { error_message, .. } => *error_message = message,
        }
        self
    }

    /// The annotation's type.
    #[must_use]
    pub const fn kind(&self) -> AnnotationKind {
        match self {
            Self::Required { .. } => AnnotationKind::Required,
            Self::Range { .. } => AnnotationKind::Range,
            Self::RegularExpression { .. } => AnnotationKind::RegularExpression,
            Self::StringLength { .. } => AnnotationKind::StringLength,
            Self::Compare { .. } => AnnotationKind::Compare,
        }
    }

    fn error_message(&self) -> Option<&String> {
        match self {
            Self::Required { error_message, .. }
            | Self::Range { error_message, .. }
            | Self::RegularExpression { error_message, .. }
            | Self::StringLength { error_message, .. }
            | Self::Compare { error_message, .. } => error_message.as_ref(),
        }
    }

    fn default_template(&self) -> &'static str {
        match self {
            Self::Required { .. } => "The {0} field is required.",
            Self::Range { .. } => "The field {0} must be between {1} and {2}.",
            Self::RegularExpression { .. } => "The field {0} must match the regular expression '{1}'.",
            Self::StringLength { minimum_length, .. } if *minimum_length != 0 => {
                "The field {0} must be a string with a minimum length of {2} and a maximum length of {1}."
            }
            Self::StringLength { .. } => "The field {0} must be a string with a maximum length of {1}.",
            Self::Compare { .. } => "'{0}' and '{1}' do not match.",
        }
    }

    /// The failure message for a model with `display_name`.
    #[must_use]
    pub fn format_error_message(&self, display_name: &str) -> String {
        let template = self
            .error_message()
            .map_or_else(|| self.default_template(), String::as_str);
        match self {
            Self::Required { .. } => format_message(template, &[display_name]),
            Self::Range {
                minimum, maximum, ..
            } => format_message(
                template,
                &[
                    display_name,
                    &number_value(*minimum).to_string(),
                    &number_value(*maximum).to_string(),
                ],
            ),
            Self::RegularExpression { pattern, .. } => format_message(template, &[display_name, pattern]),
            Self::StringLength {
                minimum_length,
                maximum_length,
                ..
            } => format_message(
                template,
                &[
                    display_name,
                    &maximum_length.to_string(),
                    &minimum_length.to_string(),
                ],
            ),
            Self::Compare { other_property, .. } => {
                format_message(template, &[display_name, other_property])
            }
        }
    }
}

/// A whole-number bound as an integer, otherwise as a float.
#[allow(clippy::cast_possible_truncation)]
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Server and client behaviour of one data annotation.
#[derive(Debug, Clone)]
pub struct DataAnnotationsModelValidator {
    annotation: DataAnnotation,
    regex: Option<Regex>,
}

impl DataAnnotationsModelValidator {
    /// A validator for `annotation`.
    #[must_use]
    pub fn new(annotation: DataAnnotation) -> Self {
        let regex = match &annotation {
            DataAnnotation::RegularExpression { pattern, .. } => match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(regex) => Some(regex),
                Err(error) => {
                    tracing::warn!(%pattern, %error, "invalid validation pattern; values will fail");
                    None
                }
            },
            _ => None,
        };
        Self { annotation, regex }
    }

    /// The annotation.
    #[must_use]
    pub const fn annotation(&self) -> &DataAnnotation {
        &self.annotation
    }

    fn is_valid(&self, container: Option<&Value>, model: &Value) -> bool {
        match &self.annotation {
            DataAnnotation::Required {
                allow_empty_strings,
                ..
            } => match model {
                Value::Null => false,
                Value::String(s) => *allow_empty_strings || !s.trim().is_empty(),
                _ => true,
            },
            DataAnnotation::Range {
                minimum, maximum, ..
            } => {
                let number = match model {
                    Value::Null => return true,
                    Value::String(s) if s.is_empty() => return true,
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    Value::Number(n) => n.as_f64(),
                    _ => None,
                };
                number.is_some_and(|n| (*minimum..=*maximum).contains(&n))
            }
            DataAnnotation::RegularExpression { .. } => match as_text(model) {
                None => true,
                Some(text) if text.is_empty() => true,
                Some(text) => self.regex.as_ref().is_some_and(|r| r.is_match(&text)),
            },
            DataAnnotation::StringLength {
                minimum_length,
                maximum_length,
                ..
            } => match model {
                Value::String(s) => {
                    let length = i64::try_from(s.chars().count()).unwrap_or(i64::MAX);
                    length >= i64::from(*minimum_length) && length <= i64::from(*maximum_length)
                }
                _ => true,
            },
            DataAnnotation::Compare { other_property, .. } => {
                let other = container
                    .and_then(|c| property_value(c, other_property))
                    .unwrap_or(&Value::Null);
                model == other
            }
        }
    }
}

impl ModelValidator for DataAnnotationsModelValidator {
    fn validate(
        &self,
        metadata: &ModelMetadata,
        container: Option<&Value>,
        model: &Value,
    ) -> Vec<ModelValidationResult> {
        if self.is_valid(container, model) {
            return Vec::new();
        }
        vec![ModelValidationResult::new(
            self.annotation.format_error_message(metadata.display_name()),
        )]
    }

    fn client_validation_rules(&self, metadata: &ModelMetadata) -> Vec<ModelClientValidationRule> {
        let message = self.annotation.format_error_message(metadata.display_name());
        let rule = match &self.annotation {
            DataAnnotation::Required { .. } => ModelClientValidationRule::required(message),
            DataAnnotation::Range {
                minimum, maximum, ..
            } => ModelClientValidationRule::range(message, number_value(*minimum), number_value(*maximum)),
            DataAnnotation::RegularExpression { pattern, .. } => {
                ModelClientValidationRule::regex(message, pattern.clone())
            }
            DataAnnotation::StringLength {
                minimum_length,
                maximum_length,
                ..
            } => ModelClientValidationRule::string_length(message, *minimum_length, *maximum_length),
            DataAnnotation::Compare { other_property, .. } => {
                ModelClientValidationRule::equal_to(message, other_property)
            }
        };
        vec![rule]
    }

    fn is_required(&self) -> bool {
        matches!(self.annotation, DataAnnotation::Required { .. })
    }
}

/// Builds the validator for one annotation.
pub type AdapterFactory =
    Arc<dyn Fn(&ModelMetadata, &DataAnnotation) -> Box<dyn ModelValidator> + Send + Sync>;

/// Validators from the metadata's data annotations, through an adapter table.
///
/// Non-nullable value kinds without an explicit `Required` get an implicit
/// one unless that is turned off.
#[derive(Clone)]
pub struct DataAnnotationsModelValidatorProvider {
    adapters: HashMap<AnnotationKind, AdapterFactory>,
    add_implicit_required: bool,
}

impl std::fmt::Debug for DataAnnotationsModelValidatorProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAnnotationsModelValidatorProvider")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("add_implicit_required", &self.add_implicit_required)
            .finish()
    }
}

impl Default for DataAnnotationsModelValidatorProvider {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DataAnnotationsModelValidatorProvider {
    /// The built-in adapters.
    #[must_use]
    pub fn new(add_implicit_required: bool) -> Self {
        let default_adapter: AdapterFactory = Arc::new(
            |_metadata: &ModelMetadata, annotation: &DataAnnotation| -> Box<dyn ModelValidator> {
                Box::new(DataAnnotationsModelValidator::new(annotation.clone()))
            },
        );
        let adapters = [
            AnnotationKind::Required,
            AnnotationKind::Range,
            AnnotationKind::RegularExpression,
            AnnotationKind::StringLength,
            AnnotationKind::Compare,
        ]
        .into_iter()
        .map(|kind| (kind, Arc::clone(&default_adapter)))
        .collect();
        Self {
            adapters,
            add_implicit_required,
        }
    }

    /// Replace the adapter for `kind`.
    pub fn register_adapter(&mut self, kind: AnnotationKind, factory: AdapterFactory) {
        self.adapters.insert(kind, factory);
    }
}

impl ModelValidatorProvider for DataAnnotationsModelValidatorProvider {
    fn get_validators(
        &self,
        metadata: &ModelMetadata,
        _context: &ModelValidationContext<'_>,
    ) -> Vec<Box<dyn ModelValidator>> {
        let mut validators: Vec<Box<dyn ModelValidator>> = Vec::new();
        let explicitly_required = metadata
            .annotations()
            .iter()
            .any(|a| a.kind() == AnnotationKind::Required);

        if self.add_implicit_required
            && metadata.kind().is_value_type()
            && !metadata.is_nullable()
            && !explicitly_required
        {
            if let Some(adapter) = self.adapters.get(&AnnotationKind::Required) {
                validators.push(adapter(metadata, &DataAnnotation::required()));
            }
        }

        for annotation in metadata.annotations() {
            if let Some(adapter) = self.adapters.get(&annotation.kind()) {
                validators.push(adapter(metadata, annotation));
            }
        }
        validators
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn messages(annotation: DataAnnotation, container: Option<&Value>, model: &Value) -> Vec<String> {
        let metadata = ModelMetadata::string("Field").build();
        DataAnnotationsModelValidator::new(annotation)
            .validate(&metadata, container, model)
            .into_iter()
            .map(|r| r.message)
            .collect()
    }

    #[test]
    fn test_required_rejects_blank_strings_unless_allowed() {
        assert_eq!(messages(DataAnnotation::required(), None, &json!("  ")), vec!["The Field field is required."]);
        assert!(messages(DataAnnotation::required().allowing_empty_strings(), None, &json!("")).is_empty());
        assert!(messages(DataAnnotation::required(), None, &json!(0)).is_empty());
    }

    #[test]
    fn test_range_accepts_numeric_strings() {
        let range = DataAnnotation::range(1.0, 10.0);
        assert!(messages(range.clone(), None, &json!("5")).is_empty());
        assert!(messages(range.clone(), None, &Value::Null).is_empty());
        assert_eq!(
            messages(range, None, &json!(11)),
            vec!["The field Field must be between 1 and 10."]
        );
    }

    #[test]
    fn test_regex_matches_whole_value() {
        let zip = DataAnnotation::regular_expression(r"\d{5}").with_message("{0} must be a zip code");
        assert!(messages(zip.clone(), None, &json!("12345")).is_empty());
        assert_eq!(messages(zip, None, &json!("123456")), vec!["Field must be a zip code"]);
    }

    #[test]
    fn test_compare_reads_sibling_case_insensitively() {
        let container = json!({"password": "secret"});
        let compare = DataAnnotation::compare("Password");
        assert!(messages(compare.clone(), Some(&container), &json!("secret")).is_empty());
        assert_eq!(
            messages(compare, Some(&container), &json!("other")),
            vec!["'Field' and 'Password' do not match."]
        );
    }

    #[test]
    fn test_client_rules() {
        let metadata = ModelMetadata::integer("Age").build();
        let range = DataAnnotationsModelValidator::new(DataAnnotation::range(18.0, 99.5));
        let rules = range.client_validation_rules(&metadata);
        assert_eq!(rules[0].validation_type, "range");
        assert_eq!(rules[0].validation_parameters.get("min"), Some(&json!(18)));
        assert_eq!(rules[0].validation_parameters.get("max"), Some(&json!(99.5)));

        let compare = DataAnnotationsModelValidator::new(DataAnnotation::compare("Email"));
        let rules = compare.client_validation_rules(&metadata);
        assert_eq!(rules[0].validation_type, "equalto");
        assert_eq!(rules[0].validation_parameters.get("other"), Some(&json!("*.Email")));

        let length = DataAnnotationsModelValidator::new(DataAnnotation::string_length(i32::MAX).with_minimum_length(2));
        let rules = length.client_validation_rules(&metadata);
        assert_eq!(rules[0].validation_parameters.get("min"), Some(&json!(2)));
        assert!(!rules[0].validation_parameters.contains_key("max"));
    }

    #[test]
    fn test_registered_adapter_replaces_default() {
        struct Never;
        impl ModelValidator for Never {
            fn validate(&self, _m: &ModelMetadata, _c: Option<&Value>, _v: &Value) -> Vec<ModelValidationResult> {
                vec![ModelValidationResult::new("never")]
            }
        }

        let mut provider = DataAnnotationsModelValidatorProvider::new(false);
        provider.register_adapter(
            AnnotationKind::Range,
            Arc::new(|_: &ModelMetadata, _: &DataAnnotation| -> Box<dyn ModelValidator> { Box::new(Never) }),
        );
        let metadata = ModelMetadata::integer("Age")
            .annotate(DataAnnotation::range(0.0, 1.0))
            .build();
        let validators: Vec<Box<dyn ModelValidator>> = metadata
            .annotations()
            .iter()
            .filter_map(|a| provider.adapters.get(&a.kind()).map(|f| f(&metadata, a)))
            .collect();
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].validate(&metadata, None, &json!(0))[0].message, "never");
    }
}
