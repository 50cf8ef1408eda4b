//! Rendering of client validation rules as `data-val-*` attributes.

use super::ModelClientValidationRule;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// A rule set that cannot be expressed as unobtrusive attributes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnobtrusiveValidationError {
    /// Rule name was empty
    #[error("Validation type names in unobtrusive client validation rules cannot be empty. Client rule type: {0}")]
    EmptyType(String),

    /// Rule name contained something other than lowercase letters
    #[error("Validation type names in unobtrusive client validation rules must consist of only lowercase letters. Invalid name: \"{0}\"")]
    InvalidType(String),

    /// Two rules share a name
    #[error("Validation type names in unobtrusive client validation rules must be unique. The following validation type was seen more than once: {0}")]
    DuplicateType(String),

    /// Parameter name was empty or contained something other than lowercase letters and digits
    #[error("Validation parameter names in unobtrusive client validation rules must start with a lowercase letter and consist of only lowercase letters or digits. Validation parameter name: {parameter}, client rule type: {rule}")]
    InvalidParameter {
        /// Rule carrying the parameter
        rule: String,
        /// Offending parameter name
        parameter: String,
    },
}

/// Render `rules` as the attributes read by unobtrusive client validation.
///
/// Returns an empty map when there are no rules; otherwise `data-val="true"`
/// followed by one `data-val-{type}` entry per rule and one
/// `data-val-{type}-{param}` entry per parameter.
///
/// # Errors
///
/// Fails when a rule or parameter name is malformed, or a rule name repeats.
pub fn unobtrusive_attributes(
    rules: &[ModelClientValidationRule],
) -> Result<IndexMap<String, String>, UnobtrusiveValidationError> {
    let mut attributes = IndexMap::new();
    if rules.is_empty() {
        return Ok(attributes);
    }
    attributes.insert("data-val".to_string(), "true".to_string());

    for rule in rules {
        let kind = rule.validation_type.as_str();
        if kind.is_empty() {
            return Err(UnobtrusiveValidationError::EmptyType(kind.to_string()));
        }
        if !kind.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(UnobtrusiveValidationError::InvalidType(kind.to_string()));
        }
        let key = format!("data-val-{kind}");
        if attributes.contains_key(&key) {
            return Err(UnobtrusiveValidationError::DuplicateType(kind.to_string()));
        }
        attributes.insert(key.clone(), rule.error_message.clone());

        for (name, value) in &rule.validation_parameters {
            if !is_valid_parameter_name(name) {
                return Err(UnobtrusiveValidationError::InvalidParameter {
                    rule: kind.to_string(),
                    parameter: name.clone(),
                });
            }
            attributes.insert(format!("{key}-{name}"), attribute_value(value));
        }
    }
    Ok(attributes)
}

fn is_valid_parameter_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

fn attribute_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
