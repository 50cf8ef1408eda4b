//! Model state: attempted values and validation errors collected while binding.

use crate::value_providers::{ValueProviderResult, is_prefix_match};
use indexmap::IndexMap;

/// One validation or conversion failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    /// User-facing message
    pub error_message: String,
    /// Rendered cause, when the error came from a failure rather than a rule
    pub exception: Option<String>,
}

impl ModelError {
    /// Error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            exception: None,
        }
    }

    /// Error caused by a failure.
    #[must_use]
    pub fn from_exception(error: &dyn std::error::Error) -> Self {
        Self {
            error_message: String::new(),
            exception: Some(error.to_string()),
        }
    }
}

/// Ordered, append-only list of errors for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelErrorCollection {
    errors: Vec<ModelError>,
}

impl ModelErrorCollection {
    /// Append an error.
    pub fn push(&mut self, error: ModelError) {
        self.errors.push(error);
    }

    /// Iterate errors in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, ModelError> {
        self.errors.iter()
    }

    /// Number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error messages in insertion order.
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.error_message.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ModelErrorCollection {
    type Item = &'a ModelError;
    type IntoIter = std::slice::Iter<'a, ModelError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Attempted value and errors for one key.
#[derive(Debug, Clone, Default)]
pub struct ModelState {
    /// Value the binder read for the key
    pub value: Option<ValueProviderResult>,
    /// Errors recorded for the key
    pub errors: ModelErrorCollection,
}

/// Per-key model state, keyed case-insensitively and kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ModelStateDictionary {
    entries: IndexMap<String, ModelState>,
}

impl ModelStateDictionary {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, key: &str) -> &mut ModelState {
        let index = self
            .entries
            .keys()
            .position(|k| k.eq_ignore_ascii_case(key));
        let index = match index {
            Some(index) => index,
            None => {
                self.entries.insert(key.to_string(), ModelState::default());
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    /// Record an error message for `key`.
    pub fn add_model_error(&mut self, key: &str, message: impl Into<String>) {
        self.entry_mut(key).errors.push(ModelError::new(message));
    }

    /// Record a failure for `key`.
    pub fn add_model_exception(&mut self, key: &str, error: &dyn std::error::Error) {
        self.entry_mut(key).errors.push(ModelError::from_exception(error));
    }

    /// Record the attempted value for `key`.
    pub fn set_model_value(&mut self, key: &str, value: ValueProviderResult) {
        self.entry_mut(key).value = Some(value);
    }

    /// State for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ModelState> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Whether every key is free of errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.entries.values().all(|s| s.errors.is_empty())
    }

    /// Whether `key` and every key nested under it are free of errors.
    #[must_use]
    pub fn is_valid_field(&self, key: &str) -> bool {
        self.entries
            .iter()
            .filter(|(k, _)| is_prefix_match(key, k))
            .all(|(_, s)| s.errors.is_empty())
    }

    /// Iterate keys and states in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, ModelState> {
        self.entries.iter()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every `(key, message)` pair, in insertion order.
    #[must_use]
    pub fn error_messages(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .flat_map(|(k, s)| {
                s.errors
                    .iter()
                    .map(move |e| (k.clone(), e.error_message.clone()))
            })
            .collect()
    }
}
