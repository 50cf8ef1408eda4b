use super::{PrefixContainer, UnvalidatedValueProvider, ValueCulture, ValueProvider, ValueProviderResult};
use crate::error::{MvcError, MvcResult};
use crate::request_validation::is_dangerous_string;
use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    values: Vec<String>,
}

/// Provider over decoded name/value pairs such as a form or query string.
///
/// Repeated keys produce an array raw value and a comma-joined attempted
/// value. Values are checked for markup unless the caller skips validation.
#[derive(Debug, Clone)]
pub struct NameValueCollectionValueProvider {
    entries: IndexMap<String, Entry>,
    prefixes: PrefixContainer,
    culture: ValueCulture,
}

impl NameValueCollectionValueProvider {
    /// Create a provider over `pairs`.
    #[must_use]
    pub fn new(pairs: &[(String, String)], culture: ValueCulture) -> Self {
        let mut entries: IndexMap<String, Entry> = IndexMap::new();
        for (key, value) in pairs {
            entries
                .entry(key.to_ascii_lowercase())
                .or_insert_with(|| Entry {
                    key: key.clone(),
                    values: Vec::new(),
                })
                .values
                .push(value.clone());
        }
        let prefixes = PrefixContainer::new(entries.keys().map(String::as_str));
        Self {
            entries,
            prefixes,
            culture,
        }
    }
}

impl ValueProvider for NameValueCollectionValueProvider {
    fn contains_prefix(&self, prefix: &str) -> bool {
        self.prefixes.contains_prefix(prefix)
    }

    fn get_value(&self, key: &str) -> MvcResult<Option<ValueProviderResult>> {
        self.get_value_unvalidated(key, false)
    }

    fn as_unvalidated(&self) -> Option<&dyn UnvalidatedValueProvider> {
        Some(self)
    }
}

impl UnvalidatedValueProvider for NameValueCollectionValueProvider {
    fn get_value_unvalidated(
        &self,
        key: &str,
        skip_validation: bool,
    ) -> MvcResult<Option<ValueProviderResult>> {
        let Some(entry) = self.entries.get(&key.to_ascii_lowercase()) else {
            return Ok(None);
        };

        if !skip_validation && entry.values.iter().any(|v| is_dangerous_string(v)) {
            tracing::warn!(key = %entry.key, "Rejected request value that looks like markup");
            return Err(MvcError::RequestValidation {
                key: entry.key.clone(),
            });
        }

        let raw_value = match entry.values.as_slice() {
            [single] => Value::String(single.clone()),
            many => Value::Array(many.iter().cloned().map(Value::String).collect()),
        };
        Ok(Some(ValueProviderResult::new(
            raw_value,
            entry.values.join(","),
            self.culture,
        )))
    }
}
