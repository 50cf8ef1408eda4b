use super::{PrefixContainer, ValueCulture, ValueProvider, ValueProviderResult};
use crate::error::MvcResult;
use indexmap::IndexMap;
use serde_json::Value;

/// Provider over an in-memory dictionary: route values, child-action values
/// or a flattened JSON body. Values are never checked for markup.
#[derive(Debug, Clone, Default)]
pub struct DictionaryValueProvider {
    values: IndexMap<String, Value>,
    prefixes: PrefixContainer,
    culture: ValueCulture,
}

impl DictionaryValueProvider {
    /// Create a provider over `(key, value)` pairs; later duplicates win.
    #[must_use]
    pub fn new<I, K>(values: I, culture: ValueCulture) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let values: IndexMap<String, Value> = values
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v))
            .collect();
        let prefixes = PrefixContainer::new(values.keys().map(String::as_str));
        Self {
            values,
            prefixes,
            culture,
        }
    }
}

fn attempted_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ValueProvider for DictionaryValueProvider {
    fn contains_prefix(&self, prefix: &str) -> bool {
        self.prefixes.contains_prefix(prefix)
    }

    fn get_value(&self, key: &str) -> MvcResult<Option<ValueProviderResult>> {
        Ok(self
            .values
            .get(&key.to_ascii_lowercase())
            .map(|value| ValueProviderResult::new(value.clone(), attempted_text(value), self.culture)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let provider = DictionaryValueProvider::new(
            [("Id", json!(7)), ("slug", json!("<b>"))],
            ValueCulture::Invariant,
        );
        let id = provider.get_value("id").unwrap().unwrap();
        assert_eq!(id.raw_value(), &json!(7));
        assert_eq!(id.attempted_value(), "7");
        // Dictionary sources are trusted.
        assert!(provider.get_value("SLUG").unwrap().is_some());
        assert!(provider.as_unvalidated().is_none());
    }
}
