use super::{PrefixContainer, ValueCulture, ValueProvider, ValueProviderResult};
use crate::error::MvcResult;
use crate::http::PostedFile;
use indexmap::IndexMap;
use serde_json::Value;

/// Provider over uploaded files, keyed by form field name.
///
/// The raw value is the serialized [`PostedFile`] (an array when several files
/// share a field) so it binds into a `PostedFile` or `Vec<PostedFile>` parameter.
#[derive(Debug, Clone, Default)]
pub struct HttpFileCollectionValueProvider {
    files: IndexMap<String, Vec<PostedFile>>,
    prefixes: PrefixContainer,
}

impl HttpFileCollectionValueProvider {
    /// Create a provider over `(field, file)` pairs.
    #[must_use]
    pub fn new(files: &[(String, PostedFile)]) -> Self {
        let mut grouped: IndexMap<String, Vec<PostedFile>> = IndexMap::new();
        for (key, file) in files {
            grouped
                .entry(key.to_ascii_lowercase())
                .or_default()
                .push(file.clone());
        }
        let prefixes = PrefixContainer::new(grouped.keys().map(String::as_str));
        Self {
            files: grouped,
            prefixes,
        }
    }
}

impl ValueProvider for HttpFileCollectionValueProvider {
    fn contains_prefix(&self, prefix: &str) -> bool {
        self.prefixes.contains_prefix(prefix)
    }

    fn get_value(&self, key: &str) -> MvcResult<Option<ValueProviderResult>> {
        let Some(files) = self.files.get(&key.to_ascii_lowercase()) else {
            return Ok(None);
        };
        let raw_value = match files.as_slice() {
            [single] => serde_json::to_value(single),
            many => serde_json::to_value(many),
        }
        .unwrap_or(Value::Null);
        let attempted = files
            .iter()
            .map(|f| f.file_name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Ok(Some(ValueProviderResult::new(
            raw_value,
            attempted,
            ValueCulture::Invariant,
        )))
    }
}
