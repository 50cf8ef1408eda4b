//! Value providers: named sources of request data consulted during binding.
//!
//! Each source (child-action values, form, JSON body, route data, query
//! string, uploaded files) is exposed through the [`ValueProvider`] trait. A
//! [`ValueProviderFactoryCollection`] instantiates one provider per factory for
//! a request and wraps them in a [`ValueProviderCollection`], which answers
//! with the first provider that knows a key.
//!
//! Keys follow the binder's naming scheme: `customer.Address.City` for nested
//! properties and `items[0]` for indexed elements. Key comparison is
//! case-insensitive.

mod collection;
mod dictionary;
mod factories;
mod files;
mod name_value;
mod result;

pub use collection::ValueProviderCollection;
pub use dictionary::DictionaryValueProvider;
pub use factories::{
    ChildActionValueProviderFactory, FormValueProviderFactory, HttpFileCollectionValueProviderFactory,
    JsonValueProviderFactory, QueryStringValueProviderFactory, RouteDataValueProviderFactory,
    ValueProviderFactory, ValueProviderFactoryCollection, flatten_json,
};
pub use files::HttpFileCollectionValueProvider;
pub use name_value::NameValueCollectionValueProvider;
pub use result::{ConversionError, ValueCulture, ValueProviderResult};

use crate::error::MvcResult;

/// A named source of request values.
pub trait ValueProvider: Send + Sync {
    /// Whether any key equals `prefix` or is nested under it.
    fn contains_prefix(&self, prefix: &str) -> bool;

    /// Value for `key`, or `None` when this provider does not know it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::MvcError::RequestValidation`] when the value
    /// looks like markup and the provider validates its input.
    fn get_value(&self, key: &str) -> MvcResult<Option<ValueProviderResult>>;

    /// The provider's validation-bypass capability, if it has one.
    fn as_unvalidated(&self) -> Option<&dyn UnvalidatedValueProvider> {
        None
    }
}

/// Capability of providers that validate their input and can be told not to.
pub trait UnvalidatedValueProvider: ValueProvider {
    /// Like [`ValueProvider::get_value`], skipping request validation when
    /// `skip_validation` is set.
    ///
    /// # Errors
    ///
    /// See [`ValueProvider::get_value`].
    fn get_value_unvalidated(
        &self,
        key: &str,
        skip_validation: bool,
    ) -> MvcResult<Option<ValueProviderResult>>;
}

/// Whether `key` equals `prefix` or is nested under it (`prefix.x`, `prefix[0]`).
///
/// The empty prefix matches every key. Comparison is ASCII case-insensitive.
#[must_use]
pub fn is_prefix_match(prefix: &str, key: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match key.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => {
            matches!(key.as_bytes().get(prefix.len()), None | Some(b'.' | b'['))
        }
        _ => false,
    }
}

/// Join a prefix and a property name the way the binder names nested values.
#[must_use]
pub fn create_sub_property_name(prefix: &str, property: &str) -> String {
    if prefix.is_empty() {
        property.to_string()
    } else if property.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}.{property}")
    }
}

/// Name of element `index` under `prefix`.
#[must_use]
pub fn create_sub_index_name(prefix: &str, index: usize) -> String {
    format!("{prefix}[{index}]")
}

/// Sorted, lower-cased key set answering prefix queries.
#[derive(Debug, Clone, Default)]
pub(crate) struct PrefixContainer {
    keys: Vec<String>,
}

impl PrefixContainer {
    pub(crate) fn new<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut keys: Vec<String> = keys.into_iter().map(str::to_ascii_lowercase).collect();
        keys.sort();
        keys.dedup();
        Self { keys }
    }

    pub(crate) fn contains_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return !self.keys.is_empty();
        }
        let prefix = prefix.to_ascii_lowercase();
        let start = self.keys.partition_point(|k| k.as_str() < prefix.as_str());
        self.keys[start..]
            .iter()
            .take_while(|k| k.starts_with(prefix.as_str()))
            .any(|k| is_prefix_match(&prefix, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_prefix_match_boundaries() {
        assert!(is_prefix_match("foo", "foo"));
        assert!(is_prefix_match("foo", "FOO.bar"));
        assert!(is_prefix_match("foo", "foo[0]"));
        assert!(!is_prefix_match("foo", "foobar"));
        assert!(!is_prefix_match("foo.bar", "foo"));
        assert!(is_prefix_match("", "anything"));
    }

    #[test]
    fn test_container_skips_longer_siblings() {
        let container = PrefixContainer::new(["foobar", "foo.baz", "alpha[2]"]);
        assert!(container.contains_prefix("foo"));
        assert!(container.contains_prefix("Alpha"));
        assert!(!container.contains_prefix("fo"));
        assert!(!container.contains_prefix("alpha[1]"));
        assert!(container.contains_prefix(""));
        assert!(!PrefixContainer::new([]).contains_prefix(""));
    }

    #[test]
    fn test_sub_names() {
        assert_eq!(create_sub_property_name("", "Name"), "Name");
        assert_eq!(create_sub_property_name("person", "Name"), "person.Name");
        assert_eq!(create_sub_index_name("items", 3), "items[3]");
    }

    proptest! {
        #[test]
        fn prop_container_agrees_with_linear_scan(
            keys in proptest::collection::vec("[a-c]{1,3}(\\.[a-c]{1,2}|\\[[0-2]\\])?", 0..12),
            prefix in "[a-c]{1,3}",
        ) {
            let container = PrefixContainer::new(keys.iter().map(String::as_str));
            let expected = keys.iter().any(|k| is_prefix_match(&prefix, k));
            prop_assert_eq!(container.contains_prefix(&prefix), expected);
        }
    }
}
