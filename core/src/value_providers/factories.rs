use super::{
    DictionaryValueProvider, HttpFileCollectionValueProvider, NameValueCollectionValueProvider,
    ValueCulture, ValueProvider, ValueProviderCollection, create_sub_index_name,
    create_sub_property_name,
};
use crate::controller::ControllerContext;
use crate::dependency::{DependencyResolver, DependencyResolverExt};
use serde_json::Value;
use std::sync::Arc;

/// Creates a value provider for a request.
pub trait ValueProviderFactory: Send + Sync {
    /// A provider for this request, or `None` when the source is absent.
    fn get_value_provider(&self, context: &ControllerContext) -> Option<Box<dyn ValueProvider>>;
}

/// Values passed explicitly to a child action.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildActionValueProviderFactory;

impl ValueProviderFactory for ChildActionValueProviderFactory {
    fn get_value_provider(&self, context: &ControllerContext) -> Option<Box<dyn ValueProvider>> {
        let values = context.request_context.child_action_values.as_ref()?;
        Some(Box::new(DictionaryValueProvider::new(
            values.iter().map(|(k, v)| (k.as_str(), v.clone())),
            ValueCulture::Invariant,
        )))
    }
}

/// Decoded form fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormValueProviderFactory;

impl ValueProviderFactory for FormValueProviderFactory {
    fn get_value_provider(&self, context: &ControllerContext) -> Option<Box<dyn ValueProvider>> {
        Some(Box::new(NameValueCollectionValueProvider::new(
            &context.request_context.request.form,
            ValueCulture::Current,
        )))
    }
}

/// A JSON request body, flattened into binder keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValueProviderFactory;

impl ValueProviderFactory for JsonValueProviderFactory {
    fn get_value_provider(&self, context: &ControllerContext) -> Option<Box<dyn ValueProvider>> {
        let request = &context.request_context.request;
        if !request.has_json_content() {
            return None;
        }
        let body = request.json_body.as_ref()?;
        Some(Box::new(DictionaryValueProvider::new(
            flatten_json(body),
            ValueCulture::Current,
        )))
    }
}

/// Values produced by the router.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteDataValueProviderFactory;

impl ValueProviderFactory for RouteDataValueProviderFactory {
    fn get_value_provider(&self, context: &ControllerContext) -> Option<Box<dyn ValueProvider>> {
        Some(Box::new(DictionaryValueProvider::new(
            context
                .request_context
                .route_data
                .values()
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone())),
            ValueCulture::Invariant,
        )))
    }
}

/// Decoded query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStringValueProviderFactory;

impl ValueProviderFactory for QueryStringValueProviderFactory {
    fn get_value_provider(&self, context: &ControllerContext) -> Option<Box<dyn ValueProvider>> {
        Some(Box::new(NameValueCollectionValueProvider::new(
            &context.request_context.request.query,
            ValueCulture::Invariant,
        )))
    }
}

/// Uploaded files.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFileCollectionValueProviderFactory;

impl ValueProviderFactory for HttpFileCollectionValueProviderFactory {
    fn get_value_provider(&self, context: &ControllerContext) -> Option<Box<dyn ValueProvider>> {
        Some(Box::new(HttpFileCollectionValueProvider::new(
            &context.request_context.request.files,
        )))
    }
}

/// Flatten a JSON document into binder keys: `a.b` for properties, `a[0]` for
/// array elements. Empty objects and arrays contribute nothing.
#[must_use]
pub fn flatten_json(value: &Value) -> Vec<(String, Value)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    walk(&create_sub_property_name(prefix, key), child, out);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    walk(&create_sub_index_name(prefix, index), child, out);
                }
            }
            scalar => out.push((prefix.to_string(), scalar.clone())),
        }
    }

    let mut out = Vec::new();
    walk("", value, &mut out);
    out
}

/// The ordered factory registry.
///
/// The default order is child-action values, form, JSON body, route data,
/// query string, uploaded files.
#[derive(Clone)]
pub struct ValueProviderFactoryCollection {
    factories: Vec<Arc<dyn ValueProviderFactory>>,
}

impl Default for ValueProviderFactoryCollection {
    fn default() -> Self {
        Self {
            factories: vec![
                Arc::new(ChildActionValueProviderFactory),
                Arc::new(FormValueProviderFactory),
                Arc::new(JsonValueProviderFactory),
                Arc::new(RouteDataValueProviderFactory),
                Arc::new(QueryStringValueProviderFactory),
                Arc::new(HttpFileCollectionValueProviderFactory),
            ],
        }
    }
}

impl std::fmt::Debug for ValueProviderFactoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueProviderFactoryCollection")
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl ValueProviderFactoryCollection {
    /// A registry with no factories.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Append a factory with the lowest precedence.
    pub fn push(&mut self, factory: Arc<dyn ValueProviderFactory>) {
        self.factories.push(factory);
    }

    /// Insert a factory at `index` (clamped to the end).
    pub fn insert(&mut self, index: usize, factory: Arc<dyn ValueProviderFactory>) {
        let index = index.min(self.factories.len());
        self.factories.insert(index, factory);
    }

    /// Number of factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no factories are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// A registry with the resolver's factories ahead of these.
    #[must_use]
    pub fn combined_with(&self, resolver: &dyn DependencyResolver) -> Self {
        let mut factories = resolver.services::<dyn ValueProviderFactory>();
        factories.extend(self.factories.iter().cloned());
        Self { factories }
    }

    /// Instantiate every factory's provider for this request, in order.
    #[must_use]
    pub fn get_value_provider(&self, context: &ControllerContext) -> ValueProviderCollection {
        ValueProviderCollection::new(
            self.factories
                .iter()
                .filter_map(|f| f.get_value_provider(context))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_document() {
        let flattened = flatten_json(&json!({
            "name": "Alice",
            "address": {"city": "Oslo"},
            "tags": ["a", {"label": "b"}],
            "empty": []
        }));
        let keys: Vec<&str> = flattened.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"name"));
        assert!(keys.contains(&"address.city"));
        assert!(keys.contains(&"tags[0]"));
        assert!(keys.contains(&"tags[1].label"));
        assert!(!keys.iter().any(|k| k.starts_with("empty")));
    }

    #[test]
    fn test_top_level_array_uses_index_keys() {
        let flattened = flatten_json(&json!([1, 2]));
        assert_eq!(flattened, vec![("[0]".to_string(), json!(1)), ("[1]".to_string(), json!(2))]);
    }

    #[test]
    fn test_default_order() {
        assert_eq!(ValueProviderFactoryCollection::default().len(), 6);
        assert!(ValueProviderFactoryCollection::empty().is_empty());
    }
}
