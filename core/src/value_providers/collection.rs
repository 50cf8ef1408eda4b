use super::{UnvalidatedValueProvider, ValueProvider, ValueProviderResult};
use crate::error::MvcResult;

/// Ordered composite of providers; the first provider that knows a key wins.
#[derive(Default)]
pub struct ValueProviderCollection {
    providers: Vec<Box<dyn ValueProvider>>,
}

impl std::fmt::Debug for ValueProviderCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueProviderCollection")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl ValueProviderCollection {
    /// Create a composite over `providers`, queried in order.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn ValueProvider>>) -> Self {
        Self { providers }
    }

    /// Append a provider with the lowest precedence.
    pub fn push(&mut self, provider: Box<dyn ValueProvider>) {
        self.providers.push(provider);
    }

    /// Number of providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the composite holds no providers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ValueProvider for ValueProviderCollection {
    fn contains_prefix(&self, prefix: &str) -> bool {
        self.providers.iter().any(|p| p.contains_prefix(prefix))
    }

    fn get_value(&self, key: &str) -> MvcResult<Option<ValueProviderResult>> {
        self.get_value_unvalidated(key, false)
    }

    fn as_unvalidated(&self) -> Option<&dyn UnvalidatedValueProvider> {
        Some(self)
    }
}

impl UnvalidatedValueProvider for ValueProviderCollection {
    fn get_value_unvalidated(
        &self,
        key: &str,
        skip_validation: bool,
    ) -> MvcResult<Option<ValueProviderResult>> {
        for provider in &self.providers {
            let result = match provider.as_unvalidated() {
                Some(unvalidated) => unvalidated.get_value_unvalidated(key, skip_validation)?,
                None => provider.get_value(key)?,
            };
            if result.is_some() {
                return Ok(result);
            }
        }
        Ok(None)
    }
}
