//! Dependency resolution for pluggable pipeline services.
//!
//! Registries (filter providers, value-provider factories, view engines,
//! validator providers, the controller factory) ask a [`DependencyResolver`]
//! for additional implementations before falling back to what was registered
//! on them directly. Services are keyed by the `TypeId` of the service
//! interface, normally a trait object type such as `dyn ViewEngine`.
//!
//! # Example
//!
//! ```
//! use composable_mvc_core::dependency::{DependencyResolverExt, ServiceContainer};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! let mut container = ServiceContainer::new();
//! container.register::<dyn Greeter>(Arc::new(English));
//!
//! let greeter = container.service::<dyn Greeter>().map(|g| g.greet());
//! assert_eq!(greeter.as_deref(), Some("hello"));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves service implementations by interface type.
///
/// Each stored entry is an `Arc<T>` for the interface `T`, boxed as `Any`.
pub trait DependencyResolver: Send + Sync {
    /// The first registered implementation of `service_type`.
    fn get_service(&self, service_type: TypeId) -> Option<&(dyn Any + Send + Sync)>;

    /// Every registered implementation of `service_type`, in registration order.
    fn get_services(&self, service_type: TypeId) -> Vec<&(dyn Any + Send + Sync)>;
}

/// Typed helpers over [`DependencyResolver`].
pub trait DependencyResolverExt {
    /// The first implementation of `T`.
    fn service<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>>;

    /// Every implementation of `T`.
    fn services<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>>;
}

impl<R: DependencyResolver + ?Sized> DependencyResolverExt for R {
    fn service<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get_service(TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<T>>())
            .cloned()
    }

    fn services<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.get_services(TypeId::of::<T>())
            .into_iter()
            .filter_map(|entry| entry.downcast_ref::<Arc<T>>())
            .cloned()
            .collect()
    }
}

/// A resolver that knows no services.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl DependencyResolver for EmptyResolver {
    fn get_service(&self, _service_type: TypeId) -> Option<&(dyn Any + Send + Sync)> {
        None
    }

    fn get_services(&self, _service_type: TypeId) -> Vec<&(dyn Any + Send + Sync)> {
        Vec::new()
    }
}

/// In-memory resolver populated at startup.
#[derive(Default)]
pub struct ServiceContainer {
    services: HashMap<TypeId, Vec<Box<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("service_types", &self.services.len())
            .finish()
    }
}

impl ServiceContainer {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation of the interface `T`.
    pub fn register<T: ?Sized + Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.services
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Box::new(service));
        self
    }
}

impl DependencyResolver for ServiceContainer {
    fn get_service(&self, service_type: TypeId) -> Option<&(dyn Any + Send + Sync)> {
        self.services
            .get(&service_type)
            .and_then(|entries| entries.first())
            .map(|entry| &**entry)
    }

    fn get_services(&self, service_type: TypeId) -> Vec<&(dyn Any + Send + Sync)> {
        self.services
            .get(&service_type)
            .map(|entries| entries.iter().map(|entry| &**entry).collect())
            .unwrap_or_default()
    }
}
