//! Memoizing reader/writer cache.
//!
//! Descriptor and dispatcher lookups happen on every request but their values
//! only depend on the registered controller types, so they are computed once
//! and shared. [`ReaderWriterCache`] keeps hits on a shared read lock; a miss
//! holds an upgradable lock while the value is created, so creators for the
//! same key never run twice and plain readers are never blocked by a creator.

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::hash::Hash;

/// A process-lifetime memoizing map with concurrent reads and exclusive inserts.
///
/// Values are cloned out of the cache, so `V` is typically an `Arc`.
/// Entries are never evicted.
#[derive(Debug)]
pub struct ReaderWriterCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for ReaderWriterCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ReaderWriterCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, creating it with `creator` on a miss.
    ///
    /// `creator` runs at most once per key. It must not call back into the
    /// same cache.
    pub fn fetch_or_create_item<F>(&self, key: K, creator: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.entries.read().get(&key) {
            return value.clone();
        }

        let guard = self.entries.upgradable_read();
        if let Some(value) = guard.get(&key) {
            return value.clone();
        }

        let value = creator();
        let mut entries = RwLockUpgradableReadGuard::upgrade(guard);
        entries.entry(key).or_insert(value).clone()
    }

    /// Look up a value without creating it.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_second_fetch_returns_cached_value() {
        let cache = ReaderWriterCache::new();
        let first = cache.fetch_or_create_item("k", || Arc::new(1));
        let second = cache.fetch_or_create_item("k", || Arc::new(2));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_racing_callers_observe_one_instance() {
        let cache = Arc::new(ReaderWriterCache::new());
        let created = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let created = Arc::clone(&created);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.fetch_or_create_item("shared", || {
                        created.fetch_add(1, Ordering::SeqCst);
                        Arc::new(String::from("value"))
                    })
                })
            })
            .collect();

        let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[test]
    fn test_read_of_other_key_not_blocked_by_creator() {
        let cache = Arc::new(ReaderWriterCache::new());
        cache.fetch_or_create_item("k2", || Arc::new(2));

        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));

        let creator = {
            let cache = Arc::clone(&cache);
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            thread::spawn(move || {
                cache.fetch_or_create_item("k1", || {
                    entered.wait();
                    release.wait();
                    Arc::new(1)
                })
            })
        };

        // The creator for k1 is now parked inside its factory.
        entered.wait();
        assert_eq!(cache.get(&"k2").map(|v| *v), Some(2));
        assert_eq!(*cache.fetch_or_create_item("k2", || Arc::new(99)), 2);
        release.wait();

        assert_eq!(*creator.join().unwrap(), 1);
    }
}
