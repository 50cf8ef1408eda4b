use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Remembers where views were found, keyed by engine-specific strings.
pub trait ViewLocationCache: Send + Sync {
    /// The remembered path for `key`.
    fn get_view_location(&self, key: &str) -> Option<String>;

    /// Remember `path` for `key`.
    fn insert_view_location(&self, key: &str, path: &str);
}

/// A cache that never remembers anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullViewLocationCache;

impl ViewLocationCache for NullViewLocationCache {
    fn get_view_location(&self, _key: &str) -> Option<String> {
        None
    }

    fn insert_view_location(&self, _key: &str, _path: &str) {}
}

/// A cache whose entries expire after a sliding window without hits.
#[derive(Debug)]
pub struct DefaultViewLocationCache {
    window: Duration,
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl DefaultViewLocationCache {
    /// Default sliding window (15 minutes).
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

    /// Create a cache with the given sliding window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for DefaultViewLocationCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl ViewLocationCache for DefaultViewLocationCache {
    fn get_view_location(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            None => return None,
            Some((path, last_hit)) if now.duration_since(*last_hit) < self.window => {
                *last_hit = now;
                return Some(path.clone());
            }
            Some(_) => {}
        }
        entries.remove(key);
        None
    }

    fn insert_view_location(&self, key: &str, path: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), (path.to_string(), Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_always_misses() {
        let cache = NullViewLocationCache;
        cache.insert_view_location("k", "~/Views/Home/Index.html");
        assert_eq!(cache.get_view_location("k"), None);
    }

    #[test]
    fn test_default_cache_remembers_within_window() {
        let cache = DefaultViewLocationCache::default();
        cache.insert_view_location("k", "~/Views/Home/Index.html");
        assert_eq!(
            cache.get_view_location("k").as_deref(),
            Some("~/Views/Home/Index.html")
        );
    }

    #[test]
    fn test_zero_window_expires_immediately() {
        let cache = DefaultViewLocationCache::new(Duration::ZERO);
        cache.insert_view_location("k", "path");
        assert_eq!(cache.get_view_location("k"), None);
    }
}
