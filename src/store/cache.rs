use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory lookup cache in front of the database.
///
/// Additions and invalidations can be suspended independently. While
/// suspended, `add` and `invalidate*` are no-ops and reads still hit
/// whatever was cached before. `clear` always empties the cache.
pub struct ObjectCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
    additions_suspended: AtomicBool,
    invalidation_suspended: AtomicBool,
}

impl<K: Eq + Hash, V: Clone> Default for ObjectCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V: Clone> ObjectCache<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            additions_suspended: AtomicBool::new(false),
            invalidation_suspended: AtomicBool::new(false),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<K, V>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries().get(key).cloned()
    }

    pub fn add(&self, key: K, value: V) {
        if self.additions_suspended.load(Ordering::SeqCst) {
            return;
        }
        self.entries().insert(key, value);
    }

    pub fn invalidate(&self, key: &K) {
        if self.invalidation_suspended.load(Ordering::SeqCst) {
            return;
        }
        self.entries().remove(key);
    }

    pub fn invalidate_where<F>(&self, predicate: F)
    where
        F: Fn(&K) -> bool,
    {
        if self.invalidation_suspended.load(Ordering::SeqCst) {
            return;
        }
        self.entries().retain(|key, _| !predicate(key));
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn suspend_additions(&self, suspended: bool) {
        self.additions_suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn suspend_invalidation(&self, suspended: bool) {
        self.invalidation_suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.additions_suspended.load(Ordering::SeqCst)
            || self.invalidation_suspended.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_get_invalidate() {
        let cache: ObjectCache<i64, String> = ObjectCache::new();
        cache.add(1, "one".to_string());
        assert_eq!(cache.get(&1).as_deref(), Some("one"));

        cache.invalidate(&1);
        assert!(cache.get(&1).is_none());
    }

    #[test]
    fn test_suspended_additions_are_dropped() {
        let cache: ObjectCache<i64, String> = ObjectCache::new();
        cache.suspend_additions(true);
        cache.add(1, "one".to_string());
        assert!(cache.is_empty());

        cache.suspend_additions(false);
        cache.add(1, "one".to_string());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_suspended_invalidation_keeps_entries() {
        let cache: ObjectCache<(i64, i64), String> = ObjectCache::new();
        cache.add((1, 1), "a".to_string());
        cache.add((2, 1), "b".to_string());

        cache.suspend_invalidation(true);
        cache.invalidate_where(|(site, _)| *site == 1);
        assert_eq!(cache.len(), 2);

        cache.suspend_invalidation(false);
        cache.invalidate_where(|(site, _)| *site == 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&(2, 1)).is_some());
    }

    #[test]
    fn test_clear_ignores_suspension() {
        let cache: ObjectCache<i64, String> = ObjectCache::new();
        cache.add(1, "one".to_string());
        cache.suspend_invalidation(true);
        cache.clear();
        assert!(cache.is_empty());
    }
}
