use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use tracing::debug;

/// Memoizes values by a hash of their inputs. Entries older than `max_age`
/// are treated as missing; there is no partial invalidation.
#[derive(Debug)]
pub struct MemoCache<V> {
    name: &'static str,
    max_age: Duration,
    entries: HashMap<u64, (Instant, V)>,
}

impl<V: Clone> MemoCache<V> {
    pub fn new(name: &'static str, max_age: Duration) -> Self {
        Self {
            name,
            max_age,
            entries: HashMap::new(),
        }
    }

    pub fn key_for<K: Hash + ?Sized>(input: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&self, key: u64) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: u64, now: Instant) -> Option<V> {
        match self.entries.get(&key) {
            Some((stored_at, value)) if now.saturating_duration_since(*stored_at) < self.max_age => {
                debug!(cache = self.name, key, "cache hit");
                Some(value.clone())
            }
            _ => {
                debug!(cache = self.name, key, "cache miss");
                None
            }
        }
    }

    pub fn insert(&mut self, key: u64, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: u64, value: V, now: Instant) {
        let max_age = self.max_age;
        self.entries
            .retain(|_, (stored_at, _)| now.saturating_duration_since(*stored_at) < max_age);
        self.entries.insert(key, (now, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_fresh_entries() {
        let mut cache = MemoCache::new("test", Duration::from_secs(60));
        let key = MemoCache::<Vec<i64>>::key_for(&[1i64, 2, 3][..]);
        let now = Instant::now();
        cache.insert_at(key, vec![1, 2, 3], now);
        assert_eq!(cache.get_at(key, now + Duration::from_secs(10)), Some(vec![1, 2, 3]));
    }

    #[test]
    fn expires_after_max_age() {
        let mut cache = MemoCache::new("test", Duration::from_secs(60));
        let now = Instant::now();
        cache.insert_at(7, "pools".to_string(), now);
        assert_eq!(cache.get_at(7, now + Duration::from_secs(61)), None);
    }

    #[test]
    fn zero_max_age_never_hits() {
        let mut cache = MemoCache::new("test", Duration::ZERO);
        cache.insert(1, 10u32);
        assert_eq!(cache.get(1), None);
    }

    #[test]
    fn keys_depend_on_input() {
        let a = MemoCache::<()>::key_for(&[1i64, 2][..]);
        let b = MemoCache::<()>::key_for(&[2i64, 1][..]);
        assert_ne!(a, b);
        assert_eq!(a, MemoCache::<()>::key_for(&vec![1i64, 2][..]));
    }

    #[test]
    fn stale_entries_are_pruned_on_insert() {
        let mut cache = MemoCache::new("test", Duration::from_secs(5));
        let now = Instant::now();
        cache.insert_at(1, 1u8, now);
        cache.insert_at(2, 2u8, now + Duration::from_secs(10));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(2, now + Duration::from_secs(10)), Some(2));
    }
}
