//! Per-session snapshot cache.
//!
//! Entries never expire on their own; only a newer successful resolution or
//! an explicit invalidation replaces them. An optional LRU cap bounds memory
//! when a session browses many keys.

use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use lru::LruCache;
use riskboard_protocol::SelectionKey;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A cached snapshot plus when it was resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: SelectionKey,
    pub snapshot: Arc<Snapshot>,
    pub fetched_at: DateTime<Utc>,
    pub using_fallback: bool,
}

pub struct SnapshotCache {
    entries: Mutex<LruCache<SelectionKey, Arc<CacheEntry>>>,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("len", &self.len())
            .finish()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl SnapshotCache {
    /// `max_entries == 0` means unbounded.
    pub fn new(max_entries: usize) -> Self {
        match NonZeroUsize::new(max_entries) {
            Some(cap) => Self {
                entries: Mutex::new(LruCache::new(cap)),
            },
            None => Self::unbounded(),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
        }
    }

    pub fn get(&self, key: &SelectionKey) -> Option<Arc<CacheEntry>> {
        self.lock().get(key).cloned()
    }

    /// Store `snapshot` unconditionally.
    pub fn put(&self, key: SelectionKey, snapshot: Snapshot) -> Arc<CacheEntry> {
        let entry = Self::entry(key.clone(), snapshot);
        self.lock().put(key, Arc::clone(&entry));
        entry
    }

    /// Store `snapshot` only if `still_current` holds.
    ///
    /// The guard runs under the cache lock, so no other write can slip in
    /// between the check and the store.
    pub fn put_if(
        &self,
        key: SelectionKey,
        snapshot: Snapshot,
        still_current: impl FnOnce() -> bool,
    ) -> Option<Arc<CacheEntry>> {
        let mut entries = self.lock();
        if !still_current() {
            return None;
        }
        let entry = Self::entry(key.clone(), snapshot);
        entries.put(key, Arc::clone(&entry));
        Some(entry)
    }

    /// Drop the entry for `key`, forcing the next resolution to fetch.
    pub fn invalidate(&self, key: &SelectionKey) -> bool {
        self.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(key: SelectionKey, snapshot: Snapshot) -> Arc<CacheEntry> {
        Arc::new(CacheEntry {
            key,
            using_fallback: snapshot.using_fallback,
            fetched_at: Utc::now(),
            snapshot: Arc::new(snapshot),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<SelectionKey, Arc<CacheEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(key: &str) -> Snapshot {
        Snapshot::empty(SelectionKey::from(key))
    }

    #[test]
    fn get_returns_what_put_stored() {
        let cache = SnapshotCache::default();
        let key = SelectionKey::from("A");

        assert!(cache.get(&key).is_none());
        let stored = cache.put(key.clone(), snapshot("A"));

        let hit = cache.get(&key).expect("cached");
        assert!(Arc::ptr_eq(&hit, &stored));
        assert_eq!(hit.snapshot.key, key);
        assert!(!hit.using_fallback);
    }

    #[test]
    fn put_overwrites() {
        let cache = SnapshotCache::default();
        let key = SelectionKey::from("A");
        cache.put(key.clone(), snapshot("A"));

        let mut newer = snapshot("A");
        newer.using_fallback = true;
        cache.put(key.clone(), newer);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key).expect("cached").using_fallback);
    }

    #[test]
    fn put_if_respects_guard() {
        let cache = SnapshotCache::default();
        let key = SelectionKey::from("A");

        assert!(cache.put_if(key.clone(), snapshot("A"), || false).is_none());
        assert!(cache.is_empty());
        assert!(cache.put_if(key.clone(), snapshot("A"), || true).is_some());
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn capped_cache_evicts_least_recently_used() {
        let cache = SnapshotCache::new(2);
        cache.put("A".into(), snapshot("A"));
        cache.put("B".into(), snapshot("B"));
        let _ = cache.get(&"A".into());
        cache.put("C".into(), snapshot("C"));

        assert!(cache.get(&"A".into()).is_some());
        assert!(cache.get(&"B".into()).is_none());
        assert!(cache.get(&"C".into()).is_some());
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = SnapshotCache::new(0);
        cache.put("A".into(), snapshot("A"));
        cache.put("B".into(), snapshot("B"));

        assert!(cache.invalidate(&"A".into()));
        assert!(!cache.invalidate(&"A".into()));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
