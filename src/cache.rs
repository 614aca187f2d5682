//! Route cache: a bounded associative store mapping an opaque fingerprint
//! to a cached route, with TTL expiration and targeted invalidation
//! (spec §4.3).

use lru::LruCache;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::types::{NodeId, RouteEntry};

/// Cumulative hit/miss/put/invalidation counters (§4.3 `stats()`).
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            100.0 * self.hits as f64 / total as f64
        }
    }
}

struct Store {
    // `lru::LruCache` supplies the recency-bounded eviction policy; this is
    // the crate's documented approximation of the ARC-like replacement
    // called for in spec §4.3 (see the "path identifier" / ARC open
    // question discussion in DESIGN.md — exact ARC is out of scope).
    entries: LruCache<String, RouteEntry>,
    // destination -> most recently admitted fingerprint for that
    // destination; resolves the duplicate-key-indexing open question in
    // spec §9 via option (b).
    dest_index: HashMap<NodeId, String>,
}

/// Bounded associative route cache (spec §4.3).
pub struct RouteCache {
    ttl: Duration,
    store: RwLock<Store>,
    stats: RwLock<CacheStats>,
}

impl RouteCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity must be nonzero");
        Self {
            ttl,
            store: RwLock::new(Store {
                entries: LruCache::new(capacity),
                dest_index: HashMap::new(),
            }),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    fn is_fresh(&self, entry: &RouteEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) <= self.ttl
    }

    /// Fetch by destination via the auxiliary index, honoring the same
    /// freshness rule as [`RouteCache::get`] but without access bookkeeping
    /// (used by feedback/invalidation paths — spec §6.3).
    pub fn get_by_destination(&self, destination: NodeId) -> Option<RouteEntry> {
        let key = self.store.read().dest_index.get(&destination).cloned()?;
        self.peek(&key)
    }

    /// The fingerprint currently indexed for `destination`, if any.
    pub fn fingerprint_for_destination(&self, destination: NodeId) -> Option<String> {
        self.store.read().dest_index.get(&destination).cloned()
    }

    /// `get` — present and fresh: bump access bookkeeping, record a hit,
    /// return the entry. Present and stale: remove it, count one
    /// invalidation, record a miss. Absent: record a miss.
    pub fn get(&self, key: &str) -> Option<RouteEntry> {
        let now = Instant::now();
        let mut store = self.store.write();
        let fresh = match store.entries.peek(key) {
            Some(entry) => self.is_fresh(entry, now),
            None => {
                drop(store);
                self.stats.write().misses += 1;
                return None;
            }
        };
        if !fresh {
            store.entries.pop(key);
            drop(store);
            let mut stats = self.stats.write();
            stats.invalidations += 1;
            stats.misses += 1;
            return None;
        }
        let entry = store.entries.get_mut(key).expect("checked present above");
        entry.record_access(now);
        let out = entry.clone();
        drop(store);
        self.stats.write().hits += 1;
        Some(out)
    }

    /// `peek` — returns the entry without mutating access bookkeeping;
    /// returns nothing if expired (without removal).
    pub fn peek(&self, key: &str) -> Option<RouteEntry> {
        let now = Instant::now();
        let store = self.store.read();
        let entry = store.entries.peek(key)?;
        if self.is_fresh(entry, now) {
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Admit `entry` under `key`, replacing any existing entry, and index
    /// it by destination too.
    pub fn put(&self, key: impl Into<String>, entry: RouteEntry) {
        let key = key.into();
        let destination = entry.destination;
        let mut store = self.store.write();
        store.entries.put(key.clone(), entry);
        store.dest_index.insert(destination, key);
        drop(store);
        self.stats.write().puts += 1;
    }

    pub fn invalidate(&self, key: &str) -> bool {
        let removed = {
            let mut store = self.store.write();
            let removed = store.entries.pop(key).is_some();
            if removed {
                store.dest_index.retain(|_, v| v != key);
            }
            removed
        };
        if removed {
            self.stats.write().invalidations += 1;
        }
        removed
    }

    /// Remove every entry whose `destination == dest_id`; returns the count
    /// removed.
    pub fn invalidate_by_destination(&self, dest_id: NodeId) -> usize {
        let removed = {
            let mut store = self.store.write();
            let keys: Vec<String> = store
                .entries
                .iter()
                .filter(|(_, e)| e.destination == dest_id)
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                store.entries.pop(key);
            }
            store.dest_index.remove(&dest_id);
            keys.len()
        };
        if removed > 0 {
            self.stats.write().invalidations += removed as u64;
        }
        removed
    }

    /// Remove every entry whose path traverses any node in `node_ids`.
    pub fn invalidate_by_path(&self, node_ids: &HashSet<NodeId>) -> usize {
        let removed = {
            let mut store = self.store.write();
            let keys: Vec<String> = store
                .entries
                .iter()
                .filter(|(_, e)| e.path.iter().any(|n| node_ids.contains(n)))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                store.entries.pop(key);
            }
            store.dest_index.retain(|_, v| !keys.contains(v));
            keys.len()
        };
        if removed > 0 {
            self.stats.write().invalidations += removed as u64;
        }
        removed
    }

    /// Remove all entries; records the prior size as invalidations.
    pub fn purge(&self) -> usize {
        let mut store = self.store.write();
        let size = store.entries.len();
        store.entries.clear();
        store.dest_index.clear();
        drop(store);
        if size > 0 {
            self.stats.write().invalidations += size as u64;
        }
        size
    }

    /// Remove all entries whose `created_at` is older than the TTL; returns
    /// the count removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut store = self.store.write();
            let keys: Vec<String> = store
                .entries
                .iter()
                .filter(|(_, e)| !self.is_fresh(e, now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                store.entries.pop(key);
            }
            store.dest_index.retain(|_, v| !keys.contains(v));
            keys.len()
        };
        if removed > 0 {
            self.stats.write().invalidations += removed as u64;
        }
        removed
    }

    pub fn size(&self) -> usize {
        self.store.read().entries.len()
    }

    /// Up to `limit` entries ordered by descending `use_count`, stable for
    /// ties within this call.
    pub fn most_used(&self, limit: usize) -> Vec<RouteEntry> {
        let store = self.store.read();
        let mut entries: Vec<RouteEntry> = store.entries.iter().map(|(_, e)| e.clone()).collect();
        entries.sort_by(|a, b| b.use_count.cmp(&a.use_count));
        entries.truncate(limit);
        entries
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn node(v: i64) -> NodeId {
        NodeId::new(v).unwrap()
    }

    fn make_entry(path: Vec<i64>) -> RouteEntry {
        let nodes: Vec<NodeId> = path.into_iter().map(node).collect();
        let hop_count = (nodes.len() - 1) as u32;
        let metrics = crate::types::RouteMetrics {
            latency: Duration::from_millis(5),
            throughput: 50.0,
            reliability: 0.9,
            cost: 1.0,
            hop_count,
            load: 0.1,
            jitter: Duration::from_millis(1),
            packet_loss: 0.0,
        };
        RouteEntry::new(nodes, metrics, 0.8, Value::Null, 0.9, Instant::now()).unwrap()
    }

    #[test]
    fn put_then_get_increments_use_count() {
        let cache = RouteCache::new(10, Duration::from_secs(60));
        cache.put("k1", make_entry(vec![1, 2, 3]));
        let e1 = cache.get("k1").unwrap();
        assert_eq!(e1.use_count, 1);
        let e2 = cache.get("k1").unwrap();
        assert_eq!(e2.use_count, 2);
    }

    #[test]
    fn expired_entry_is_removed_on_get() {
        let cache = RouteCache::new(10, Duration::from_millis(10));
        cache.put("k1", make_entry(vec![1, 2]));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn peek_does_not_mutate_or_remove_expired() {
        let cache = RouteCache::new(10, Duration::from_millis(10));
        cache.put("k1", make_entry(vec![1, 2]));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.peek("k1").is_none());
        // peek must not have removed the stale entry.
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn invalidate_by_destination_removes_matching_entries_only() {
        let cache = RouteCache::new(10, Duration::from_secs(60));
        cache.put("to-3", make_entry(vec![1, 2, 3]));
        cache.put("to-4", make_entry(vec![1, 2, 4]));
        let removed = cache.invalidate_by_destination(node(3));
        assert_eq!(removed, 1);
        assert_eq!(cache.size(), 1);
        assert!(cache.peek("to-4").is_some());
    }

    #[test]
    fn invalidate_by_path_removes_entries_touching_node() {
        let cache = RouteCache::new(10, Duration::from_secs(60));
        cache.put("a", make_entry(vec![1, 2, 3]));
        cache.put("b", make_entry(vec![1, 5, 6]));
        let mut set = HashSet::new();
        set.insert(node(2));
        let removed = cache.invalidate_by_path(&set);
        assert_eq!(removed, 1);
        assert!(cache.peek("b").is_some());
    }

    #[test]
    fn destination_index_resolves_feedback_lookups() {
        let cache = RouteCache::new(10, Duration::from_secs(60));
        cache.put("3-fwd", make_entry(vec![1, 2, 3]));
        let via_index = cache.get_by_destination(node(3)).unwrap();
        assert_eq!(via_index.destination, node(3));
    }

    #[test]
    fn most_used_orders_descending_and_respects_limit() {
        let cache = RouteCache::new(10, Duration::from_secs(60));
        cache.put("a", make_entry(vec![1, 2]));
        cache.put("b", make_entry(vec![1, 3]));
        cache.get("b");
        cache.get("b");
        cache.get("a");
        let top = cache.most_used(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].use_count, 2);
    }
}
