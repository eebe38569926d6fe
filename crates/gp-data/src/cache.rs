//! TTL-aware analysis cache.
//!
//! One [`TtlCache`] per analysis type (risk reports, optimization,
//! sensitivity, stress) is owned exclusively by the analytics engine; no
//! other component mutates cache state. Entries are keyed by entity plus a
//! parameter fingerprint, stale entries count as misses and are evicted on
//! access, and concurrent writers for the same key resolve last-write-wins
//! by timestamp comparison rather than locking.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

/// Cache key: the entity the analysis belongs to plus a fingerprint of the
/// call parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity_id: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(entity_id: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            fingerprint: fingerprint.into(),
        }
    }
}

/// Serialize call parameters into a stable fingerprint string.
pub fn fingerprint<T: Serialize>(params: &T) -> String {
    serde_json::to_string(params).unwrap_or_default()
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    computed_at: DateTime<Utc>,
}

/// In-memory cache with a fixed time-to-live.
#[derive(Debug)]
pub struct TtlCache<T: Clone> {
    entries: DashMap<CacheKey, CacheEntry<T>>,
    ttl: Duration,
    stats: RwLock<CacheStats>,
}

impl<T: Clone> TtlCache<T> {
    /// Default validity window for analysis results.
    pub const DEFAULT_TTL_SECS: i64 = 300;

    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(Self::DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Fetch a fresh entry. A stale entry is evicted and reported as a miss,
    /// forcing recomputation.
    pub fn get(&self, key: &CacheKey) -> Option<T> {
        let now = Utc::now();

        if let Some(entry) = self.entries.get(key) {
            if now - entry.computed_at < self.ttl {
                self.stats.write().hits += 1;
                return Some(entry.value.clone());
            }
        } else {
            self.stats.write().misses += 1;
            return None;
        }

        // Present but expired: drop it.
        self.entries.remove(key);
        let mut stats = self.stats.write();
        stats.evictions += 1;
        stats.misses += 1;
        None
    }

    /// Store a freshly computed value. If a racing writer already stored a
    /// newer entry, the newer one is kept.
    pub fn put(&self, key: CacheKey, value: T) {
        let fresh = CacheEntry {
            value,
            computed_at: Utc::now(),
        };
        match self.entries.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().computed_at <= fresh.computed_at {
                    occupied.insert(fresh);
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(fresh);
            }
        }
        self.stats.write().stores += 1;
    }

    /// Drop every entry for one entity (e.g. when a VPP is decommissioned).
    pub fn invalidate_entity(&self, entity_id: &str) {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.key().entity_id == entity_id)
            .map(|e| e.key().clone())
            .collect();
        let removed = keys.len() as u64;
        for key in keys {
            self.entries.remove(&key);
        }
        self.stats.write().evictions += removed;
        debug!(entity = entity_id, removed, "cache entries invalidated");
    }

    pub fn clear(&self) {
        debug!(entries = self.entries.len(), "cache cleared");
        self.entries.clear();
        *self.stats.write() = CacheStats::default();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
