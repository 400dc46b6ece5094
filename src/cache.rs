//! Response cache memoizing heartbeat-response payloads by fingerprint.
//!
//! Entries are invalidated by TTL and by explicit per-capability invalidation
//! when the catalog changes. [`SingleFlight`] ensures concurrent requests
//! sharing a fingerprint perform exactly one computation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::Result;
use crate::model::DependencyDeclaration;

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_entries: 10_000,
            enabled: true,
        }
    }
}

/// A cached heartbeat response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: Vec<u8>,
    pub version: u64,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Storage interface for the response cache, decoupled from any one backend.
///
/// `capability_tags` on `set` records which (namespace, capability) pairs the
/// cached response depended on, so a later capability change can invalidate
/// it precisely via `delete_by_capability`; pass an empty slice for entries
/// with no such dependency.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration, capability_tags: &[(String, String)]) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn delete_by_capability(&self, namespace: &str, capability: &str) -> Result<u64>;
    async fn stats(&self) -> CacheStats;
    async fn clear(&self) -> Result<()>;
}

struct StoredEntry {
    entry: CacheEntry,
    expires_at: Instant,
    capability_tags: Vec<(String, String)>,
    last_access: Instant,
}

/// In-memory [`CacheStore`]. The default and only backend this core ships; a
/// distributed cache is out of scope (§1 non-goals: no multi-replica consensus).
pub struct InMemoryCacheStore {
    entries: DashMap<String, StoredEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    config: CacheConfig,
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl InMemoryCacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            config,
        }
    }

    /// Evict the least-recently-accessed entries down to `max_entries`.
    /// `max_entries == 0` means unbounded.
    fn maybe_evict(&self) {
        if self.config.max_entries == 0 || self.entries.len() <= self.config.max_entries {
            return;
        }
        let to_evict = self.entries.len() - self.config.max_entries;
        let mut by_access: Vec<(String, Instant)> =
            self.entries.iter().map(|e| (e.key().clone(), e.last_access)).collect();
        by_access.sort_by_key(|(_, accessed)| *accessed);
        for (key, _) in by_access.into_iter().take(to_evict) {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut expired = false;
        if let Some(mut stored) = self.entries.get_mut(key) {
            if stored.expires_at > Instant::now() {
                stored.last_access = Instant::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(stored.entry.clone()));
            }
            expired = true;
        }
        if expired {
            self.entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration, capability_tags: &[(String, String)]) -> Result<()> {
        self.maybe_evict();
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                entry,
                expires_at: now + ttl,
                capability_tags: capability_tags.to_vec(),
                last_access: now,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_by_capability(&self, namespace: &str, capability: &str) -> Result<u64> {
        let target = (namespace.to_string(), capability.to_string());
        let to_remove: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.capability_tags.contains(&target))
            .map(|e| e.key().clone())
            .collect();
        let count = to_remove.len() as u64;
        for key in &to_remove {
            self.entries.remove(key);
        }
        self.evictions.fetch_add(count, Ordering::Relaxed);
        Ok(count)
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Key construction. A fingerprint covers the agent identity, its declared
/// capabilities and dependency selectors, and the consumer's last-observed
/// response version — the latter lets an unchanged resubmission hit the
/// cache idempotently while invalidation (not the fingerprint alone) is what
/// guarantees freshness after a catalog mutation (DESIGN.md open question).
pub mod keys {
    use super::*;

    pub fn fingerprint(
        agent_id: Uuid,
        namespace: &str,
        capability_names: &[&str],
        dependencies: &[&DependencyDeclaration],
        prior_response_version: Option<u64>,
    ) -> String {
        let mut hasher = DefaultHasher::new();
        agent_id.hash(&mut hasher);
        namespace.hash(&mut hasher);
        for name in capability_names {
            name.hash(&mut hasher);
        }
        for dep in dependencies {
            dep.ordinal.hash(&mut hasher);
            dep.capability.hash(&mut hasher);
            dep.tags.hash(&mut hasher);
            dep.version_constraint.hash(&mut hasher);
            dep.namespace.hash(&mut hasher);
        }
        prior_response_version.hash(&mut hasher);
        format!("heartbeat:{agent_id}:{:016x}", hasher.finish())
    }
}

/// Ensures concurrent requests sharing a fingerprint perform exactly one
/// computation; late arrivals wait on the first computation's result.
#[derive(Default)]
pub struct SingleFlight {
    in_flight: DashMap<String, Arc<Notify>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `compute` for `key`, or wait for an already in-flight computation
    /// for the same key and then retry the provided cache lookup.
    pub async fn get_or_compute<F, Fut>(
        &self,
        cache: &dyn CacheStore,
        key: &str,
        compute: F,
    ) -> Result<CacheEntry>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<CacheEntry>>,
    {
        if let Some(hit) = cache.get(key).await? {
            return Ok(hit);
        }

        let notify = match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let notify = existing.get().clone();
                drop(existing);
                notify.notified().await;
                if let Some(hit) = cache.get(key).await? {
                    return Ok(hit);
                }
                return compute().await;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let notify = Arc::new(Notify::new());
                slot.insert(notify.clone());
                notify
            }
        };

        let result = compute().await;
        self.in_flight.remove(key);
        notify.notify_waiters();
        result
    }
}
