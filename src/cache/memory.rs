//! In-process cache backend
//!
//! Backed by `moka::future::Cache`. Each entry carries the TTL it was written
//! with, and moka evicts it once that TTL passes, whether or not the key is
//! read again. Capacity is bounded, so a long-running process holds at most
//! `max_capacity` entries. Nothing is shared between processes, so this
//! backend suits local runs and tests rather than multi-instance deployments.

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

use super::store::{CacheResult, CacheStore};

/// Default upper bound on the number of cached barcodes
pub const DEFAULT_MAX_CAPACITY: u64 = 100_000;

/// A cached value together with the TTL it was written with
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    ttl: Duration,
}

/// Expires each entry `ttl` after its latest write
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Bounded in-memory cache with per-entry TTL expiry
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Clone)]
pub struct MemoryCacheStore {
    cache: Cache<String, CacheEntry>,
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    /// Creates an empty store holding up to [`DEFAULT_MAX_CAPACITY`] entries
    pub fn new() -> Self {
        Self::with_max_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// Creates an empty store holding up to `max_capacity` entries
    pub fn with_max_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryTtl)
            .build();
        Self { cache }
    }

    /// Number of live entries, after applying pending evictions
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.cache.get(key).await.map(|entry| entry.data))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let entry = CacheEntry {
            data: value.to_vec(),
            ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
