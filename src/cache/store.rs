//! Cache store capability shared by all backends

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Time-to-live for barcode lookup entries
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors raised by a cache backend
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached
    #[error("cache connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the command
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// A string key/value store with per-entry expiry.
///
/// One instance is shared by every in-flight request, so implementations must
/// handle their own synchronisation.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(Some(bytes))` on a hit and `Ok(None)` when the key is
    /// missing or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value, expiring
    /// `ttl` from now.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Liveness check, used once at startup.
    async fn ping(&self) -> CacheResult<()>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}
