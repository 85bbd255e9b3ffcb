//! Cache-aside barcode lookup
//!
//! [`LookupService::resolve`] checks the cache, falls back to the provider on
//! a miss, and writes successful results back with a 24 hour TTL:
//!
//! ```text
//! cache lookup -> hit  -> cached bytes
//!              -> miss -> fetch -> found     -> cache write -> payload
//!                               -> not found -> NotFound
//!                               -> error     -> UpstreamError
//! ```
//!
//! Cache failures never fail a lookup. A read error counts as a miss and a
//! write error is logged and dropped. Not-found answers and upstream errors
//! are never cached.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cache::{food_barcode_key, CacheStore, CACHE_TTL};
use crate::data::{FetchError, FoodProvider, FoodRecord};

/// Source tag for results that were fetched rather than served from cache
pub const SOURCE_EXTERNAL_API: &str = "external_api";

/// Body returned for a successful lookup; also the exact bytes cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodResponse {
    pub barcode: String,
    pub calories: i64,
    pub source: String,
}

impl FoodResponse {
    fn fetched(record: &FoodRecord) -> Self {
        Self {
            barcode: record.barcode.clone(),
            calories: record.calories,
            source: SOURCE_EXTERNAL_API.to_string(),
        }
    }
}

/// Result of one lookup request
#[derive(Debug)]
pub enum RetrievalOutcome {
    /// Bytes served verbatim from the cache
    CacheHit(Vec<u8>),
    /// Fetched from the provider; `payload` is the serialized [`FoodResponse`]
    Fetched { record: FoodRecord, payload: Vec<u8> },
    /// The provider has no product for this barcode
    NotFound,
    /// The provider failed after all retries
    UpstreamError(String),
    /// The response could not be encoded
    TransportError(String),
    /// The request could not be decoded
    InvalidInput(String),
}

/// Request-scoped cache-aside pipeline over a shared cache and provider
#[derive(Clone)]
pub struct LookupService {
    cache: Arc<dyn CacheStore>,
    provider: Arc<dyn FoodProvider>,
    ttl: Duration,
}

impl std::fmt::Debug for LookupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupService")
            .field("cache", &self.cache.backend_name())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl LookupService {
    pub fn new(cache: Arc<dyn CacheStore>, provider: Arc<dyn FoodProvider>) -> Self {
        Self {
            cache,
            provider,
            ttl: CACHE_TTL,
        }
    }

    /// Looks up calories for `barcode`.
    ///
    /// Performs at most one cache write per call and never returns an error
    /// caused by the cache.
    pub async fn resolve(&self, barcode: &str) -> RetrievalOutcome {
        let key = food_barcode_key(barcode);

        match self.cache.get(&key).await {
            Ok(Some(payload)) => {
                info!(barcode = barcode, "cache hit");
                return RetrievalOutcome::CacheHit(payload);
            }
            Ok(None) => info!(barcode = barcode, "cache miss"),
            Err(err) => warn!(key = %key, error = %err, "cache read failed, treating as miss"),
        }

        let record = match self.provider.fetch(barcode).await {
            Ok(record) => record,
            Err(FetchError::NotFound) => return RetrievalOutcome::NotFound,
            Err(err) => {
                error!(barcode = barcode, error = %err, "external api failed");
                return RetrievalOutcome::UpstreamError(err.to_string());
            }
        };

        let payload = match serde_json::to_vec(&FoodResponse::fetched(&record)) {
            Ok(payload) => payload,
            Err(err) => return RetrievalOutcome::TransportError(err.to_string()),
        };

        if let Err(err) = self.cache.set(&key, &payload, self.ttl).await {
            warn!(key = %key, error = %err, "cache write failed");
        }

        RetrievalOutcome::Fetched { record, payload }
    }
}
