//! Nutrition data provider abstraction
//!
//! [`FoodProvider`] is the capability the lookup pipeline calls on a cache
//! miss. [`FoodFactsClient`] is the HTTP-backed implementation.

pub mod food_facts;

pub use food_facts::{FoodFactsClient, RetryPolicy, WORST_CASE_FETCH};

use async_trait::async_trait;
use thiserror::Error;

/// Calorie data for a single product, as fetched from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoodRecord {
    /// Barcode the record was fetched for
    pub barcode: String,
    /// Energy in kcal per 100g, truncated toward zero
    pub calories: i64,
}

/// Errors that can occur when fetching from the provider
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider reported that no product exists for the barcode
    #[error("food not found")]
    NotFound,

    /// The provider answered with a non-success HTTP status
    #[error("unexpected HTTP status: {0}")]
    Status(u16),

    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Failed to decode the response body
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// `NotFound` is a definitive answer; everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::NotFound)
    }
}

/// Source of nutrition data keyed by barcode
#[async_trait]
pub trait FoodProvider: Send + Sync {
    /// Fetches the calorie record for `barcode`.
    async fn fetch(&self, barcode: &str) -> Result<FoodRecord, FetchError>;
}
