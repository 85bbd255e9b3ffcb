//! Open Food Facts API client
//!
//! Fetches product data from `<base_url>/product/<barcode>.json` and reduces
//! it to a [`FoodRecord`]. Transient failures are retried with linear
//! backoff; a "product not found" answer is returned immediately.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{FetchError, FoodProvider, FoodRecord};

/// Default base URL for the Open Food Facts API
pub const DEFAULT_BASE_URL: &str = "https://world.openfoodfacts.org/api/v0";

/// Per-attempt request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Attempts made by the default retry policy
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff unit of the default retry policy
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

/// Longest a fetch under the default policy can take: every attempt runs
/// into [`REQUEST_TIMEOUT`] and every backoff is slept.
pub const WORST_CASE_FETCH: Duration = Duration::from_millis(
    DEFAULT_MAX_ATTEMPTS as u64 * REQUEST_TIMEOUT.as_millis() as u64
        + DEFAULT_BASE_DELAY.as_millis() as u64
            * (DEFAULT_MAX_ATTEMPTS as u64 * (DEFAULT_MAX_ATTEMPTS as u64 - 1) / 2),
);

/// `status` value the provider uses for unknown products
const STATUS_NOT_FOUND: i64 = 0;

const USER_AGENT: &str = concat!("calorie-lookup/", env!("CARGO_PKG_VERSION"));

/// Bounded retry schedule with linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Delay unit; the wait after attempt `n` is `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Returns how long to wait after the given (1-based) failed attempt, or
    /// `None` if no attempts remain.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.base_delay * attempt)
        }
    }
}

/// Response shape from the product endpoint; only the fields we use.
///
/// Missing and `null` fields both decode to their zero value.
#[derive(Debug, Default, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    product: Option<Product>,
}

#[derive(Debug, Default, Deserialize)]
struct Product {
    #[serde(default)]
    nutriments: Option<Nutriments>,
}

#[derive(Debug, Default, Deserialize)]
struct Nutriments {
    #[serde(rename = "energy-kcal_100g", default)]
    energy_kcal_100g: Option<f64>,
}

impl ProductResponse {
    fn status(&self) -> i64 {
        self.status.unwrap_or_default()
    }

    fn energy_kcal_100g(&self) -> f64 {
        self.product
            .as_ref()
            .and_then(|product| product.nutriments.as_ref())
            .and_then(|nutriments| nutriments.energy_kcal_100g)
            .unwrap_or_default()
    }
}

/// Client for fetching product calories from an Open Food Facts compatible API
#[derive(Debug, Clone)]
pub struct FoodFactsClient {
    /// HTTP client shared by all requests
    http_client: Client,
    /// Base URL without a trailing slash
    base_url: String,
    retry_policy: RetryPolicy,
}

impl FoodFactsClient {
    /// Creates a client with the default per-attempt timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_request_timeout(base_url, REQUEST_TIMEOUT)
    }

    /// Creates a client with a custom per-attempt timeout
    pub fn with_request_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(http_client, base_url))
    }

    /// Creates a client around an existing `reqwest::Client`
    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry schedule
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// URL of the product document for `barcode`
    fn product_url(&self, barcode: &str) -> String {
        format!("{}/product/{}.json", self.base_url, barcode)
    }

    /// Performs a single attempt
    async fn fetch_once(&self, barcode: &str) -> Result<FoodRecord, FetchError> {
        let response = self.http_client.get(self.product_url(barcode)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_product_response(barcode, &body)
    }
}

#[async_trait]
impl FoodProvider for FoodFactsClient {
    async fn fetch(&self, barcode: &str) -> Result<FoodRecord, FetchError> {
        let mut attempt = 1;

        loop {
            let err = match self.fetch_once(barcode).await {
                Ok(record) => return Ok(record),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            let Some(delay) = self.retry_policy.delay_after(attempt) else {
                return Err(err);
            };

            warn!(
                barcode = barcode,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "upstream attempt failed"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Decodes a product document into a [`FoodRecord`]
fn parse_product_response(barcode: &str, body: &[u8]) -> Result<FoodRecord, FetchError> {
    let parsed: ProductResponse = serde_json::from_slice(body)?;

    if parsed.status() == STATUS_NOT_FOUND {
        debug!(barcode = barcode, "provider reported product not found");
        return Err(FetchError::NotFound);
    }

    Ok(FoodRecord {
        barcode: barcode.to_string(),
        calories: truncate_kcal(parsed.energy_kcal_100g()),
    })
}

/// Converts a fractional kcal value to whole kcal, truncating toward zero
fn truncate_kcal(value: f64) -> i64 {
    value.trunc() as i64
}
