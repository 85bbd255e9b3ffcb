//! HTTP transport for barcode lookups
//!
//! Exposes `POST /v1/food/barcode`, decodes the request body, runs the lookup
//! pipeline and maps each [`RetrievalOutcome`] to a status and body.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use crate::cache::{CacheError, CacheStore, MemoryCacheStore, RedisCacheStore, COMMAND_TIMEOUT};
use crate::cli::{CacheBackend, ServerConfig};
use crate::data::{FoodFactsClient, WORST_CASE_FETCH};
use crate::lookup::{LookupService, RetrievalOutcome};

/// Route for barcode lookups
pub const LOOKUP_PATH: &str = "/v1/food/barcode";

/// Headroom on top of the worst-case lookup for routing and encoding
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_millis(500);

/// Upper bound on a whole request: a timed-out cache read, the slowest
/// possible fetch, and a timed-out cache write still finish inside it.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(
    2 * COMMAND_TIMEOUT.as_millis() as u64
        + WORST_CASE_FETCH.as_millis() as u64
        + REQUEST_TIMEOUT_SLACK.as_millis() as u64,
);

/// How long in-flight requests may drain after a shutdown signal
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Errors that stop the server from starting or running
#[derive(Debug, Error)]
pub enum ServerError {
    /// The cache backend is unreachable at startup
    #[error("failed to connect to cache: {0}")]
    Cache(#[from] CacheError),

    /// The upstream HTTP client could not be built
    #[error("failed to build food API client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The server loop failed
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Inbound lookup request body
#[derive(Debug, Deserialize)]
struct BarcodeRequest {
    barcode: String,
}

impl IntoResponse for RetrievalOutcome {
    fn into_response(self) -> Response {
        match self {
            RetrievalOutcome::CacheHit(payload) | RetrievalOutcome::Fetched { payload, .. } => {
                (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], payload).into_response()
            }
            RetrievalOutcome::NotFound => (StatusCode::NOT_FOUND, "food not found").into_response(),
            RetrievalOutcome::UpstreamError(_) => {
                (StatusCode::BAD_GATEWAY, "external api error").into_response()
            }
            RetrievalOutcome::TransportError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
            RetrievalOutcome::InvalidInput(_) => {
                (StatusCode::BAD_REQUEST, "invalid request body").into_response()
            }
        }
    }
}

/// Handler for `POST /v1/food/barcode`
async fn lookup_barcode(State(lookup): State<LookupService>, body: Bytes) -> RetrievalOutcome {
    let request: BarcodeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return RetrievalOutcome::InvalidInput(err.to_string()),
    };

    lookup.resolve(&request.barcode).await
}

/// Builds the application router
pub fn router(lookup: LookupService) -> Router {
    Router::new()
        .route(LOOKUP_PATH, post(lookup_barcode))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(lookup)
}

/// Opens the configured cache backend
pub async fn connect_cache(config: &ServerConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.cache_backend {
        CacheBackend::Redis => Ok(Arc::new(RedisCacheStore::connect(&config.redis_url).await?)),
        CacheBackend::Memory => Ok(Arc::new(MemoryCacheStore::new())),
    }
}

/// Wires the cache, provider and router together and serves until SIGINT/SIGTERM
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let cache = connect_cache(&config).await?;
    cache.ping().await?;
    info!(backend = cache.backend_name(), "connected to cache");

    let provider = FoodFactsClient::new(config.food_api_base_url.as_str())?;
    let lookup = LookupService::new(cache, Arc::new(provider));

    let addr = config.bind_addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "starting server");

    serve(listener, router(lookup), shutdown_signal()).await
}

/// Serves `app` until `shutdown` resolves, then drains in-flight requests
/// for at most [`SHUTDOWN_GRACE_PERIOD`].
pub async fn serve<S>(listener: TcpListener, app: Router, shutdown: S) -> Result<(), ServerError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let signal = async move {
        shutdown.await;
        info!("shutting down server");
        let _ = draining_tx.send(());
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .into_future();
    let mut server = std::pin::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(ServerError::Serve),
        _ = draining_rx => {}
    }

    match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, server).await {
        Ok(result) => result.map_err(ServerError::Serve),
        Err(_) => {
            warn!(
                grace_period_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
                "graceful shutdown failed, dropping in-flight requests"
            );
            Ok(())
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
