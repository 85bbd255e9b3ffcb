//! Command-line and environment configuration
//!
//! Every option can be given as a flag or an environment variable, and has a
//! default that works for local development against a Redis on localhost.

use clap::{Parser, ValueEnum};
use reqwest::Url;
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;

use crate::data::food_facts::DEFAULT_BASE_URL;
use crate::logging::LogFormat;

/// Error types for configuration validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The food API base URL is not an absolute http(s) URL
    #[error("Invalid food API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The Redis address is empty
    #[error("Redis address must not be empty")]
    EmptyRedisAddr,
}

/// Which cache backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CacheBackend {
    /// Shared Redis server
    #[default]
    Redis,
    /// Process-local memory, lost on restart
    Memory,
}

/// Barcode calorie lookup service
#[derive(Parser, Debug)]
#[command(name = "calorie-lookup")]
#[command(about = "Barcode calorie lookup service with a Redis cache in front of Open Food Facts")]
#[command(version)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Redis address, either `host:port` or a `redis://` URL
    #[arg(long, env = "REDIS_ADDR", default_value = "localhost:6379")]
    pub redis_addr: String,

    /// Base URL of the food data API
    #[arg(long, env = "FOOD_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub food_api_base_url: String,

    /// Cache backend
    #[arg(long, env = "CACHE_BACKEND", value_enum, default_value_t = CacheBackend::Redis)]
    pub cache_backend: CacheBackend,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

/// Validated runtime configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Redis connection URL
    pub redis_url: String,
    /// Food API base URL without a trailing slash
    pub food_api_base_url: String,
    pub cache_backend: CacheBackend,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Creates a ServerConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(ServerConfig)` with normalized values
    /// * `Err(CliError)` if the base URL or Redis address is unusable
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        Ok(ServerConfig {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port)),
            redis_url: redis_url(&cli.redis_addr)?,
            food_api_base_url: normalize_base_url(&cli.food_api_base_url)?,
            cache_backend: cli.cache_backend,
            log_format: cli.log_format,
        })
    }
}

/// Turns a bare `host:port` into a `redis://` URL; full URLs pass through.
pub fn redis_url(addr: &str) -> Result<String, CliError> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(CliError::EmptyRedisAddr);
    }

    if addr.contains("://") {
        Ok(addr.to_string())
    } else {
        Ok(format!("redis://{}", addr))
    }
}

/// Checks that `url` is an absolute http(s) URL and strips trailing slashes.
pub fn normalize_base_url(url: &str) -> Result<String, CliError> {
    let invalid = |reason: String| CliError::InvalidBaseUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(url.trim_end_matches('/').to_string()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
