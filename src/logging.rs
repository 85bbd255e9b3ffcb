//! Structured logging setup
//!
//! JSON lines by default for production, human-readable output for local
//! runs. The filter comes from `RUST_LOG` and falls back to `info`.

use clap::ValueEnum;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid
const DEFAULT_LOG_FILTER: &str = "info";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable, coloured output
    Pretty,
}

/// Installs the global tracing subscriber. Later calls are no-ops.
pub fn init_logging(format: LogFormat) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let registry = tracing_subscriber::registry().with(filter);

        let result = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(true).with_current_span(false))
                .try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        };

        // A subscriber installed elsewhere (e.g. a test harness) wins
        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}
