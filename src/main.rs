//! Calorie lookup server - answers barcode calorie queries over HTTP
//!
//! Reads configuration from flags and environment, connects to the cache,
//! and serves `POST /v1/food/barcode` until SIGINT or SIGTERM.

use clap::Parser;
use tracing::error;

use calorie_lookup::cli::{Cli, ServerConfig};
use calorie_lookup::logging::init_logging;
use calorie_lookup::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ServerConfig::from_cli(&cli)?;

    init_logging(config.log_format);

    if let Err(err) = server::run(config).await {
        error!(error = %err, "server failed");
        return Err(err.into());
    }

    Ok(())
}
