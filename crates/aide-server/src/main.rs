//! AIDE Server - Main entry point

use aide_common::logging::{init_logging, LogConfig};
use anyhow::Result;
use tracing::info;

use aide_server::{api, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("aide-server")
        .filter_directives("aide_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    // Keeps the file appender flushing until exit.
    let _guard = init_logging(&log_config)?;

    info!("Starting AIDE Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    api::serve(config).await
}
