//! API aggregation gateway binary.
//!
//! Loads configuration, initializes logging, and serves the query
//! endpoint until interrupted.

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use querygate::client::HttpResourceClient;
use querygate::config::{self, GatewayConfig};
use querygate::observability::logging;
use querygate::web::GatewayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("querygate=debug,tower_http=debug");

    let config = match std::env::args().nth(1) {
        Some(path) => config::load_config(Path::new(&path))?,
        None => GatewayConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        resource_timeout_ms = config.executor.resource_timeout_ms,
        multiplex_concurrency = config.executor.multiplex_concurrency,
        mappings = config.mappings.len(),
        "configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for connections");

    let client = Arc::new(HttpResourceClient::new());
    let server = GatewayServer::new(&config, client);
    server.run(listener).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
