//! costmap MCP server entry point.
//!
//! Boots the aggregation layer and serves it on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use costmap_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod aggregator;
mod envelope;
mod handler;
mod query;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let cache_sweep = config.cache_sweep_interval();
    let rate_limit_sweep = config.rate_limit_sweep_interval();
    tracing::info!(db_path = %config.db_path.display(), "Starting costmap server on stdio transport");

    let aggregator = aggregator::Aggregator::from_config(config).await.context("failed to initialize aggregator")?;
    let sweepers = [
        aggregator.store().start_sweeper(cache_sweep),
        aggregator.limiter().start_sweeper(rate_limit_sweep),
    ];

    let handler = handler::CostmapServer::new(aggregator);
    let server = serve_server(handler, stdio()).await?;
    let outcome = server.waiting().await;

    for sweeper in sweepers {
        sweeper.stop().await;
    }
    tracing::info!("costmap server stopped");

    outcome?;
    Ok(())
}
