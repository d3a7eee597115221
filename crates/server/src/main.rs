//! offgrid server entry point.
//!
//! Boots the caching engine and serves its lifecycle signals as MCP tools on
//! stdio. Logging goes to stderr to avoid interfering with the JSON-RPC
//! protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use offgrid_client::{Engine, FetchConfig, HttpFetcher, TracingPresenter};
use offgrid_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("invalid configuration")?;
    tracing::info!(db_path = %config.db_path.display(), generation = %config.generation, "Starting offgrid server on stdio transport");

    let store = CacheDb::open(&config.db_path).await.context("failed to open cache database")?;
    let fetcher = HttpFetcher::new(FetchConfig::from(&config))?;
    let engine = Engine::new(config, Arc::new(store), Arc::new(fetcher), Arc::new(TracingPresenter))?;

    let handler = handler::OffgridServer::new(Arc::new(engine));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
