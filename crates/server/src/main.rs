//! shellcache server entry point.
//!
//! Boots the caching engine and exposes its lifecycle and intercept signals
//! as MCP tools on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchClient, FetchConfig, OfflineWorker, WorkerConfig};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = OfflineWorker::new(WorkerConfig::from_app_config(&config)?, db, fetcher.clone());

    tracing::info!(
        origin = %config.origin,
        generation = %config.generation,
        db_path = %config.db_path.display(),
        "Starting shellcache server on stdio transport"
    );

    let handler = handler::ShellcacheServer::new(Arc::new(worker), fetcher);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
