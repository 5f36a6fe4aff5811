//! swtier host entry point.
//!
//! Loads configuration, opens the tier storage, installs and activates the
//! caching engine, then serves interception events as MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swtier_client::{Engine, FetchClient, FetchConfig};
use swtier_core::{AppConfig, CacheDb};
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

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, version = %config.cache_version, db = %config.db_path.display(), "starting swtier host");

    let storage = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(FetchClient::new(FetchConfig::from_app(&config)?)?);
    let engine = Arc::new(Engine::new(config, network, storage)?);

    let install = engine.on_install().await?;
    tracing::info!(tier = %install.tier, cached = install.core.cached.len(), failed = install.core.failed.len(), "installed");
    let activate = engine.on_activate().await?;
    tracing::info!(deleted = activate.gc.deleted.len(), secondary = activate.secondary_scheduled, "activated");

    let handler = handler::SwtierHost::new(Arc::clone(&engine));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    engine.settle().await;

    Ok(())
}
