//! swcache server entry point.
//!
//! Loads configuration, installs and activates the configured worker
//! version, then serves the control tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchClient, FetchConfig};
use swcache_core::{AppConfig, CacheDb};
use swcache_engine::{Registration, WorkerConfig};
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
    let worker_config = WorkerConfig::from_app(&config)?;
    tracing::info!(
        origin = %worker_config.origin,
        version = %worker_config.version,
        cache = %worker_config.cache_name,
        "Starting swcache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from_app(&config)?)?;
    let registration = Arc::new(Registration::new(Arc::new(network)));

    // A failed install falls back to the last activated generation, else
    // pages stay uncontrolled; the server still answers.
    let worker = registration.worker(worker_config.clone(), db.clone());
    match registration.register(worker).await {
        Ok(report) => tracing::info!(
            version = %report.version,
            deleted = ?report.deleted,
            fresh_install = report.fresh_install,
            "worker active"
        ),
        Err(e) => {
            tracing::error!(error = %e, "worker install failed");
            match registration.restore(worker_config.clone(), db.clone()).await {
                Ok(Some(version)) => tracing::info!(version = %version, "resumed recorded generation"),
                Ok(None) => tracing::warn!("no generation to resume, serving uncontrolled"),
                Err(e) => tracing::error!(error = %e, "resume failed, serving uncontrolled"),
            }
        }
    }

    let handler = handler::SwCacheServer::new(registration, db, worker_config.origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
