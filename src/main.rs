//! `ccb-delegation` - MCP server for CCB cross-provider delegation.
//!
//! Communicates over stdio using JSON-RPC 2.0.

use anyhow::Context;

use ccb_delegation::{logging, Config, Server};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    logging::init(&config);

    tracing::info!(
        cache_dir = %config.cache_dir.display(),
        ttl_secs = config.ttl_secs,
        "Starting ccb-delegation MCP server"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    let server = Server::new(config);
    server.sweep();

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    server
        .serve(&runtime, stdin.lock(), stdout.lock())
        .context("stdio transport failed")?;

    tracing::info!("ccb-delegation stopped");
    Ok(())
}
