//! Standalone server binary: HTTP API plus the timeout enforcer.
//!
//! Usage: cargo run -p gambit-web --bin gambit-server
//!
//! Settings come from the file named by `GAMBIT_CONFIG` and `GAMBIT_*`
//! variables; see `gambit cfg` for the resolved values.

use gambit_web::{WebServer, config};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    gambit_web::init_logging()?;

    let config = config::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.database_path.display(),
        "starting gambit server"
    );

    let server = WebServer::new(config)?;
    let enforcer = server.context().enforcer();
    let handle = server.start().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeps = Arc::clone(&enforcer).spawn(shutdown_rx);
    tracing::info!(
        addr = %handle.address(),
        instance_id = %enforcer.instance_id(),
        "server running; press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(err) = sweeps.await {
        tracing::error!(error = %err, "enforcer task failed");
    }
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}
