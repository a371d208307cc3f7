//! Tile Swap runner (default binary).
//!
//! Starts the engine and, unless disabled, the JSON line adapter. Runs until
//! Ctrl-C.

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tile_swap::adapter::{run_server, ServerConfig};
use tile_swap::engine::{spawn, EngineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env();
    let (engine, engine_task) = spawn(config)?;

    if ServerConfig::is_disabled() {
        info!("adapter disabled via TILE_SWAP_ADAPTER_DISABLED");
        tokio::signal::ctrl_c().await?;
    } else {
        let server_config = ServerConfig::from_env();
        tokio::select! {
            result = run_server(server_config, engine.clone(), None) => result?,
            signal = tokio::signal::ctrl_c() => signal?,
        }
    }

    info!("shutting down");
    if engine.shutdown().await.is_err() {
        warn!("engine already stopped");
    }
    engine_task.await?;
    Ok(())
}
