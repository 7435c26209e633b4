//! Serpent arena game server.

use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod entity;
mod server;
mod simulation;
mod world;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Serpent Arena Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  Arena: {}x{}", config.arena.size, config.arena.size);
    info!("  Orbs: {}", config.orb.count);
    info!(
        "  Tick: {}ms, broadcast: {}ms",
        config.server.tick_interval_ms, config.server.broadcast_interval_ms
    );

    // Start the game server
    server::run(config).await?;

    Ok(())
}
