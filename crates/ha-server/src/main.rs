//! Load balancer HA control daemon

use anyhow::Context;
use common::{logging, LogLevel};
use ha_server::{Config, HaServer};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Explicit path wins over the search path
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => Config::load().context("loading configuration")?,
    };

    let level = LogLevel::parse(config.logging.level.as_deref().unwrap_or("info"));
    match config.logging.format.as_deref() {
        Some("json") => logging::init_json(level),
        _ => logging::init(level),
    }

    tracing::info!(mode = %config.keepalive.mode, "Load balancer HA daemon starting");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Received interrupt"),
                _ = terminate.recv() => tracing::info!("Received SIGTERM"),
            }
            shutdown.cancel();
        });
    }

    HaServer::new(config).run(shutdown).await?;

    Ok(())
}
