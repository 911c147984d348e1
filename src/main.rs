use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duality_exchange::broadcast::BroadcastChannel;
use duality_exchange::config::EngineConfig;
use duality_exchange::engine::Engine;
use duality_exchange::persistence::InMemoryPersistence;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = EngineConfig::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting duality-exchange v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(symbols = ?config.symbols, partitions = config.ingress_partitions, "engine configuration loaded");

    let _metrics_handle = duality_exchange::metrics::init_metrics();

    let persistence = Arc::new(InMemoryPersistence::default());
    let broadcast = Arc::new(BroadcastChannel::new(1024));
    let engine = Engine::new(&config, persistence, broadcast);

    shutdown_signal().await;
    tracing::info!("shutdown signal received, draining");
    engine.shutdown().await?;

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
