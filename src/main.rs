use std::sync::Arc;
use terva::health::HealthAggregator;
use terva::server::{
    create_metrics, run_probe_server, run_shutdown_sequence, shutdown_channel,
    spawn_startup_fallback, wait_for_signal, ProbeState, ShutdownConfig, ShutdownCoordinator,
};
use tracing::{error, info};

/// Default port for probe endpoints
const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Get the probe port from env (default: 8080)
fn health_port() -> u16 {
    std::env::var("TERVA_HEALTH_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_HEALTH_PORT)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting terva probe server");

    let config = ShutdownConfig::from_env();
    let (notifier, listener) = shutdown_channel();
    let coordinator = ShutdownCoordinator::new();

    let metrics = create_metrics()?;

    // The embedding application registers its dependency indicators here;
    // the reference binary runs with an empty set.
    let aggregator = Arc::new(HealthAggregator::new(coordinator.clone(), Vec::new()));
    let state = ProbeState::new(aggregator, metrics);

    // Start probe server in background
    let port = health_port();
    let server_listener = listener.clone();
    let server_handle =
        tokio::spawn(async move { run_probe_server(port, state, server_listener).await });

    // Timer fallback keeps the startup probe from wedging if initialization
    // never signals completion.
    let _startup_fallback = spawn_startup_fallback(coordinator.clone(), config.startup_fallback);

    // No further initialization work here - report started immediately.
    // Applications with real startup work call this from their own
    // startup-completion point instead.
    coordinator.mark_initialized();
    info!(port, "Probe server ready");

    // Block until the orchestrator asks us to stop
    let signal = wait_for_signal().await;
    info!(signal, "Initiating graceful shutdown");

    // Close operation: stop the probe server and wait for it to drain
    let close = async move {
        notifier.notify();
        match server_handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::Error::from(e)),
            Err(e) => Err(anyhow::anyhow!("probe server task failed: {}", e)),
        }
    };

    let code = run_shutdown_sequence(&coordinator, &config, close).await;
    if code != 0 {
        error!(code, "Shutdown did not complete cleanly");
        std::process::exit(code);
    }

    info!("terva shut down gracefully");
    Ok(())
}
