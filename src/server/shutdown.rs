//! Graceful shutdown sequencing for SIGTERM/SIGINT
//!
//! Drives the process from serving to exited within a bounded time:
//! - the first termination signal closes the readiness gate
//! - a grace window lets the orchestrator's probe polling observe
//!   not-ready and stop routing new connections
//! - the host application's close operation then races a hard force-exit
//!   deadline, so a hung close can never wedge the process

use crate::server::coordinator::ShutdownCoordinator;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Wait after closing the readiness gate before asking the app to close
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Hard upper bound on the whole close phase
pub const DEFAULT_FORCE_EXIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timer fallback for marking initialization complete
pub const DEFAULT_STARTUP_FALLBACK: Duration = Duration::from_secs(30);

/// Shutdown timing, sourced from the environment
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    pub grace_period: Duration,
    pub force_exit_timeout: Duration,
    pub startup_fallback: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            force_exit_timeout: DEFAULT_FORCE_EXIT_TIMEOUT,
            startup_fallback: DEFAULT_STARTUP_FALLBACK,
        }
    }
}

impl ShutdownConfig {
    /// Load configuration from `TERVA_*` environment variables
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            grace_period: duration_from_env("TERVA_SHUTDOWN_GRACE_SECS", DEFAULT_GRACE_PERIOD),
            force_exit_timeout: duration_from_env(
                "TERVA_SHUTDOWN_DEADLINE_SECS",
                DEFAULT_FORCE_EXIT_TIMEOUT,
            ),
            startup_fallback: duration_from_env(
                "TERVA_STARTUP_FALLBACK_SECS",
                DEFAULT_STARTUP_FALLBACK,
            ),
        }
    }
}

/// Read a duration in whole seconds from an env var
fn duration_from_env(var: &str, default: Duration) -> Duration {
    match std::env::var(var) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(var, value = %raw, "Invalid duration in environment - using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Run the drain-then-close sequence, returning the process exit code
///
/// Strictly forward: draining (gate closed, grace wait), then closing
/// (host close racing the force-exit deadline). The losing branch of the
/// race is dropped, so a clean close cancels the deadline timer.
///
/// Exit codes: 0 when the close completes in time, 1 when it errors or
/// the deadline fires first. A deadline hit abandons in-flight work -
/// bounded shutdown time is the documented tradeoff against an unbounded
/// hang.
pub async fn run_shutdown_sequence<F>(
    coordinator: &ShutdownCoordinator,
    config: &ShutdownConfig,
    close: F,
) -> i32
where
    F: Future<Output = anyhow::Result<()>>,
{
    coordinator.start_shutdown();

    info!(
        grace_secs = config.grace_period.as_secs(),
        "Draining - waiting for orchestrator to observe not-ready"
    );
    tokio::time::sleep(config.grace_period).await;

    info!(
        deadline_secs = config.force_exit_timeout.as_secs(),
        "Closing application"
    );
    tokio::select! {
        result = close => match result {
            Ok(()) => {
                info!("Application closed cleanly");
                0
            }
            Err(e) => {
                error!(error = %e, "Application close failed");
                1
            }
        },
        _ = tokio::time::sleep(config.force_exit_timeout) => {
            error!(
                deadline_secs = config.force_exit_timeout.as_secs(),
                "Force-exit deadline reached before application close completed"
            );
            1
        }
    }
}

/// Listener half of the shutdown broadcast
///
/// Cloned and handed to components (like the probe server) that should
/// stop once the drain begins.
#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Suspend until shutdown is broadcast
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                // Notifier dropped, treat as shutdown
                break;
            }
        }
    }

    /// Check whether shutdown was broadcast (non-blocking)
    pub fn is_notified(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Notifier half of the shutdown broadcast
pub struct ShutdownNotifier {
    sender: watch::Sender<bool>,
}

impl ShutdownNotifier {
    /// Tell every listener to stop
    pub fn notify(&self) {
        let _ = self.sender.send(true);
        info!("Shutdown broadcast to components");
    }
}

/// Create a shutdown broadcast pair
pub fn shutdown_channel() -> (ShutdownNotifier, ShutdownListener) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownNotifier { sender }, ShutdownListener { receiver })
}

/// Wait for SIGTERM or SIGINT
///
/// Blocks until a termination signal is received and returns its name.
///
/// # Panics
/// Panics if signal handlers cannot be registered (OS resource
/// exhaustion).
#[cfg(unix)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to register SIGTERM handler");
            panic!("Cannot register SIGTERM handler: {}", e);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to register SIGINT handler");
            panic!("Cannot register SIGINT handler: {}", e);
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
            "SIGTERM"
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
            "SIGINT"
        }
    }
}

/// Wait for Ctrl+C (non-unix)
///
/// # Panics
/// Panics if the Ctrl+C handler cannot be registered.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to wait for Ctrl+C");
        panic!("Cannot wait for Ctrl+C: {}", e);
    }
    info!("Received Ctrl+C");
    "CTRL_C"
}
