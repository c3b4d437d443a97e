//! Probe endpoints, readiness gating, and shutdown sequencing
//!
//! Serves the orchestrator-facing probes:
//! - `/healthz` - Liveness (process is running)
//! - `/startupz` - Startup (initialization finished)
//! - `/readyz` - Readiness (traffic may be routed here)
//! - `/health` - Comprehensive dependency health
//!
//! Also owns the graceful-shutdown machinery for SIGTERM/SIGINT.

pub mod coordinator;
mod metrics;
mod probes;
pub mod shutdown;

pub use coordinator::{spawn_startup_fallback, ShutdownCoordinator};
pub use metrics::{create_metrics, Metrics, SharedMetrics};
pub use probes::{run_probe_server, ProbeServerError, ProbeState};
pub use shutdown::{
    run_shutdown_sequence, shutdown_channel, wait_for_signal, ShutdownConfig, ShutdownListener,
    ShutdownNotifier,
};

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod coordinator_tests;

#[cfg(test)]
#[path = "probes_test.rs"]
mod probes_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
