//! Process-wide readiness gate shared by probe handlers and the sequencer
//!
//! Single source of truth for "should the orchestrator route traffic
//! here". Constructed once at startup and passed by clone to every
//! consumer - no global singleton.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// All flags live in one atomic so every read is a consistent snapshot:
// no caller can ever observe shutting-down together with ready.
const READY: u8 = 1 << 0;
const SHUTTING_DOWN: u8 = 1 << 1;
const INITIALIZED: u8 = 1 << 2;

/// Cheaply cloneable handle over the shared lifecycle flags
///
/// `is_service_ready` is on the hot path of every readiness probe and is
/// a single lock-free load. `start_shutdown` is a one-way latch: once set
/// it never resets within the process lifetime, and `mark_ready` is
/// silently ignored from then on so a late health-check success cannot
/// reopen the gate during a drain.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    state: Arc<AtomicU8>,
}

impl ShutdownCoordinator {
    /// Create a new coordinator (ready, not shutting down, not initialized)
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(READY)),
        }
    }

    /// Should traffic be routed here right now?
    pub fn is_service_ready(&self) -> bool {
        let s = self.state.load(Ordering::SeqCst);
        s & READY != 0 && s & SHUTTING_DOWN == 0
    }

    /// Is a drain underway?
    ///
    /// Distinguishes "temporarily not ready" from "permanently draining"
    /// in diagnostic output.
    pub fn is_shutdown_in_progress(&self) -> bool {
        self.state.load(Ordering::SeqCst) & SHUTTING_DOWN != 0
    }

    /// Latch the shutdown flag and close the readiness gate
    ///
    /// Idempotent under concurrent invocation: the compare-and-swap makes
    /// exactly one caller observe the transition, and only that caller's
    /// call logs. Returns whether this call performed the transition.
    pub fn start_shutdown(&self) -> bool {
        let transitioned = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                if s & SHUTTING_DOWN != 0 {
                    None
                } else {
                    Some((s | SHUTTING_DOWN) & !READY)
                }
            })
            .is_ok();
        if transitioned {
            info!("Shutdown started - readiness gate closed");
        }
        transitioned
    }

    /// Manually fail readiness (e.g. a warm-up phase)
    pub fn mark_not_ready(&self) {
        self.state.fetch_and(!READY, Ordering::SeqCst);
    }

    /// Manually restore readiness
    ///
    /// Ignored once shutdown has started - the drain must not be reversed.
    pub fn mark_ready(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                if s & SHUTTING_DOWN != 0 {
                    None
                } else {
                    Some(s | READY)
                }
            });
    }

    /// Record that application initialization has completed
    ///
    /// Called by the application from its own startup-completion point;
    /// gates the startup probe.
    pub fn mark_initialized(&self) {
        let prev = self.state.fetch_or(INITIALIZED, Ordering::SeqCst);
        if prev & INITIALIZED == 0 {
            debug!("Initialization complete - startup probe will now pass");
        }
    }

    /// Has initialization completed?
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::SeqCst) & INITIALIZED != 0
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer fallback for the startup probe
///
/// `mark_initialized` is the primary mechanism; this task marks the
/// process initialized after `delay` in case the application never
/// signals completion, so the startup probe cannot wedge forever.
pub fn spawn_startup_fallback(
    coordinator: ShutdownCoordinator,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if !coordinator.is_initialized() {
            warn!(
                delay_secs = delay.as_secs(),
                "Initialization was never signalled - marking initialized from timer fallback"
            );
            coordinator.mark_initialized();
        }
    })
}
