//! Probe endpoints for the orchestrator
//!
//! - `/healthz` - Liveness: is the process alive? Always 200, never
//!   touches dependencies.
//! - `/startupz` - Startup: has initialization finished?
//! - `/readyz` - Readiness: should traffic be routed here? 503 while
//!   draining or while a critical dependency is down.
//! - `/health` - Comprehensive three-valued health for monitoring.
//! - `/metrics` - Prometheus metrics in text format.

use crate::health::aggregator::HealthAggregator;
use crate::health::indicator::HealthCheckResult;
use crate::server::coordinator::ShutdownCoordinator;
use crate::server::metrics::SharedMetrics;
use crate::server::shutdown::ShutdownListener;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

/// Errors from running the probe server
#[derive(Debug, Error)]
pub enum ProbeServerError {
    #[error("failed to bind probe listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("probe server terminated: {0}")]
    Serve(#[source] std::io::Error),
}

/// Shared state for the probe handlers
#[derive(Clone)]
pub struct ProbeState {
    aggregator: Arc<HealthAggregator>,
    metrics: SharedMetrics,
}

impl ProbeState {
    /// Create new probe state
    pub fn new(aggregator: Arc<HealthAggregator>, metrics: SharedMetrics) -> Self {
        Self {
            aggregator,
            metrics,
        }
    }

    fn coordinator(&self) -> &ShutdownCoordinator {
        self.aggregator.coordinator()
    }
}

#[derive(Serialize)]
struct LivenessBody {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime_seconds: u64,
}

#[derive(Serialize)]
struct StartupBody {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct ReadinessBody {
    status: &'static str,
    /// Omitted entirely (not an empty object) when no checks were run
    #[serde(skip_serializing_if = "Option::is_none")]
    checks: Option<HashMap<String, HealthCheckResult>>,
    shutdown_in_progress: bool,
    timestamp: DateTime<Utc>,
    uptime_seconds: u64,
}

/// Liveness probe handler
///
/// If this responds at all, the process is alive.
async fn healthz(State(state): State<ProbeState>) -> impl IntoResponse {
    state.metrics.record_probe("healthz", 200);
    (
        StatusCode::OK,
        Json(LivenessBody {
            status: "ok",
            timestamp: Utc::now(),
            uptime_seconds: state.aggregator.uptime_seconds(),
        }),
    )
}

/// Startup probe handler
///
/// 200 once the application has marked itself initialized, 503 before.
async fn startupz(State(state): State<ProbeState>) -> impl IntoResponse {
    let (status, code) = if state.coordinator().is_initialized() {
        ("ok", StatusCode::OK)
    } else {
        ("starting", StatusCode::SERVICE_UNAVAILABLE)
    };
    state.metrics.record_probe("startupz", code.as_u16());
    (
        code,
        Json(StartupBody {
            status,
            timestamp: Utc::now(),
        }),
    )
}

/// Readiness probe handler
///
/// 200 only while the service is accepting traffic and every critical
/// dependency is up. During a drain the status string distinguishes
/// `shutting_down` from a plain `unavailable`.
async fn readyz(State(state): State<ProbeState>) -> impl IntoResponse {
    let report = state.aggregator.is_ready().await;
    let shutdown_in_progress = state.coordinator().is_shutdown_in_progress();

    let (status, code) = if report.ready {
        ("ok", StatusCode::OK)
    } else if shutdown_in_progress {
        ("shutting_down", StatusCode::SERVICE_UNAVAILABLE)
    } else {
        ("unavailable", StatusCode::SERVICE_UNAVAILABLE)
    };
    state.metrics.record_probe("readyz", code.as_u16());

    let checks = if report.checks.is_empty() {
        None
    } else {
        Some(report.checks)
    };

    (
        code,
        Json(ReadinessBody {
            status,
            checks,
            shutdown_in_progress,
            timestamp: Utc::now(),
            uptime_seconds: state.aggregator.uptime_seconds(),
        }),
    )
}

/// Comprehensive health handler
///
/// Always 200; the body's `status` field drives monitoring-side
/// alerting (`unhealthy` = page, `degraded` = warn).
async fn health(State(state): State<ProbeState>) -> impl IntoResponse {
    let report = state.aggregator.get_health().await;
    state.metrics.record_probe("health", 200);
    (StatusCode::OK, Json(report))
}

/// Prometheus metrics handler
async fn metrics(State(state): State<ProbeState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Build the probe router
fn build_router(state: ProbeState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/startupz", get(startupz))
        .route("/readyz", get(readyz))
        .route("/health", get(health))
        .route("/metrics", get(self::metrics))
        .with_state(state)
}

/// Run the probe server on the specified port
///
/// Serves until shutdown is broadcast on `shutdown`, then lets in-flight
/// probe requests finish and returns.
pub async fn run_probe_server(
    port: u16,
    state: ProbeState,
    mut shutdown: ShutdownListener,
) -> Result<(), ProbeServerError> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(ProbeServerError::Bind)?;
    // Log after successful bind - server is actually listening
    info!(port = %port, "Probe server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(ProbeServerError::Serve)
}
