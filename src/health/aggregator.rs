//! Aggregation of registered indicators into readiness and health answers
//!
//! Two reductions over the same indicator set:
//! - `is_ready` - critical indicators only, binary answer for traffic gating
//! - `get_health` - all indicators, three-valued answer for monitoring
//!
//! Checks always run fresh and concurrently; nothing is cached between
//! calls.

use crate::health::indicator::{CheckStatus, HealthCheckResult, HealthIndicator};
use crate::server::ShutdownCoordinator;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Upper bound on a single indicator run
///
/// Without a bound, one hung dependency would stall every readiness and
/// health query behind it. A timed-out check is reported as down.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Three-valued aggregate status for monitoring
///
/// `unhealthy` = a critical dependency is down (page), `degraded` = only
/// non-critical failures (warn), `healthy` = everything up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One indicator's result in the comprehensive health view
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorHealth {
    pub status: CheckStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub critical: bool,
}

/// Comprehensive health report, computed fresh on every call
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedHealth {
    pub status: HealthState,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub checks: HashMap<String, IndicatorHealth>,
}

/// Readiness answer for traffic gating
#[derive(Debug, Clone)]
pub struct ReadinessReport {
    pub ready: bool,
    pub checks: HashMap<String, HealthCheckResult>,
}

/// Runs registered indicators and reduces their results
///
/// Shared by every probe handler; construct once at startup and wrap in
/// an `Arc`.
pub struct HealthAggregator {
    coordinator: ShutdownCoordinator,
    indicators: Vec<Arc<dyn HealthIndicator>>,
    started_at: Instant,
    check_timeout: Duration,
}

impl HealthAggregator {
    /// Create an aggregator over the given indicator set
    ///
    /// An empty set is a valid default: readiness is then gated only by
    /// the coordinator and health reports `healthy`.
    pub fn new(
        coordinator: ShutdownCoordinator,
        indicators: Vec<Arc<dyn HealthIndicator>>,
    ) -> Self {
        Self {
            coordinator,
            indicators,
            started_at: Instant::now(),
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// Override the per-indicator timeout
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// The readiness gate this aggregator consults
    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    /// Seconds since the aggregator was constructed (monotonic, floored)
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Should the orchestrator route traffic here?
    ///
    /// Short-circuits without running any indicator when the coordinator
    /// reports not ready - during a drain the dependency state is
    /// irrelevant and the work would be wasted. Otherwise runs every
    /// critical indicator concurrently; ready iff all of them are up.
    pub async fn is_ready(&self) -> ReadinessReport {
        if !self.coordinator.is_service_ready() {
            return ReadinessReport {
                ready: false,
                checks: HashMap::new(),
            };
        }

        let criticals: Vec<_> = self
            .indicators
            .iter()
            .filter(|i| i.critical())
            .cloned()
            .collect();
        if criticals.is_empty() {
            return ReadinessReport {
                ready: true,
                checks: HashMap::new(),
            };
        }

        let results = join_all(
            criticals
                .iter()
                .map(|i| run_check(Arc::clone(i), self.check_timeout)),
        )
        .await;

        let mut ready = true;
        let mut checks = HashMap::with_capacity(criticals.len());
        for (indicator, result) in criticals.iter().zip(results) {
            if !result.is_up() {
                ready = false;
                warn!(
                    indicator = indicator.name(),
                    reason = result.message.as_deref().unwrap_or_default(),
                    "Critical dependency down - failing readiness"
                );
            }
            checks.insert(indicator.name().to_string(), result);
        }

        ReadinessReport { ready, checks }
    }

    /// Comprehensive health across all registered indicators
    ///
    /// Runs critical and non-critical indicators concurrently and reduces:
    /// any critical down -> `unhealthy`, else any down -> `degraded`,
    /// else `healthy`. A single non-critical failure never escalates past
    /// `degraded`.
    pub async fn get_health(&self) -> AggregatedHealth {
        let timestamp = Utc::now();
        let uptime_seconds = self.uptime_seconds();

        if self.indicators.is_empty() {
            return AggregatedHealth {
                status: HealthState::Healthy,
                timestamp,
                uptime_seconds,
                checks: HashMap::new(),
            };
        }

        let results = join_all(
            self.indicators
                .iter()
                .map(|i| run_check(Arc::clone(i), self.check_timeout)),
        )
        .await;

        let mut checks = HashMap::with_capacity(self.indicators.len());
        for (indicator, result) in self.indicators.iter().zip(results) {
            checks.insert(
                indicator.name().to_string(),
                IndicatorHealth {
                    status: result.status,
                    latency_ms: result.latency_ms,
                    message: result.message,
                    critical: indicator.critical(),
                },
            );
        }

        AggregatedHealth {
            status: reduce_status(&checks),
            timestamp,
            uptime_seconds,
            checks,
        }
    }
}

/// Run one indicator with timeout and panic containment
///
/// The check runs on its own task so a panicking indicator is isolated
/// from the aggregate call and from its siblings. Every failure mode -
/// error return, timeout, panic - becomes a down result with a non-empty
/// message; this function never fails.
async fn run_check(indicator: Arc<dyn HealthIndicator>, timeout: Duration) -> HealthCheckResult {
    let started = Instant::now();
    let task = tokio::spawn(async move { tokio::time::timeout(timeout, indicator.check()).await });
    let outcome = task.await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(Ok(()))) => HealthCheckResult::up(latency_ms),
        Ok(Ok(Err(e))) => HealthCheckResult::down(latency_ms, e.to_string()),
        Ok(Err(_elapsed)) => HealthCheckResult::down(
            latency_ms,
            format!("health check timed out after {}ms", timeout.as_millis()),
        ),
        Err(e) if e.is_panic() => HealthCheckResult::down(latency_ms, "health check panicked"),
        Err(_) => HealthCheckResult::down(latency_ms, "health check was cancelled"),
    }
}

/// Reduce per-indicator results to the aggregate status
fn reduce_status(checks: &HashMap<String, IndicatorHealth>) -> HealthState {
    let mut status = HealthState::Healthy;
    for check in checks.values() {
        if check.status == CheckStatus::Down {
            if check.critical {
                return HealthState::Unhealthy;
            }
            status = HealthState::Degraded;
        }
    }
    status
}
