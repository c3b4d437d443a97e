//! Tests for health aggregation and status reduction

use super::aggregator::*;
use super::indicator::{CheckStatus, HealthIndicator};
use crate::server::ShutdownCoordinator;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted indicator with a call counter
struct MockIndicator {
    name: &'static str,
    critical: bool,
    healthy: bool,
    message: &'static str,
    delay: Duration,
    panics: bool,
    calls: Arc<AtomicUsize>,
}

impl MockIndicator {
    fn up(name: &'static str, critical: bool) -> Self {
        Self {
            name,
            critical,
            healthy: true,
            message: "",
            delay: Duration::ZERO,
            panics: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn down(name: &'static str, critical: bool, message: &'static str) -> Self {
        Self {
            healthy: false,
            message,
            ..Self::up(name, critical)
        }
    }

    fn panicking(name: &'static str, critical: bool) -> Self {
        Self {
            panics: true,
            ..Self::up(name, critical)
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl HealthIndicator for MockIndicator {
    fn name(&self) -> &str {
        self.name
    }

    fn critical(&self) -> bool {
        self.critical
    }

    async fn check(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("mock indicator panic");
        }
        if self.healthy {
            Ok(())
        } else {
            Err(anyhow::anyhow!("{}", self.message))
        }
    }
}

fn aggregator(indicators: Vec<Arc<dyn HealthIndicator>>) -> HealthAggregator {
    HealthAggregator::new(ShutdownCoordinator::new(), indicators)
}

/// Test the zero-indicator short-circuit
#[tokio::test]
async fn test_get_health_empty_registry_is_healthy() {
    let agg = aggregator(Vec::new());

    let report = agg.get_health().await;

    assert_eq!(report.status, HealthState::Healthy);
    assert!(report.checks.is_empty());
}

/// Test status reduction: all up -> healthy
#[tokio::test]
async fn test_get_health_all_up_is_healthy() {
    let agg = aggregator(vec![
        Arc::new(MockIndicator::up("db", true)),
        Arc::new(MockIndicator::up("cache", false)),
    ]);

    let report = agg.get_health().await;

    assert_eq!(report.status, HealthState::Healthy);
}

/// Test status reduction: non-critical failure alone -> degraded
#[tokio::test]
async fn test_get_health_non_critical_down_is_degraded() {
    let agg = aggregator(vec![
        Arc::new(MockIndicator::up("db", true)),
        Arc::new(MockIndicator::down("cache", false, "timeout")),
    ]);

    let report = agg.get_health().await;

    assert_eq!(report.status, HealthState::Degraded);
}

/// Test status reduction: critical failure overrides to unhealthy
#[tokio::test]
async fn test_get_health_critical_down_is_unhealthy() {
    let agg = aggregator(vec![
        Arc::new(MockIndicator::down("db", true, "Connection refused")),
        Arc::new(MockIndicator::up("cache", false)),
    ]);

    let report = agg.get_health().await;

    assert_eq!(report.status, HealthState::Unhealthy);
    let db = &report.checks["db"];
    assert_eq!(db.status, CheckStatus::Down);
    assert_eq!(db.message.as_deref(), Some("Connection refused"));
}

/// Test that get_health reports every registered indicator with its
/// critical flag, regardless of up/down status
#[tokio::test]
async fn test_get_health_reports_all_indicators() {
    let agg = aggregator(vec![
        Arc::new(MockIndicator::up("db", true)),
        Arc::new(MockIndicator::down("cache", false, "timeout")),
        Arc::new(MockIndicator::up("upstream", false)),
    ]);

    let report = agg.get_health().await;

    assert_eq!(report.checks.len(), 3);
    assert!(report.checks["db"].critical);
    assert!(!report.checks["cache"].critical);
    assert!(!report.checks["upstream"].critical);
}

/// Test that a duplicate name silently overwrites (last wins)
#[tokio::test]
async fn test_get_health_duplicate_name_last_wins() {
    let agg = aggregator(vec![
        Arc::new(MockIndicator::up("db", false)),
        Arc::new(MockIndicator::down("db", true, "replica lagging")),
    ]);

    let report = agg.get_health().await;

    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks["db"].status, CheckStatus::Down);
    assert!(report.checks["db"].critical);
}

/// Test that is_ready runs only critical indicators
#[tokio::test]
async fn test_is_ready_skips_non_critical() {
    let db = MockIndicator::up("db", true);
    let cache = MockIndicator::up("cache", false);
    let db_calls = db.call_counter();
    let cache_calls = cache.call_counter();
    let agg = aggregator(vec![Arc::new(db), Arc::new(cache)]);

    let report = agg.is_ready().await;

    assert!(report.ready);
    assert_eq!(db_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache_calls.load(Ordering::SeqCst), 0);
    assert!(report.checks.contains_key("db"));
    assert!(!report.checks.contains_key("cache"));
}

/// Test that a down critical indicator fails readiness
#[tokio::test]
async fn test_is_ready_critical_down_not_ready() {
    let agg = aggregator(vec![
        Arc::new(MockIndicator::down("db", true, "Connection refused")),
        Arc::new(MockIndicator::up("queue", true)),
    ]);

    let report = agg.is_ready().await;

    assert!(!report.ready);
    // All critical results are reported, not just the failing one
    assert_eq!(report.checks.len(), 2);
    assert_eq!(
        report.checks["db"].message.as_deref(),
        Some("Connection refused")
    );
    assert!(report.checks["queue"].is_up());
}

/// Test that no critical indicators means ready with no checks
#[tokio::test]
async fn test_is_ready_without_critical_indicators() {
    let agg = aggregator(vec![Arc::new(MockIndicator::up("cache", false))]);

    let report = agg.is_ready().await;

    assert!(report.ready);
    assert!(report.checks.is_empty());
}

/// Test the drain short-circuit: no indicator runs once shutdown started
#[tokio::test]
async fn test_is_ready_short_circuits_during_drain() {
    let db = MockIndicator::up("db", true);
    let db_calls = db.call_counter();
    let agg = aggregator(vec![Arc::new(db)]);

    agg.coordinator().start_shutdown();
    let report = agg.is_ready().await;

    assert!(!report.ready);
    assert!(report.checks.is_empty());
    assert_eq!(
        db_calls.load(Ordering::SeqCst),
        0,
        "indicators must not run while draining"
    );
}

/// Test that a panicking indicator becomes a down result and does not
/// disturb its siblings
#[tokio::test]
async fn test_panicking_indicator_is_contained() {
    let agg = aggregator(vec![
        Arc::new(MockIndicator::panicking("db", true)),
        Arc::new(MockIndicator::up("cache", false)),
    ]);

    let report = agg.get_health().await;

    assert_eq!(report.status, HealthState::Unhealthy);
    assert_eq!(report.checks["db"].status, CheckStatus::Down);
    assert_eq!(
        report.checks["db"].message.as_deref(),
        Some("health check panicked")
    );
    assert_eq!(report.checks["cache"].status, CheckStatus::Up);
}

/// Test that a hanging indicator is cut off by the per-check timeout
#[tokio::test(start_paused = true)]
async fn test_hanging_indicator_times_out() {
    let agg = aggregator(vec![Arc::new(
        MockIndicator::up("db", true).with_delay(Duration::from_secs(600)),
    )])
    .with_check_timeout(Duration::from_millis(50));

    let report = agg.is_ready().await;

    assert!(!report.ready);
    let message = report.checks["db"].message.as_deref().unwrap_or_default();
    assert!(
        message.contains("timed out"),
        "unexpected message: {message}"
    );
}

/// Test that indicators run concurrently, not sequentially
///
/// Two checks of 10ms each must complete in about 10ms of (paused)
/// clock time; a sequential run would need 20ms.
#[tokio::test(start_paused = true)]
async fn test_checks_run_concurrently() {
    let agg = aggregator(vec![
        Arc::new(MockIndicator::up("db", true).with_delay(Duration::from_millis(10))),
        Arc::new(MockIndicator::up("cache", false).with_delay(Duration::from_millis(10))),
    ]);

    let started = tokio::time::Instant::now();
    let report = agg.get_health().await;
    let elapsed = started.elapsed();

    assert_eq!(report.status, HealthState::Healthy);
    assert!(
        elapsed < Duration::from_millis(20),
        "checks ran sequentially: {elapsed:?}"
    );
}
