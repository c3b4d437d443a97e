//! Indicator contract for pluggable dependency probes
//!
//! Implementations are supplied by the embedding application at startup.
//! The aggregator owns latency measurement and failure containment, so an
//! indicator only has to answer "is this dependency reachable right now".

use async_trait::async_trait;
use serde::Serialize;

/// A named dependency probe
///
/// Critical indicators gate readiness (a failure takes the service out of
/// the traffic pool); non-critical ones only affect the comprehensive
/// health view. Names must be unique across the registered set - the
/// aggregator keys results by name and a duplicate silently overwrites.
///
/// `check()` must be safe to call repeatedly and concurrently. Returning
/// an error is the normal way to report a down dependency; the error's
/// display text becomes the operator-facing `message`.
#[async_trait]
pub trait HealthIndicator: Send + Sync {
    /// Unique identifier used as the key in aggregated results
    fn name(&self) -> &str;

    /// Whether a failure of this dependency should fail readiness
    fn critical(&self) -> bool;

    /// Probe the dependency once
    async fn check(&self) -> anyhow::Result<()>;
}

/// Outcome of a single indicator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
}

/// Result of one indicator check, as reported to probe callers
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub status: CheckStatus,
    pub latency_ms: u64,
    /// Diagnostic text, present exactly when the check is down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheckResult {
    /// A successful check
    pub fn up(latency_ms: u64) -> Self {
        Self {
            status: CheckStatus::Up,
            latency_ms,
            message: None,
        }
    }

    /// A failed check
    ///
    /// The message is operator-facing and must never be empty for a down
    /// result; an empty input is replaced with a generic fallback.
    pub fn down(latency_ms: u64, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = "health check failed".to_string();
        }
        Self {
            status: CheckStatus::Down,
            latency_ms,
            message: Some(message),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == CheckStatus::Up
    }
}
