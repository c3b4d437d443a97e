//! Dependency health checking
//!
//! An embedding application registers [`HealthIndicator`] implementations
//! for each external dependency it cares about (database, cache, upstream
//! API). The [`HealthAggregator`] runs them concurrently and reduces the
//! results into the readiness and health answers the probe endpoints serve.

pub mod aggregator;
pub mod indicator;

pub use aggregator::{
    AggregatedHealth, HealthAggregator, HealthState, IndicatorHealth, ReadinessReport,
};
pub use indicator::{CheckStatus, HealthCheckResult, HealthIndicator};

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod aggregator_tests;
