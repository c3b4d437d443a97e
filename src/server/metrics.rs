//! Prometheus metrics for probe traffic

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Shared handle to the metrics registry
pub type SharedMetrics = Arc<Metrics>;

/// Registry plus the counters the probe handlers record into
pub struct Metrics {
    registry: Registry,
    probe_requests: IntCounterVec,
}

/// Create the metrics registry with all collectors registered
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    let registry = Registry::new();

    let probe_requests = IntCounterVec::new(
        Opts::new(
            "terva_probe_requests_total",
            "Probe requests served, labelled by endpoint and status code",
        ),
        &["probe", "code"],
    )?;
    registry.register(Box::new(probe_requests.clone()))?;

    Ok(Arc::new(Metrics {
        registry,
        probe_requests,
    }))
}

impl Metrics {
    /// Count one served probe request
    pub fn record_probe(&self, probe: &str, code: u16) {
        self.probe_requests
            .with_label_values(&[probe, &code.to_string()])
            .inc();
    }

    /// Encode all metrics in Prometheus text format for scraping
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
