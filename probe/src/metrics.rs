use crate::models::ProbeResult;
use log::info;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Prometheus metrics for a probe run
pub struct ProbeMetrics {
    registry: Registry,

    // Connection metrics
    pub endpoint_attempts_total: IntCounterVec,
    pub connection_errors_total: IntCounterVec,

    // Query metrics
    pub query_latency: Histogram,

    // Outcome metrics
    pub probe_success: IntGauge,
    pub block_height: IntGauge,
    pub estimated_finality_ms: IntGauge,
}

impl ProbeMetrics {
    /// Create a new metrics collector
    pub fn new() -> MetricsResult<Self> {
        let registry = Registry::new();

        let endpoint_attempts_total = IntCounterVec::new(
            Opts::new("sei_probe_endpoint_attempts_total", "Connection attempts per outcome"),
            &["result"],
        )?;
        registry.register(Box::new(endpoint_attempts_total.clone()))?;

        let connection_errors_total = IntCounterVec::new(
            Opts::new("sei_probe_connection_errors_total", "Connection failures by kind"),
            &["error_type"],
        )?;
        registry.register(Box::new(connection_errors_total.clone()))?;

        let query_latency = Histogram::with_opts(
            HistogramOpts::new("sei_probe_query_latency_seconds", "Round trip of the timed height query")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.4, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(query_latency.clone()))?;

        let probe_success = IntGauge::new("sei_probe_success", "1 if the last probe reached a node, 0 otherwise")?;
        registry.register(Box::new(probe_success.clone()))?;

        let block_height = IntGauge::new("sei_probe_block_height", "Block height reported by the node")?;
        registry.register(Box::new(block_height.clone()))?;

        let estimated_finality_ms = IntGauge::new(
            "sei_probe_estimated_finality_ms",
            "Estimated transaction finality derived from query latency",
        )?;
        registry.register(Box::new(estimated_finality_ms.clone()))?;

        Ok(Self {
            registry,
            endpoint_attempts_total,
            connection_errors_total,
            query_latency,
            probe_success,
            block_height,
            estimated_finality_ms,
        })
    }

    /// Record a connection attempt; `error_type` is set when it failed
    pub fn record_attempt(&self, error_type: Option<&str>) {
        match error_type {
            None => self.endpoint_attempts_total.with_label_values(&["success"]).inc(),
            Some(error_type) => {
                self.endpoint_attempts_total.with_label_values(&["failure"]).inc();
                self.connection_errors_total.with_label_values(&[error_type]).inc();
            }
        }
    }

    /// Record the timed query round trip
    pub fn record_query_latency(&self, latency_secs: f64) {
        self.query_latency.observe(latency_secs);
    }

    /// Update gauges from the final result
    pub fn record_outcome(&self, result: &ProbeResult) {
        self.probe_success.set(i64::from(result.is_success()));
        if let Some(height) = result.block_height() {
            self.block_height.set(i64::try_from(height).unwrap_or(i64::MAX));
        }
        if let Some(finality) = result.estimated_finality_ms() {
            self.estimated_finality_ms.set(i64::try_from(finality).unwrap_or(i64::MAX));
        }
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    /// Write metrics for a node_exporter textfile collector
    pub fn write_to_file(&self, path: &Path) -> MetricsResult<()> {
        // The collector must never observe a partially written file
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.gather())?;
        std::fs::rename(&tmp, path)?;
        info!("Wrote metrics to {}", path.display());
        Ok(())
    }
}
