//! Prometheus metrics for the webhook
//!
//! All metrics carry the namespace prefix `external_dns_unifi_` and live in
//! a registry owned by the recorder, so nothing touches global state.
//!
//! # Metrics
//!
//! - `dns_operations_total{operation,status}`: finished units of remote work
//! - `dns_operation_duration_seconds{operation}`: duration of those units
//! - `dns_records_managed{record_type}`: managed records seen by the last listing
//! - `dns_changes_applied{change_type}`: size of each phase of incoming change sets
//! - `readiness_cache_hits_total`, `readiness_cache_misses_total`
//! - `readiness_cache_age_seconds`: age of the cached readiness result when served

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use unifi_dns_core::{MetricsRecorder, Operation};

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "external_dns_unifi";

/// Buckets for the per-phase change-set size histogram
const CHANGE_BUCKETS: [f64; 6] = [1.0, 5.0, 10.0, 25.0, 50.0, 100.0];

/// [`MetricsRecorder`] backed by a private Prometheus registry
pub struct PrometheusRecorder {
    registry: Registry,
    operations_total: CounterVec,
    operation_duration_seconds: HistogramVec,
    records_managed: GaugeVec,
    changes_applied: HistogramVec,
    readiness_cache_hits: IntCounter,
    readiness_cache_misses: IntCounter,
    readiness_cache_age: Gauge,
}

impl PrometheusRecorder {
    /// Create every metric and register it
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations_total = CounterVec::new(
            Opts::new("dns_operations_total", "Total number of DNS operations")
                .namespace(METRICS_NAMESPACE),
            &["operation", "status"],
        )?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dns_operation_duration_seconds",
                "Duration of DNS operations in seconds",
            )
            .namespace(METRICS_NAMESPACE),
            &["operation"],
        )?;

        let records_managed = GaugeVec::new(
            Opts::new("dns_records_managed", "Number of DNS records currently managed")
                .namespace(METRICS_NAMESPACE),
            &["record_type"],
        )?;

        let changes_applied = HistogramVec::new(
            HistogramOpts::new(
                "dns_changes_applied",
                "Number of DNS changes applied in a single apply call",
            )
            .namespace(METRICS_NAMESPACE)
            .buckets(CHANGE_BUCKETS.to_vec()),
            &["change_type"],
        )?;

        let readiness_cache_hits = IntCounter::with_opts(
            Opts::new("readiness_cache_hits_total", "Total number of readiness cache hits")
                .namespace(METRICS_NAMESPACE),
        )?;

        let readiness_cache_misses = IntCounter::with_opts(
            Opts::new(
                "readiness_cache_misses_total",
                "Total number of readiness cache misses",
            )
            .namespace(METRICS_NAMESPACE),
        )?;

        let readiness_cache_age = Gauge::with_opts(
            Opts::new(
                "readiness_cache_age_seconds",
                "Age of the readiness cache in seconds",
            )
            .namespace(METRICS_NAMESPACE),
        )?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;
        registry.register(Box::new(records_managed.clone()))?;
        registry.register(Box::new(changes_applied.clone()))?;
        registry.register(Box::new(readiness_cache_hits.clone()))?;
        registry.register(Box::new(readiness_cache_misses.clone()))?;
        registry.register(Box::new(readiness_cache_age.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            operation_duration_seconds,
            records_managed,
            changes_applied,
            readiness_cache_hits,
            readiness_cache_misses,
            readiness_cache_age,
        })
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn encode(&self) -> Result<(String, String), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;

        let body = String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics are not UTF-8: {e}")))?;
        Ok((encoder.format_type().to_string(), body))
    }
}

impl MetricsRecorder for PrometheusRecorder {
    fn record_operation(&self, operation: Operation, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };
        self.operations_total
            .with_label_values(&[operation.as_str(), status])
            .inc();
        self.operation_duration_seconds
            .with_label_values(&[operation.as_str()])
            .observe(duration.as_secs_f64());
    }

    fn set_records_managed(&self, record_type: &str, count: usize) {
        self.records_managed
            .with_label_values(&[record_type])
            .set(count as f64);
    }

    fn observe_changes(&self, operation: Operation, count: usize) {
        self.changes_applied
            .with_label_values(&[operation.as_str()])
            .observe(count as f64);
    }

    fn readiness_cache_hit(&self, age: Duration) {
        self.readiness_cache_hits.inc();
        self.readiness_cache_age.set(age.as_secs_f64());
    }

    fn readiness_cache_miss(&self) {
        self.readiness_cache_misses.inc();
    }
}
