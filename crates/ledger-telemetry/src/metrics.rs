//! Prometheus metrics for the ledger.
//!
//! All metrics follow the naming convention: `ledger_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: commands applied, envelope rejections, reconciliation retries
//! - **Gauge**: reconciliation lag in sequences
//! - **Histogram**: request latency per RPC method

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Crate-local metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Ordered commands applied by a replica, by kind and outcome
    pub static ref COMMANDS_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("ledger_state_commands_applied_total", "Ordered commands applied"),
        &["kind", "outcome"]
    ).expect("metric creation failed");

    /// Requests rejected at the envelope boundary, by reason
    pub static ref ENVELOPE_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("ledger_envelope_rejections_total", "Requests rejected before submission"),
        &["reason"]
    ).expect("metric creation failed");

    /// Ordered submissions that did not reach quorum in time
    pub static ref REPLICATION_TIMEOUTS: IntCounter = IntCounter::new(
        "ledger_replication_timeouts_total",
        "Ordered submissions reported as execution-uncertain"
    ).expect("metric creation failed");

    /// Failed projection attempts that were retried
    pub static ref RECONCILE_RETRIES: IntCounter = IntCounter::new(
        "ledger_reconcile_retries_total",
        "Read-store projection retries"
    ).expect("metric creation failed");

    /// Committed sequences not yet projected into the read store
    pub static ref RECONCILE_LAG: IntGauge = IntGauge::new(
        "ledger_reconcile_lag_sequences",
        "Committed sequences awaiting projection"
    ).expect("metric creation failed");

    /// Request latency by RPC method
    pub static ref REQUEST_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "ledger_request_duration_seconds",
            "End-to-end request latency"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("valid buckets")),
        &["method"]
    ).expect("metric creation failed");
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(COMMANDS_APPLIED.clone()),
        Box::new(ENVELOPE_REJECTIONS.clone()),
        Box::new(REPLICATION_TIMEOUTS.clone()),
        Box::new(RECONCILE_RETRIES.clone()),
        Box::new(RECONCILE_LAG.clone()),
        Box::new(REQUEST_LATENCY.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render all metrics in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    register_metrics()?;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

pub fn record_command_applied(kind: &str, outcome: &str) {
    COMMANDS_APPLIED.with_label_values(&[kind, outcome]).inc();
}

pub fn record_envelope_rejection(reason: &str) {
    ENVELOPE_REJECTIONS.with_label_values(&[reason]).inc();
}

pub fn record_replication_timeout() {
    REPLICATION_TIMEOUTS.inc();
}

pub fn record_reconcile_retry() {
    RECONCILE_RETRIES.inc();
}

pub fn set_reconcile_lag(lag: u64) {
    RECONCILE_LAG.set(i64::try_from(lag).unwrap_or(i64::MAX));
}

/// Timer guard; observes the elapsed time for `method` on drop.
pub struct RequestTimer {
    method: &'static str,
    start: std::time::Instant,
}

impl RequestTimer {
    pub fn start(method: &'static str) -> Self {
        Self {
            method,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        REQUEST_LATENCY
            .with_label_values(&[self.method])
            .observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_is_ok() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_counter_increment() {
        let before = COMMANDS_APPLIED
            .with_label_values(&["load_money", "ok"])
            .get();
        record_command_applied("load_money", "ok");
        assert!(COMMANDS_APPLIED.with_label_values(&["load_money", "ok"]).get() > before);
    }

    #[test]
    fn test_gather_contains_metric_names() {
        record_envelope_rejection("replay");
        {
            let _timer = RequestTimer::start("getBalance");
        }
        let text = gather_metrics().unwrap();
        assert!(text.contains("ledger_envelope_rejections_total"));
        assert!(text.contains("ledger_request_duration_seconds"));
    }

    #[test]
    fn test_lag_gauge() {
        set_reconcile_lag(7);
        assert_eq!(RECONCILE_LAG.get(), 7);
    }
}
