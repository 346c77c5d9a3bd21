//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

use crate::db::models::PublicationStatus;

/// Metrics prefix for all Scholarpress metrics
pub const METRICS_PREFIX: &str = "scholarpress";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Workflow metrics
    describe_counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Publication status transitions committed"
    );

    describe_counter!(
        format!("{}_reviews_recorded_total", METRICS_PREFIX),
        Unit::Count,
        "Review ledger entries appended"
    );

    describe_counter!(
        format!("{}_publications_created_total", METRICS_PREFIX),
        Unit::Count,
        "Publications created"
    );

    // Storage metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Publication file uploads"
    );

    describe_counter!(
        format!("{}_upload_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Bytes uploaded to object storage"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a committed status change
pub fn record_transition(from: Option<PublicationStatus>, to: PublicationStatus, ledger: bool) {
    let from = from.map(|s| s.as_str()).unwrap_or("new");

    if from == "new" {
        counter!(
            format!("{}_publications_created_total", METRICS_PREFIX),
            "status" => to.as_str()
        )
        .increment(1);
    }

    counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        "from" => from,
        "to" => to.as_str()
    )
    .increment(1);

    if ledger {
        counter!(
            format!("{}_reviews_recorded_total", METRICS_PREFIX),
            "decision" => to.as_str()
        )
        .increment(1);
    }
}

/// Record a file upload attempt
pub fn record_upload(bytes: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    if success {
        counter!(format!("{}_upload_bytes_total", METRICS_PREFIX)).increment(bytes as u64);
    }
}
