//! Prometheus metrics for the Coursecat server.
//!
//! This module provides:
//! - HTTP request metrics (count, latency)
//! - Cache metrics (lookups by outcome, invalidations, failed writes)
//! - Course write counters

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Cache metrics
    pub const CACHE_REQUESTS_TOTAL: &str = "cache_requests_total";
    pub const CACHE_INVALIDATIONS_TOTAL: &str = "cache_invalidations_total";
    pub const CACHE_WRITE_FAILURES_TOTAL: &str = "cache_write_failures_total";

    // Catalog metrics
    pub const COURSE_WRITES_TOTAL: &str = "course_writes_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics renders from the handle
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record an HTTP request. `route` is the matched route template, which keeps
/// label cardinality bounded.
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => route.to_string(),
        "status" => status.to_string(),
        "status_class" => status_class
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a cache lookup: `hit`, `miss`, `unavailable` or `corrupt`.
pub fn record_cache_lookup(view: &'static str, outcome: &'static str) {
    counter!(names::CACHE_REQUESTS_TOTAL, "view" => view, "outcome" => outcome).increment(1);
}

/// Record one write's invalidation fan-out. `complete="false"` means at least
/// one delete or sweep did not reach the cache.
pub fn record_cache_invalidation(complete: bool) {
    counter!(
        names::CACHE_INVALIDATIONS_TOTAL,
        "complete" => if complete { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_cache_write_failure(view: &'static str) {
    counter!(names::CACHE_WRITE_FAILURES_TOTAL, "view" => view).increment(1);
}

/// Record a successful course mutation (`create`, `update`, `delete`, `bulk`).
pub fn record_course_write(op: &'static str) {
    counter!(names::COURSE_WRITES_TOTAL, "op" => op).increment(1);
}
