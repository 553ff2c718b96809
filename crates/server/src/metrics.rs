//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the slotrush server:
//! - HTTP request metrics (latency, counts, in-flight)
//! - Task counts per state (collected dynamically)
//! - Scheduler status and booking attempts in flight

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use tracing::warn;

use slotrush_core::TaskFilter;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "slotrush_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("slotrush_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "slotrush_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Task Metrics
// =============================================================================

/// Tasks created through the API.
pub static TASKS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "slotrush_tasks_created_total",
        "Total auto-booking tasks created",
    )
    .unwrap()
});

/// Current number of tasks in each state.
pub static TASKS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("slotrush_tasks_by_state", "Number of tasks in each state"),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Whether the scheduler is running (1) or not (0).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "slotrush_scheduler_running",
        "Whether the booking scheduler is running",
    )
    .unwrap()
});

/// Booking attempts currently in flight.
pub static BOOKINGS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "slotrush_bookings_in_flight",
        "Number of booking attempts currently in flight",
    )
    .unwrap()
});

/// Register all metrics with the given registry.
fn register_metrics(registry: &Registry) {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(TASKS_CREATED_TOTAL.clone()),
        Box::new(TASKS_BY_STATE.clone()),
        Box::new(SCHEDULER_RUNNING.clone()),
        Box::new(BOOKINGS_IN_FLIGHT.clone()),
    ];

    for metric in metrics {
        if let Err(e) = registry.register(metric) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

/// Refresh gauges that reflect current state rather than events.
pub fn collect_dynamic_metrics(state: &AppState) {
    for task_state in ["pending", "triggered", "succeeded", "failed", "cancelled"] {
        let filter = TaskFilter::new().with_state(task_state);
        match state.store().count(&filter) {
            Ok(count) => TASKS_BY_STATE.with_label_values(&[task_state]).set(count),
            Err(e) => warn!("Failed to count {} tasks for metrics: {}", task_state, e),
        }
    }

    match state.scheduler() {
        Some(scheduler) => {
            let status = scheduler.status();
            SCHEDULER_RUNNING.set(status.running as i64);
            BOOKINGS_IN_FLIGHT.set(status.in_flight as i64);
        }
        None => {
            SCHEDULER_RUNNING.set(0);
            BOOKINGS_IN_FLIGHT.set(0);
        }
    }
}

/// Encode the registry contents in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Replace task ids in a path with a placeholder so metric labels stay
/// low-cardinality.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_id_segment(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

// Task ids are UUIDs: 36 chars of hex and hyphens.
fn is_id_segment(segment: &str) -> bool {
    segment.len() == 36
        && segment
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '-')
        && segment.matches('-').count() == 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuid() {
        let path = "/api/v1/tasks/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/tasks/{id}");
    }

    #[test]
    fn test_normalize_path_keeps_plain_segments() {
        assert_eq!(normalize_path("/api/v1/tasks"), "/api/v1/tasks");
        assert_eq!(normalize_path("/api/v1/scheduler/status"), "/api/v1/scheduler/status");
    }

    #[test]
    fn test_encode_metrics_contains_registered_names() {
        TASKS_CREATED_TOTAL.inc();
        let output = encode_metrics().unwrap();
        assert!(output.contains("slotrush_tasks_created_total"));
    }
}
