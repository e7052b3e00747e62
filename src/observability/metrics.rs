//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_calls_total` (counter): logical calls by operation, outcome
//! - `dispatch_call_duration_seconds` (histogram): logical call latency
//! - `dispatch_attempts_total` (counter): attempts by operation, outcome
//! - `dispatch_breaker_state` (gauge): 0=closed or released, 1=half-open, 2=open
//! - `dispatch_endpoints` (gauge): live endpoints per service
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library users opt in
//! - Prometheus exporter only started by the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the end of a logical call.
pub fn record_call(operation: &str, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "dispatch_calls_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "dispatch_call_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one attempt inside a logical call.
pub fn record_attempt(operation: &str, outcome: &'static str) {
    metrics::counter!(
        "dispatch_attempts_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a breaker's state, at creation and on every change.
pub fn record_breaker_state(endpoint: &str, state: CircuitState) {
    metrics::gauge!("dispatch_breaker_state", "endpoint" => endpoint.to_string()).set(state.as_gauge());
}

/// Reset the gauge of a released breaker so no stale Open value lingers.
pub fn clear_breaker_state(endpoint: &str) {
    metrics::gauge!("dispatch_breaker_state", "endpoint" => endpoint.to_string()).set(0.0);
}

/// Record the size of a freshly published snapshot.
pub fn record_endpoint_count(service: &str, count: usize) {
    metrics::gauge!("dispatch_endpoints", "service" => service.to_string()).set(count as f64);
}
