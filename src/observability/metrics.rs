//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nova_requests_total` (counter): requests by method, status
//! - `nova_request_duration_seconds` (histogram): end-to-end latency
//! - `nova_dispatch_total` (counter): dispatch outcomes
//!   (`matched`, `not_found`, `contract`, `error`)
//! - `nova_throttled_total` (counter): requests rejected by throttling
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels stay low-cardinality: no paths, no client addresses

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics endpoint started");
        }
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to start metrics endpoint"),
    }
}

fn describe() {
    metrics::describe_counter!("nova_requests_total", "Requests handled, by method and status");
    metrics::describe_histogram!(
        "nova_request_duration_seconds",
        metrics::Unit::Seconds,
        "End-to-end request latency"
    );
    metrics::describe_counter!("nova_dispatch_total", "Dispatch outcomes");
    metrics::describe_counter!("nova_throttled_total", "Requests rejected by throttling");
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    metrics::counter!(
        "nova_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("nova_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("nova_dispatch_total", "outcome" => outcome).increment(1);
}

pub fn record_throttled() {
    metrics::counter!("nova_throttled_total").increment(1);
}
