//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, route table, compile failures)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_routes_compiled` (gauge): routes in the current table
//! - `gateway_route_refresh_total` (counter): route table invalidations
//! - `gateway_route_compile_failures_total` (counter): dropped definitions
//!
//! # Design Decisions
//! - Labels use the route id, never the raw path, to bound cardinality
//! - Unmatched requests are labelled `route="none"`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
    pub const ROUTES: &str = "gateway_routes_compiled";
    pub const ROUTE_REFRESH_TOTAL: &str = "gateway_route_refresh_total";
    pub const ROUTE_COMPILE_FAILURES_TOTAL: &str = "gateway_route_compile_failures_total";
}

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> bool {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Prometheus metrics endpoint started");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, route_id: &str, start: Instant) {
    counter!(
        names::REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route_id.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(names::REQUEST_DURATION_SECONDS, "route" => route_id.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_routes_compiled(count: usize) {
    gauge!(names::ROUTES).set(count as f64);
}

pub fn record_compile_failure(route_id: &str) {
    counter!(names::ROUTE_COMPILE_FAILURES_TOTAL, "route" => route_id.to_string()).increment(1);
}

pub fn record_refresh() {
    counter!(names::ROUTE_REFRESH_TOTAL).increment(1);
}
