//! Metrics collection and exposition.
//!
//! # Metrics
//! - `swimgate_requests_total` (counter): requests by method and status
//! - `swimgate_request_duration_seconds` (histogram): latency distribution
//! - `swimgate_auth_failures_total` (counter): rejected credentials by reason
//! - `swimgate_faults_total` (counter): faults caught by fault isolation
//! - `swimgate_background_tasks` (gauge): outstanding background tasks
//!
//! Without an installed recorder every call is a no-op, so tests need no setup.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("swimgate_requests_total", "method" => method.to_string(), "status" => status)
        .increment(1);
    histogram!("swimgate_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("swimgate_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_fault() {
    counter!("swimgate_faults_total").increment(1);
}

pub fn record_background_tasks(outstanding: u64) {
    gauge!("swimgate_background_tasks").set(outstanding as f64);
}
