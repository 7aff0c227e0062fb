//! Metrics collection and exposition.
//!
//! # Metrics
//! - `busy_in_flight_operations` (gauge): counted operations in flight
//! - `busy_state` (gauge): 1=busy, 0=idle
//! - `busy_operations_total` (counter): operations by outcome (counted, skipped)
//! - `busy_underflow_total` (counter): releases with no matching entry

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_operation(counted: bool) {
    let outcome = if counted { "counted" } else { "skipped" };
    ::metrics::counter!("busy_operations_total", "outcome" => outcome).increment(1);
}

pub fn set_in_flight(active: usize) {
    ::metrics::gauge!("busy_in_flight_operations").set(active as f64);
}

pub fn set_busy(busy: bool) {
    ::metrics::gauge!("busy_state").set(if busy { 1.0 } else { 0.0 });
}

pub fn record_underflow() {
    ::metrics::counter!("busy_underflow_total").increment(1);
}
