//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (requests by outcome, latency, bytes saved)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by outcome
//! - `relay_request_duration_seconds` (histogram): latency by outcome
//! - `relay_bytes_saved_total` (counter): declared minus encoded bytes,
//!   only for compressions that actually saved something
//! - `relay_bytes_inflated_total` (counter): bytes added by compressions
//!   that grew the image
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Outcome label values: compressed, bypassed, redirected, rejected,
//!   failed, landing

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request.
pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("relay_requests_total", "outcome" => outcome).increment(1);
    histogram!("relay_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record the size difference of one compression.
pub fn record_bytes_saved(saved: i64) {
    if saved >= 0 {
        counter!("relay_bytes_saved_total").increment(saved as u64);
    } else {
        counter!("relay_bytes_inflated_total").increment(saved.unsigned_abs());
    }
}
