//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define runtime metrics (requests, latency, materialized files, panics)
//! - Expose a Prometheus-compatible scrape endpoint when configured
//!
//! # Metrics
//! - `fn_requests_total` (counter): requests by logical method and status
//! - `fn_request_duration_seconds` (histogram): latency by logical method
//! - `fn_files_materialized_total` (counter): file writes by outcome
//! - `fn_file_bytes_written_total` (counter): bytes written to disk
//! - `fn_panics_total` (counter): panics caught at the request boundary
//!
//! # Design Decisions
//! - Without an installed recorder every update is a no-op
//! - Labels stay low-cardinality: no paths, no function ids

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub mod names {
    pub const REQUESTS_TOTAL: &str = "fn_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "fn_request_duration_seconds";
    pub const FILES_MATERIALIZED_TOTAL: &str = "fn_files_materialized_total";
    pub const FILE_BYTES_WRITTEN_TOTAL: &str = "fn_file_bytes_written_total";
    pub const PANICS_TOTAL: &str = "fn_panics_total";
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        names::REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_file_written(size: u64) {
    counter!(names::FILES_MATERIALIZED_TOTAL, "outcome" => "ok").increment(1);
    counter!(names::FILE_BYTES_WRITTEN_TOTAL).increment(size);
}

pub fn record_file_failed() {
    counter!(names::FILES_MATERIALIZED_TOTAL, "outcome" => "error").increment(1);
}

pub fn record_panic() {
    counter!(names::PANICS_TOTAL).increment(1);
}
