//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter, label `outcome`)
//! - `dispatch_worker_rejections_total` (counter)
//! - `dispatch_workers_busy` (gauge)
//! - `dispatch_connections_active` (gauge)
//! - `dispatch_event_stream_clients` (gauge)
//!
//! Recording is a no-op until a recorder is installed, so library users
//! and tests pay nothing.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "dispatch_requests_total";
pub const WORKER_REJECTIONS_TOTAL: &str = "dispatch_worker_rejections_total";
pub const WORKERS_BUSY: &str = "dispatch_workers_busy";
pub const CONNECTIONS_ACTIVE: &str = "dispatch_connections_active";
pub const EVENT_STREAM_CLIENTS: &str = "dispatch_event_stream_clients";

/// Install the Prometheus recorder with its own HTTP listener.
/// Must run inside a Tokio runtime.
pub fn install_exporter(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;
    tracing::info!(address = %address, "Prometheus exporter listening");
    Ok(())
}

pub fn record_request(outcome: &'static str) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_worker_rejection() {
    counter!(WORKER_REJECTIONS_TOTAL).increment(1);
}

pub fn set_workers_busy(busy: usize) {
    gauge!(WORKERS_BUSY).set(busy as f64);
}

pub fn set_active_connections(count: usize) {
    gauge!(CONNECTIONS_ACTIVE).set(count as f64);
}

pub fn set_event_stream_clients(count: usize) {
    gauge!(EVENT_STREAM_CLIENTS).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_snake_case() {
        for name in [
            REQUESTS_TOTAL,
            WORKER_REJECTIONS_TOTAL,
            WORKERS_BUSY,
            CONNECTIONS_ACTIVE,
            EVENT_STREAM_CLIENTS,
        ] {
            assert!(name.starts_with("dispatch_"));
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("endpoint");
        record_worker_rejection();
        set_workers_busy(3);
    }
}
