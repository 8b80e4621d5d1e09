//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.
//! Every section is optional; a missing section falls back to its default.

use serde::{Deserialize, Serialize};

/// Root configuration for the dispatch server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    /// Listener configuration for the hyper engine.
    pub listener: ListenerConfig,

    /// Offload worker pool.
    pub workers: WorkerConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Streaming send behaviour.
    pub stream: StreamConfig,

    /// Headers added to every response.
    pub default_headers: Vec<HeaderConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 64,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Offload endpoint requests to the pool. When false, everything runs
    /// on the engine's dispatch thread.
    pub enabled: bool,

    /// Number of worker threads, and therefore of admission slots.
    pub count: usize,

    /// Thread name prefix; workers are named `<prefix>-<index>`.
    pub thread_name_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 8,
            thread_name_prefix: "dispatch-worker".to_string(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest body a web handler will load.
    pub max_request_body_size: usize,

    /// Largest body the engine will buffer at all.
    pub max_upload_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body_size: 16 * 1024,
            max_upload_size: 2 * 1024 * 1024,
        }
    }
}

/// Streaming send configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StreamConfig {
    /// Cap on retries after a send timeout. Unset retries until the
    /// send succeeds or hard-fails.
    pub max_send_retries: Option<u32>,
}

/// A single default response header.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HeaderConfig {
    pub name: String,
    pub value: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Install the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.workers.count, 8);
        assert!(config.workers.enabled);
        assert_eq!(config.limits.max_request_body_size, 16 * 1024);
        assert_eq!(config.limits.max_upload_size, 2 * 1024 * 1024);
        assert_eq!(config.stream.max_send_retries, None);
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn test_partial_toml() {
        let config: DispatchConfig = toml::from_str(
            r#"
            [workers]
            count = 2

            [[default_headers]]
            name = "Access-Control-Allow-Origin"
            value = "*"
            "#,
        )
        .unwrap();

        assert_eq!(config.workers.count, 2);
        assert_eq!(config.workers.thread_name_prefix, "dispatch-worker");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(
            config.default_headers,
            vec![HeaderConfig {
                name: "Access-Control-Allow-Origin".into(),
                value: "*".into()
            }]
        );
    }
}
