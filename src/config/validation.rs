//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker count > 0, limits > 0)
//! - Check addresses parse and header names are legal
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: DispatchConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::DispatchConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("listener.max_connections must be at least 1")]
    NoConnections,

    #[error("workers.count must be at least 1 when workers are enabled")]
    NoWorkers,

    #[error("workers.thread_name_prefix must not be empty")]
    EmptyThreadPrefix,

    #[error("limits.max_request_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("limits.max_upload_size ({upload}) is smaller than limits.max_request_body_size ({body})")]
    UploadBelowBody { upload: usize, body: usize },

    #[error("default header `{0}` is not a valid header name")]
    HeaderName(String),

    #[error("default header `{0}` has an invalid value")]
    HeaderValue(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    if config.workers.enabled && config.workers.count == 0 {
        errors.push(ValidationError::NoWorkers);
    }
    if config.workers.thread_name_prefix.is_empty() {
        errors.push(ValidationError::EmptyThreadPrefix);
    }

    if config.limits.max_request_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.limits.max_upload_size < config.limits.max_request_body_size {
        errors.push(ValidationError::UploadBelowBody {
            upload: config.limits.max_upload_size,
            body: config.limits.max_request_body_size,
        });
    }

    for header in &config.default_headers {
        if HeaderName::from_bytes(header.name.as_bytes()).is_err() {
            errors.push(ValidationError::HeaderName(header.name.clone()));
        } else if HeaderValue::from_str(&header.value).is_err() {
            errors.push(ValidationError::HeaderValue(header.name.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
