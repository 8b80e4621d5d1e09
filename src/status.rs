//! HTTP status code helpers.
//!
//! Codes are plain `u16` so handlers can send anything in `100..=999`;
//! reason phrases come from `http::StatusCode` with an `Unknown` fallback.

use axum::http::StatusCode;

pub const OK: u16 = 200;
pub const FOUND: u16 = 302;
pub const BAD_REQUEST: u16 = 400;
pub const UNAUTHORIZED: u16 = 401;
pub const NOT_FOUND: u16 = 404;
pub const INTERNAL_SERVER_ERROR: u16 = 500;
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Status class, keyed on the leading digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGroup {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
    Unknown,
}

pub fn group(code: u16) -> StatusGroup {
    match code {
        100..=199 => StatusGroup::Informational,
        200..=299 => StatusGroup::Success,
        300..=399 => StatusGroup::Redirection,
        400..=499 => StatusGroup::ClientError,
        500..=599 => StatusGroup::ServerError,
        _ => StatusGroup::Unknown,
    }
}

pub fn is_informational(code: u16) -> bool {
    group(code) == StatusGroup::Informational
}

pub fn is_success(code: u16) -> bool {
    group(code) == StatusGroup::Success
}

pub fn is_redirection(code: u16) -> bool {
    group(code) == StatusGroup::Redirection
}

pub fn is_client_error(code: u16) -> bool {
    group(code) == StatusGroup::ClientError
}

pub fn is_server_error(code: u16) -> bool {
    group(code) == StatusGroup::ServerError
}

/// Any 4xx or 5xx.
pub fn is_failure(code: u16) -> bool {
    is_client_error(code) || is_server_error(code)
}

/// Canonical reason phrase, or `Unknown`.
pub fn reason(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown")
}

/// Status line as the engine expects it, e.g. `200 OK`.
pub fn status_line(code: u16) -> String {
    format!("{} {}", code, reason(code))
}
