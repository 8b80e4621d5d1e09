//! Error taxonomy for the dispatch layer.
//!
//! # Design Decisions
//! - One enum for everything a handler or the router can surface
//! - Each kind maps to the status code the router answers with
//! - Transport failures keep the engine's own error as the source

use axum::http::StatusCode;
use thiserror::Error;

use crate::engine::TransportError;

/// Errors produced while dispatching or answering a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every worker slot was taken when the request arrived.
    #[error("no workers available")]
    AdmissionRejected,

    /// The matched endpoint carries no handler.
    #[error("no handler registered")]
    NoHandler,

    /// Nothing accepted the request.
    #[error("no endpoint or handler accepted the request")]
    NotFound,

    /// Credentials were missing or did not verify.
    #[error("authentication required")]
    AuthenticationRequired,

    /// A write was attempted after the response completed.
    #[error("response already finished")]
    ResponseFinished,

    #[error("request body of {actual} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize, actual: usize },

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Status code the router replies with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::AdmissionRejected => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::NoHandler => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            DispatchError::BodyTooLarge { .. } => StatusCode::BAD_REQUEST,
            DispatchError::ResponseFinished
            | DispatchError::InvalidStatus(_)
            | DispatchError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the engine itself failed, as opposed to a routing outcome.
    pub fn is_transport(&self) -> bool {
        matches!(self, DispatchError::Transport(_))
    }
}
