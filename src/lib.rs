//! Embedded HTTP request-dispatch layer.
//!
//! Routes requests from a host engine to registered handlers, offloads
//! long-running endpoint handlers to a bounded worker pool, gates handlers
//! behind Basic/Digest authentication, tracks per-connection sessions and
//! frames chunked and event-stream responses.

pub mod auth;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod status;
pub mod stream;
pub mod worker;

pub use auth::{AuthScheme, Credentials};
pub use config::schema::DispatchConfig;
pub use error::DispatchError;
pub use handler::{EventSource, Handler, WebHandler};
pub use http::{Request, Server};
pub use lifecycle::Shutdown;
