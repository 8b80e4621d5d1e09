//! HTTP request-dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Engine: Inbound { connection_id, head, transport }
//!     → server.rs (registry observe, router resolve)
//!     → [worker pool when on the engine thread]
//!     → request.rs (head accessors, body, params, session)
//!     → handler
//!     → response.rs (status, headers, cookies; send / write / event stream)
//!     → Transport primitives
//! ```
//!
//! # Design Decisions
//! - The engine is reached only through `Transport`/`SocketSink`
//! - Response state lives in the request and is released with it
//! - Default headers come from `Settings`, not a process global

pub mod cookie;
pub mod params;
pub mod request;
pub mod response;
pub mod server;

pub use cookie::{Cookie, SameSite};
pub use params::WebParameter;
pub use request::Request;
pub use response::{Response, ResponsePhase};
pub use server::{Outcome, Server};
