//! Hyper host engine.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, max_connections permit, ConnectionId)
//!     → connection.rs (open notification, close notification on drop)
//!     → serve.rs (hyper http1 connection, body buffering)
//!     → exchange.rs (HyperTransport per request, HyperSocket per socket)
//!     → Server::dispatch on a blocking thread
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Dispatch is blocking, so it never runs on a runtime worker
//! - No TLS: terminate it in front of this engine

pub mod connection;
pub mod exchange;
pub mod listener;
pub mod serve;

pub use listener::{Listener, ListenerError};
pub use serve::serve;
