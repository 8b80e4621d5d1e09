//! Connection tracking subsystem.
//!
//! # Data Flow
//! ```text
//! engine notification / first request on a socket
//!     → registry.rs (observe: create-if-absent, keyed by ConnectionId)
//!     → handle.rs (Connection: raw sink + lazy Session)
//!     → clients.rs (each handler's own ClientSet<T> of connections it served)
//!
//! Close notification:
//!     every handler releases its client entry (close callbacks fire)
//!     → registry removes the Connection
//! ```
//!
//! # Design Decisions
//! - The registry is the only owner that outlives requests; handlers keep
//!   `Arc<Connection>` clones next to their own per-client state
//! - Sessions are created on first write, never on read
//! - Per-handler state lives in the handler's `ClientSet<T>`, not on the
//!   connection, so a connection never points back at a handler

pub mod clients;
pub mod handle;
pub mod registry;
pub mod session;

pub use clients::{CheckedClient, ClientEntry, ClientSet};
pub use handle::Connection;
pub use registry::ConnectionRegistry;
pub use session::Session;
