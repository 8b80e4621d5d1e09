//! Offload worker subsystem.
//!
//! # Data Flow
//! ```text
//! engine thread: Server::dispatch
//!     → endpoint matched
//!     → pool.rs submit (try_acquire slot; fail → job handed back → 503)
//!     → queue → worker thread
//!     → Job::run(DispatchContext::worker(i)) → endpoint handler
//!     → slot released
//! ```
//!
//! # Design Decisions
//! - The pool is built once per server, never resized
//! - Rejection is immediate; nothing is retried or delayed
//! - Context is an explicit value, not a thread-local

pub mod context;
pub mod pool;

pub use context::DispatchContext;
pub use pool::{Job, RejectReason, Rejected, WorkerPool};
