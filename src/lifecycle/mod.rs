//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (dispatchd main):
//!     Load config → Validate → Logging/metrics → Server::start (worker pool)
//!     → Bind listener → serve
//!
//! Shutdown:
//!     Ctrl+C (signals.rs) → Shutdown::trigger (shutdown.rs)
//!     → accept loop stops, connections drain → Server::stop
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then workers, then the listener
//! - Draining has a deadline; `Server::stop` runs regardless

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_ctrl_c;
