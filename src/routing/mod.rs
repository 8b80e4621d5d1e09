//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request head (method, uri)
//!     → router.rs (endpoints in registration order)
//!     → matcher.rs (method AND wildcard pattern)
//!     → matched Endpoint
//!
//! No endpoint matched:
//!     → catch-all handlers in registration order (filter + can_handle)
//!     → fallback handler
//!     → NotFound
//! ```
//!
//! # Design Decisions
//! - Endpoints may be added while the server runs, so the tables sit
//!   behind `RwLock`s
//! - No regex in the hot path (prefix/exact comparison only)
//! - Deterministic: same input always resolves to the same handler

pub mod endpoint;
pub mod matcher;
pub mod router;

pub use endpoint::Endpoint;
pub use matcher::{Matcher, UriPattern};
pub use router::{Resolution, Router};
