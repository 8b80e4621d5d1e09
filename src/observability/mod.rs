//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (spans carry request_id and connection_id)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, human or JSON)
//!     → Prometheus exporter (optional scrape endpoint)
//! ```
//!
//! # Design Decisions
//! - Request ID is minted per dispatch and flows through the span
//! - Metrics are cheap (atomic increments) and off until installed

pub mod logging;
pub mod metrics;
