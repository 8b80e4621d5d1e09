//! Streaming output helpers.
//!
//! # Data Flow
//! ```text
//! chunked response:  Response::write(chunk)* → Response::end()
//!                        → Transport::send_chunk (empty chunk terminates)
//!
//! event stream:      Response::open_event_stream() → Transport::send_head
//!                    EventSource::send → event.rs format_event
//!                        → retry.rs → SocketSink::send per client
//! ```

pub mod event;
pub mod retry;

pub use event::{format_event, EVENT_STREAM_HEADERS};
pub use retry::retry_on_timeout;
