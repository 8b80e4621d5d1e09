//! Server-sent event framing.
//!
//! Frames use CRLF line endings and end with a blank line:
//!
//! ```text
//! retry: 3000\r\n
//! id: 5\r\n
//! event: ping\r\n
//! data: hi\r\n
//! \r\n
//! ```

/// Headers sent on the event-stream handshake, before any default headers.
pub const EVENT_STREAM_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "text/event-stream"),
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
];

/// Build one event frame.
///
/// `retry` is written only when `reconnect` is non-zero and `id` only when
/// `id` is non-zero; `event` and `data` only when present.
pub fn format_event(message: Option<&str>, event: Option<&str>, id: u32, reconnect: u32) -> String {
    let mut frame = String::new();
    if reconnect != 0 {
        frame.push_str(&format!("retry: {reconnect}\r\n"));
    }
    if id != 0 {
        frame.push_str(&format!("id: {id}\r\n"));
    }
    if let Some(event) = event {
        frame.push_str(&format!("event: {event}\r\n"));
    }
    if let Some(message) = message {
        frame.push_str(&format!("data: {message}\r\n"));
    }
    frame.push_str("\r\n");
    frame
}
