//! In-memory engine.
//!
//! Records every primitive the dispatch layer emits so tests can assert on
//! exact status lines, headers and bytes. Timeouts and hard failures can be
//! injected on both the per-request transport and the connection sink.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{SocketSink, Transport, TransportError};

/// Everything a [`MemoryTransport`] was asked to emit.
#[derive(Debug, Default, Clone)]
pub struct Recording {
    pub status: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Chunks in order, including the terminating empty chunk.
    pub chunks: Vec<Vec<u8>>,
    pub head_sent: bool,
    pub completed: bool,
}

impl Recording {
    pub fn status_code(&self) -> Option<u16> {
        self.status
            .as_deref()
            .and_then(|line| line.split_whitespace().next())
            .and_then(|code| code.parse().ok())
    }

    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Body plus all chunks, lossily decoded.
    pub fn text(&self) -> String {
        let mut bytes = self.body.clone();
        for chunk in &self.chunks {
            bytes.extend_from_slice(chunk);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Connection-level sink that records raw bytes.
#[derive(Debug, Default)]
pub struct MemorySocket {
    wire: Mutex<Vec<u8>>,
    pending_timeouts: AtomicUsize,
    attempts: AtomicUsize,
    broken: AtomicBool,
    closed: AtomicBool,
}

impl MemorySocket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Raw bytes written so far, including any head sent via `send_head`.
    pub fn wire(&self) -> Vec<u8> {
        self.wire.lock().clone()
    }

    pub fn wire_text(&self) -> String {
        String::from_utf8_lossy(&self.wire.lock()).into_owned()
    }

    pub fn clear_wire(&self) {
        self.wire.lock().clear();
    }

    /// The next `count` sends report a timeout.
    pub fn inject_timeouts(&self, count: usize) {
        self.pending_timeouts.store(count, Ordering::SeqCst);
    }

    /// Every later send fails hard.
    pub fn break_pipe(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Number of `send` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn write_raw(&self, bytes: &[u8]) {
        self.wire.lock().extend_from_slice(bytes);
    }
}

impl SocketSink for MemorySocket {
    fn send(&self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::Failure(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected failure",
            )));
        }
        let timed_out = self
            .pending_timeouts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if timed_out {
            return Err(TransportError::Timeout);
        }
        self.write_raw(bytes);
        Ok(bytes.len())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Per-request transport backed by a shared [`Recording`].
pub struct MemoryTransport {
    recording: Arc<Mutex<Recording>>,
    socket: Arc<MemorySocket>,
    body: Vec<u8>,
    read_pos: usize,
    recv_timeouts: usize,
    send_timeouts: usize,
}

impl MemoryTransport {
    /// Build a transport for a request on `socket`. The returned handle
    /// stays readable after the transport is consumed.
    pub fn new(socket: Arc<MemorySocket>) -> (Self, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        let transport = Self {
            recording: Arc::clone(&recording),
            socket,
            body: Vec::new(),
            read_pos: 0,
            recv_timeouts: 0,
            send_timeouts: 0,
        };
        (transport, recording)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// The next `count` reads report a timeout.
    pub fn with_recv_timeouts(mut self, count: usize) -> Self {
        self.recv_timeouts = count;
        self
    }

    /// The next `count` body or chunk sends report a timeout.
    pub fn with_send_timeouts(mut self, count: usize) -> Self {
        self.send_timeouts = count;
        self
    }

    fn take_send_timeout(&mut self) -> Result<(), TransportError> {
        if self.send_timeouts > 0 {
            self.send_timeouts -= 1;
            return Err(TransportError::Timeout);
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn send_status(&mut self, line: &str) -> Result<(), TransportError> {
        self.recording.lock().status = Some(line.to_string());
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        self.recording
            .lock()
            .headers
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn send_body(&mut self, body: &[u8]) -> Result<(), TransportError> {
        self.take_send_timeout()?;
        let mut recording = self.recording.lock();
        if recording.completed {
            return Err(TransportError::Closed);
        }
        recording.head_sent = true;
        recording.body.extend_from_slice(body);
        recording.completed = true;
        Ok(())
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        self.take_send_timeout()?;
        let mut recording = self.recording.lock();
        if recording.completed {
            return Err(TransportError::Closed);
        }
        recording.head_sent = true;
        recording.chunks.push(chunk.to_vec());
        if chunk.is_empty() {
            recording.completed = true;
        }
        Ok(())
    }

    fn send_head(&mut self) -> Result<(), TransportError> {
        let mut recording = self.recording.lock();
        recording.head_sent = true;

        let mut head = format!(
            "HTTP/1.1 {}\r\n",
            recording.status.as_deref().unwrap_or("200 OK")
        );
        for (name, value) in &recording.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");
        self.socket.write_raw(head.as_bytes());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.recv_timeouts > 0 {
            self.recv_timeouts -= 1;
            return Err(TransportError::Timeout);
        }
        let remaining = &self.body[self.read_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.read_pos += n;
        Ok(n)
    }

    fn socket(&self) -> Arc<dyn SocketSink> {
        self.socket.clone()
    }
}
