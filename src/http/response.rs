//! Response builder over the engine primitives.
//!
//! # Responsibilities
//! - Hold status, content type and headers until the head is committed
//! - Commit exactly once: full body, chunked stream, or event stream
//! - Refuse any write after the response is complete
//!
//! # Design Decisions
//! - Header storage is owned by the response and lives until commit
//! - Default headers go out after Content-Type and before per-response ones
//! - An empty `write` is the terminating chunk, same as `end`

use crate::config::Settings;
use crate::engine::Transport;
use crate::error::DispatchError;
use crate::http::cookie::Cookie;
use crate::status;
use crate::stream::{retry_on_timeout, EVENT_STREAM_HEADERS};

/// Where a response is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePhase {
    /// Nothing sent yet.
    Pending,
    /// Head sent, chunks flowing.
    Chunked,
    /// Head sent for an event stream; further output goes through the
    /// connection's socket.
    EventStream,
    /// Done; nothing more may be written.
    Complete,
}

#[derive(Debug)]
pub(crate) struct ResponseState {
    status: u16,
    content_type: String,
    headers: Vec<(String, String)>,
    phase: ResponsePhase,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: status::OK,
            content_type: "text/html".to_string(),
            headers: Vec::new(),
            phase: ResponsePhase::Pending,
        }
    }
}

impl ResponseState {
    pub(crate) fn phase(&self) -> ResponsePhase {
        self.phase
    }
}

/// Mutable view of a request's response. Obtained from
/// [`Request::response`](crate::http::Request::response).
pub struct Response<'a> {
    transport: &'a mut Box<dyn Transport>,
    state: &'a mut ResponseState,
    settings: &'a Settings,
}

impl<'a> Response<'a> {
    pub(crate) fn new(
        transport: &'a mut Box<dyn Transport>,
        state: &'a mut ResponseState,
        settings: &'a Settings,
    ) -> Self {
        Self {
            transport,
            state,
            settings,
        }
    }

    pub fn status(&self) -> u16 {
        self.state.status
    }

    /// Set the status code. Accepts `100..=999`.
    pub fn set_status(&mut self, code: u16) -> Result<(), DispatchError> {
        self.ensure_pending()?;
        if !(100..=999).contains(&code) {
            return Err(DispatchError::InvalidStatus(code));
        }
        self.state.status = code;
        Ok(())
    }

    pub fn content_type(&self) -> &str {
        &self.state.content_type
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.state.content_type = content_type.into();
    }

    /// Queue a header. Repeated names are all sent.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.state.headers.push((name.into(), value.into()));
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.state.headers
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) {
        self.set_header("Set-Cookie", cookie.to_string());
    }

    pub fn phase(&self) -> ResponsePhase {
        self.state.phase
    }

    pub fn is_complete(&self) -> bool {
        self.state.phase == ResponsePhase::Complete
    }

    /// Send the whole response in one go.
    pub fn send(&mut self, body: impl AsRef<[u8]>) -> Result<(), DispatchError> {
        self.ensure_pending()?;
        self.state.phase = ResponsePhase::Complete;
        self.commit_head()?;
        let (body, transport) = (body.as_ref(), &mut *self.transport);
        retry_on_timeout(self.settings.stream.max_send_retries, || transport.send_body(body))?;
        Ok(())
    }

    /// Send one chunk, committing the head on the first call. An empty
    /// chunk terminates the response.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> Result<(), DispatchError> {
        let chunk = chunk.as_ref();
        if chunk.is_empty() {
            return self.end();
        }
        match self.state.phase {
            ResponsePhase::Complete | ResponsePhase::EventStream => {
                return Err(DispatchError::ResponseFinished)
            }
            ResponsePhase::Pending => {
                self.state.phase = ResponsePhase::Chunked;
                self.commit_head()?;
            }
            ResponsePhase::Chunked => {}
        }
        let transport = &mut *self.transport;
        let sent = retry_on_timeout(self.settings.stream.max_send_retries, || {
            transport.send_chunk(chunk)
        });
        if let Err(err) = sent {
            self.state.phase = ResponsePhase::Complete;
            return Err(err.into());
        }
        Ok(())
    }

    /// Send the terminating chunk. A response with no prior chunks becomes
    /// an empty chunked response.
    pub fn end(&mut self) -> Result<(), DispatchError> {
        match self.state.phase {
            ResponsePhase::Complete | ResponsePhase::EventStream => {
                return Err(DispatchError::ResponseFinished)
            }
            ResponsePhase::Pending => {
                self.state.phase = ResponsePhase::Complete;
                self.commit_head()?;
            }
            ResponsePhase::Chunked => self.state.phase = ResponsePhase::Complete,
        }
        let transport = &mut *self.transport;
        retry_on_timeout(self.settings.stream.max_send_retries, || transport.send_chunk(&[]))?;
        Ok(())
    }

    /// 302 with a `Location` header and an empty body.
    pub fn redirect(&mut self, location: &str) -> Result<(), DispatchError> {
        self.set_status(status::FOUND)?;
        self.set_header("Location", location);
        self.send(b"")
    }

    /// Send `code` with its reason phrase as a plain-text body.
    pub fn send_status(&mut self, code: u16) -> Result<(), DispatchError> {
        self.set_status(code)?;
        self.set_content_type("text/plain");
        self.send(status::reason(code))
    }

    /// Commit an event-stream head. Afterwards the request's response is
    /// finished; events go out through the connection.
    pub fn open_event_stream(&mut self) -> Result<(), DispatchError> {
        self.ensure_pending()?;
        self.state.phase = ResponsePhase::EventStream;

        self.transport.send_status(&status::status_line(status::OK))?;
        for (name, value) in EVENT_STREAM_HEADERS {
            self.transport.set_header(name, value)?;
        }
        for (name, value) in self.settings.default_headers.iter() {
            self.transport.set_header(name, value)?;
        }
        for (name, value) in &self.state.headers {
            self.transport.set_header(name, value)?;
        }

        let transport = &mut *self.transport;
        retry_on_timeout(self.settings.stream.max_send_retries, || transport.send_head())?;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DispatchError> {
        if self.state.phase == ResponsePhase::Pending {
            Ok(())
        } else {
            Err(DispatchError::ResponseFinished)
        }
    }

    fn commit_head(&mut self) -> Result<(), DispatchError> {
        self.transport
            .send_status(&status::status_line(self.state.status))?;
        self.transport
            .set_header("Content-Type", &self.state.content_type)?;
        for (name, value) in self.settings.default_headers.iter() {
            self.transport.set_header(name, value)?;
        }
        for (name, value) in &self.state.headers {
            self.transport.set_header(name, value)?;
        }
        Ok(())
    }
}
