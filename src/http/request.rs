//! A request in flight.
//!
//! # Responsibilities
//! - Own the head, the engine transport and the response state
//! - Lazy body loading and parameter parsing
//! - Expose the connection (and its session) the request arrived on
//!
//! # Design Decisions
//! - A `Request` is moved, never shared: to a worker when offloaded, or
//!   kept on the engine thread otherwise
//! - Body reads stop at `Content-Length`; timeouts retry like sends do

use std::borrow::Cow;
use std::sync::Arc;

use axum::http::{HeaderMap, Method};

use crate::config::Settings;
use crate::connection::Connection;
use crate::engine::{ConnectionId, RequestHead, Transport, TransportError};
use crate::error::DispatchError;
use crate::http::cookie::find_cookie;
use crate::http::params::{parse_urlencoded, WebParameter};
use crate::http::response::{Response, ResponsePhase, ResponseState};
use crate::stream::retry_on_timeout;
use crate::worker::DispatchContext;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub struct Request {
    head: RequestHead,
    path: String,
    query: Option<String>,
    connection: Arc<Connection>,
    transport: Box<dyn Transport>,
    settings: Arc<Settings>,
    response: ResponseState,
    body: Option<Vec<u8>>,
    params: Vec<WebParameter>,
    context: DispatchContext,
}

impl Request {
    pub fn new(
        head: RequestHead,
        connection: Arc<Connection>,
        transport: Box<dyn Transport>,
        settings: Arc<Settings>,
    ) -> Self {
        let (path, query) = match head.uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (head.uri.clone(), None),
        };
        Self {
            head,
            path,
            query,
            connection,
            transport,
            settings,
            response: ResponseState::default(),
            body: None,
            params: Vec::new(),
            context: DispatchContext::engine(),
        }
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Path and query as received.
    pub fn uri(&self) -> &str {
        &self.head.uri
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// First value of `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.head.headers.contains_key(name)
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        let values = self
            .head
            .headers
            .get_all("cookie")
            .iter()
            .filter_map(|value| value.to_str().ok());
        find_cookie(values, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Declared body length; zero when absent or unparseable.
    pub fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with("multipart/"))
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn session_get(&self, key: &str) -> Option<String> {
        self.connection.session_get(key)
    }

    pub fn session_set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.connection.session_set(key, value);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> DispatchContext {
        self.context
    }

    pub(crate) fn set_context(&mut self, context: DispatchContext) {
        self.context = context;
    }

    /// Read the body up to `Content-Length`. Later calls are free.
    pub fn load_body(&mut self) -> Result<&[u8], DispatchError> {
        if self.body.is_none() {
            let body = self.read_body()?;
            self.body = Some(body);
        }
        Ok(self.body.as_deref().unwrap_or_default())
    }

    fn read_body(&mut self) -> Result<Vec<u8>, DispatchError> {
        let expected = self.content_length();
        let limit = self.settings.limits.max_request_body_size;
        if expected > limit {
            return Err(DispatchError::BodyTooLarge {
                limit,
                actual: expected,
            });
        }

        let mut body = vec![0u8; expected];
        let mut read = 0;
        let retries = self.settings.stream.max_send_retries;
        while read < expected {
            let transport = &mut self.transport;
            let buf = &mut body[read..];
            let n = retry_on_timeout(retries, || transport.recv(buf))?;
            if n == 0 {
                tracing::debug!(expected, read, "Body ended before Content-Length");
                return Err(TransportError::Closed.into());
            }
            read += n;
        }
        Ok(body)
    }

    /// Loaded body, if [`load_body`](Self::load_body) has run.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body.as_deref().map(String::from_utf8_lossy)
    }

    /// Parse the query string and, for urlencoded bodies, the loaded body.
    pub fn load_params(&mut self) {
        let mut params = self
            .query
            .as_deref()
            .map(|query| parse_urlencoded(query, false))
            .unwrap_or_default();

        let is_form = self
            .content_type()
            .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
        if is_form {
            if let Some(body) = self.body.as_deref() {
                params.extend(parse_urlencoded(&String::from_utf8_lossy(body), true));
            }
        }
        self.params = params;
    }

    pub fn params(&self) -> &[WebParameter] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&WebParameter> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    pub fn response(&mut self) -> Response<'_> {
        Response::new(&mut self.transport, &mut self.response, &self.settings)
    }

    pub fn response_phase(&self) -> ResponsePhase {
        self.response.phase()
    }

    /// Status, content type and body in one call.
    pub fn reply(
        &mut self,
        code: u16,
        content_type: &str,
        body: impl AsRef<[u8]>,
    ) -> Result<(), DispatchError> {
        let mut response = self.response();
        response.set_status(code)?;
        response.set_content_type(content_type);
        response.send(body)
    }

    pub fn redirect(&mut self, location: &str) -> Result<(), DispatchError> {
        self.response().redirect(location)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("connection", &self.connection.id())
            .field("phase", &self.response.phase())
            .finish()
    }
}
