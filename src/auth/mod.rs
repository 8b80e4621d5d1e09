//! Handler authentication.
//!
//! # Data Flow
//! ```text
//! handler chosen by the router
//!     → Credentials configured? (username and password both non-empty)
//!     → verify(request): Basic → basic.rs | Digest → digest.rs
//!     → ok: handler runs
//!     → fail: challenge(request) → 401 + WWW-Authenticate + fail message
//! ```
//!
//! # Design Decisions
//! - A handler only accepts the scheme it was configured with
//! - Digest nonce and opaque live in the connection's session so a client
//!   can answer the challenge on its next request
//! - Secret comparisons are constant time

pub mod basic;
pub mod digest;

use std::fmt;

use crate::error::DispatchError;
use crate::http::Request;
use crate::status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    #[default]
    Basic,
    Digest,
}

/// Credentials guarding a handler.
#[derive(Clone, Default)]
pub struct Credentials {
    username: String,
    password: String,
    scheme: AuthScheme,
    realm: String,
    fail_message: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>, scheme: AuthScheme) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            scheme,
            realm: String::new(),
            fail_message: String::new(),
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(username, password, AuthScheme::Basic)
    }

    pub fn digest(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(username, password, AuthScheme::Digest)
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Body sent with the 401 challenge.
    pub fn with_fail_message(mut self, message: impl Into<String>) -> Self {
        self.fail_message = message.into();
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn fail_message(&self) -> &str {
        &self.fail_message
    }

    /// Authentication applies only when both username and password are set.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Check the request's `Authorization` header.
    pub fn verify(&self, request: &Request) -> bool {
        let Some(header) = request.header("authorization") else {
            return false;
        };
        match self.scheme {
            AuthScheme::Basic => basic::verify(header, &self.username, &self.password),
            AuthScheme::Digest => digest::verify(header, request, self),
        }
    }

    /// Answer with 401 and a challenge for this scheme.
    pub fn challenge(&self, request: &mut Request) -> Result<(), DispatchError> {
        let challenge = match self.scheme {
            AuthScheme::Basic => basic::challenge_header(&self.realm),
            AuthScheme::Digest => {
                digest::session_challenge(request.connection(), &self.realm).header_value(&self.realm)
            }
        };
        tracing::debug!(
            scheme = ?self.scheme,
            realm = %self.realm,
            connection_id = %request.connection_id(),
            "Sending authentication challenge"
        );

        let mut response = request.response();
        response.set_status(status::UNAUTHORIZED)?;
        response.set_content_type("text/html");
        response.set_header("WWW-Authenticate", challenge);
        response.send(self.fail_message.as_bytes())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scheme", &self.scheme)
            .field("realm", &self.realm)
            .finish()
    }
}

/// Compare without short-circuiting on the first differing byte.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
