//! HTTP Digest authentication (RFC 2617, MD5, `qop=auth`).
//!
//! The nonce and opaque handed out in a challenge are stored in the
//! connection's session and reused for every later challenge on that
//! connection; a response is only accepted if it echoes them back.

use std::collections::HashMap;

use md5::{Digest, Md5};

use crate::auth::{constant_time_eq, Credentials};
use crate::connection::Connection;
use crate::http::Request;

pub const NONCE_KEY: &str = "nonce";
pub const OPAQUE_KEY: &str = "opaque";
pub const REALM_KEY: &str = "realm";

/// Server values bound to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub nonce: String,
    pub opaque: String,
}

impl Challenge {
    pub fn header_value(&self, realm: &str) -> String {
        format!(
            "Digest realm=\"{}\", qop=\"auth\", nonce=\"{}\", opaque=\"{}\"",
            realm, self.nonce, self.opaque
        )
    }
}

/// 128 random bits as lowercase hex.
pub fn random_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Reuse the connection's nonce/opaque, minting them on first use, and
/// record `realm` alongside.
pub fn session_challenge(connection: &Connection, realm: &str) -> Challenge {
    connection.with_session(|session| {
        let existing = session
            .get(NONCE_KEY)
            .zip(session.get(OPAQUE_KEY))
            .map(|(nonce, opaque)| Challenge {
                nonce: nonce.to_string(),
                opaque: opaque.to_string(),
            });

        let challenge = match existing {
            Some(challenge) => challenge,
            None => {
                let challenge = Challenge {
                    nonce: random_token(),
                    opaque: random_token(),
                };
                session.insert(NONCE_KEY, challenge.nonce.clone());
                session.insert(OPAQUE_KEY, challenge.opaque.clone());
                challenge
            }
        };
        session.insert(REALM_KEY, realm);
        challenge
    })
}

/// Parsed `Authorization: Digest ...` header. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResponse {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub opaque: String,
    pub qop: String,
    pub nc: String,
    pub cnonce: String,
    pub algorithm: Option<String>,
}

impl DigestResponse {
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, rest) = header.trim().split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }
        let mut fields = parse_fields(rest)?;
        let mut take = |key: &str| fields.remove(key);

        Some(Self {
            username: take("username")?,
            realm: take("realm")?,
            nonce: take("nonce")?,
            uri: take("uri")?,
            response: take("response")?,
            opaque: take("opaque")?,
            qop: take("qop")?,
            nc: take("nc")?,
            cnonce: take("cnonce")?,
            algorithm: take("algorithm"),
        })
    }

    /// Expected `response` for `method` and `password`.
    pub fn expected(&self, method: &str, password: &str) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", self.username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, self.uri));
        md5_hex(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, self.nonce, self.nc, self.cnonce, self.qop, ha2
        ))
    }
}

/// Split `key=value, key="quoted, value"` pairs. Keys are lowercased.
fn parse_fields(input: &str) -> Option<HashMap<String, String>> {
    let mut fields = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            return Some(fields);
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',' && !c.is_whitespace()) {
            key.push(c.to_ascii_lowercase());
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') || key.is_empty() {
            return None;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next()? {
                    '\\' => value.push(chars.next()?),
                    '"' => break,
                    c => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value.truncate(value.trim_end().len());
        }
        fields.insert(key, value);
    }
}

/// Check a Digest `Authorization` header against the credentials and the
/// values this connection was challenged with.
pub fn verify(header: &str, request: &Request, credentials: &Credentials) -> bool {
    let Some(digest) = DigestResponse::parse(header) else {
        tracing::debug!("Malformed or incomplete Digest header");
        return false;
    };

    if digest.username != credentials.username() || digest.realm != credentials.realm() {
        return false;
    }
    if digest.qop != "auth" {
        return false;
    }
    if digest
        .algorithm
        .as_deref()
        .is_some_and(|algorithm| !algorithm.eq_ignore_ascii_case("md5"))
    {
        return false;
    }

    let connection = request.connection();
    let bound = connection.session_get(NONCE_KEY).as_deref() == Some(digest.nonce.as_str())
        && connection.session_get(OPAQUE_KEY).as_deref() == Some(digest.opaque.as_str())
        && connection.session_get(REALM_KEY).as_deref() == Some(digest.realm.as_str());
    if !bound {
        tracing::debug!(connection_id = %connection.id(), "Digest nonce not issued to this connection");
        return false;
    }
    if digest.uri != request.uri() {
        return false;
    }

    let expected = digest.expected(request.method().as_str(), credentials.password());
    constant_time_eq(expected.as_bytes(), digest.response.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemorySocket;
    use crate::engine::ConnectionId;

    #[test]
    fn test_rfc2617_vector() {
        let digest = DigestResponse {
            username: "Mufasa".into(),
            realm: "testrealm@host.com".into(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".into(),
            uri: "/dir/index.html".into(),
            response: String::new(),
            opaque: "5ccc069c403ebaf9f0171e9517f40e41".into(),
            qop: "auth".into(),
            nc: "00000001".into(),
            cnonce: "0a4f113b".into(),
            algorithm: None,
        };
        assert_eq!(
            digest.expected("GET", "Circle Of Life"),
            "6629fae49393a05397450978507c4ef1"
        );
    }

    #[test]
    fn test_parse_header() {
        let header = r#"Digest username="admin", realm="lab", nonce="n1", uri="/x?a=1,b=2",
            response="abc", opaque="o1", qop=auth, nc=00000001, cnonce="c1""#;
        let digest = DigestResponse::parse(header).unwrap();
        assert_eq!(digest.username, "admin");
        assert_eq!(digest.uri, "/x?a=1,b=2");
        assert_eq!(digest.qop, "auth");
        assert_eq!(digest.nc, "00000001");
        assert_eq!(digest.algorithm, None);
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        assert!(DigestResponse::parse(r#"Digest username="a", nonce="n""#).is_none());
        assert!(DigestResponse::parse("Basic abc").is_none());
        assert!(DigestResponse::parse(r#"Digest username="unterminated"#).is_none());
    }

    #[test]
    fn test_session_challenge_reused_per_connection() {
        let connection = Connection::new(ConnectionId::next(), MemorySocket::new());
        let first = session_challenge(&connection, "lab");
        let second = session_challenge(&connection, "lab");
        assert_eq!(first, second);
        assert_eq!(first.nonce.len(), 32);
        assert_eq!(connection.session_get(REALM_KEY).as_deref(), Some("lab"));

        let other = Connection::new(ConnectionId::next(), MemorySocket::new());
        let fresh = session_challenge(&other, "lab");
        assert_ne!(fresh.nonce, first.nonce);
        assert_ne!(fresh.opaque, first.opaque);
    }
}
