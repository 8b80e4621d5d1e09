//! HTTP Basic authentication.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::auth::constant_time_eq;

pub fn challenge_header(realm: &str) -> String {
    format!("Basic realm=\"{realm}\"")
}

/// Decode `Basic <base64(user:pass)>` into its two halves.
pub fn decode(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let raw = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(raw).ok()?;
    let (username, password) = text.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

pub fn verify(header: &str, username: &str, password: &str) -> bool {
    match decode(header) {
        Some((user, pass)) => {
            let user_ok = constant_time_eq(user.as_bytes(), username.as_bytes());
            let pass_ok = constant_time_eq(pass.as_bytes(), password.as_bytes());
            user_ok & pass_ok
        }
        None => false,
    }
}

/// Header value a client would send for these credentials.
pub fn encode(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_verifies() {
        let header = encode("admin", "p:ss");
        assert_eq!(header, "Basic YWRtaW46cDpzcw==");
        assert!(verify(&header, "admin", "p:ss"));
        assert!(!verify(&header, "admin", "p"));
    }

    #[test]
    fn test_rejects_other_schemes_and_garbage() {
        assert!(!verify("Bearer abc", "admin", "secret"));
        assert!(!verify("Basic !!!notbase64", "admin", "secret"));
        assert!(!verify("Basic", "admin", "secret"));
        assert_eq!(decode("Basic bm9jb2xvbg=="), None);
    }

    #[test]
    fn test_challenge() {
        assert_eq!(challenge_header("lab"), "Basic realm=\"lab\"");
    }
}
