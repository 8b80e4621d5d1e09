//! Timeout retry for engine sends.

use crate::engine::TransportError;

/// Run `op` until it succeeds or fails with something other than a timeout.
///
/// `max_retries` bounds the retries after the first attempt; `None` keeps
/// going for as long as the engine reports timeouts.
pub fn retry_on_timeout<T>(
    max_retries: Option<u32>,
    mut op: impl FnMut() -> Result<T, TransportError>,
) -> Result<T, TransportError> {
    let mut retries = 0u32;
    loop {
        match op() {
            Err(TransportError::Timeout) => {
                if max_retries.is_some_and(|max| retries >= max) {
                    tracing::warn!(retries, "Send still timing out, giving up");
                    return Err(TransportError::Timeout);
                }
                retries += 1;
                tracing::trace!(retries, "Send timed out, retrying");
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_until_success() {
        let mut calls = 0;
        let result = retry_on_timeout(None, || {
            calls += 1;
            if calls < 4 {
                Err(TransportError::Timeout)
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 4);
    }

    #[test]
    fn test_bounded_retries() {
        let mut calls = 0;
        let result: Result<(), _> = retry_on_timeout(Some(2), || {
            calls += 1;
            Err(TransportError::Timeout)
        });
        assert!(result.unwrap_err().is_timeout());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_hard_failure_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_on_timeout(None, || {
            calls += 1;
            Err(TransportError::Closed)
        });
        assert!(matches!(result, Err(TransportError::Closed)));
        assert_eq!(calls, 1);
    }
}
