//! Upstream error classification — spec.md §4.3 ("Error classification").

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    Transient,
    RateLimited,
    Permanent,
    Auth,
}

/// Classify a raw HTTP status (+ optional `Retry-After` hint) from the
/// upstream API into one of the four kinds the worker reacts to.
pub fn classify_status(status: u16, retry_after_secs: Option<u64>) -> (UpstreamErrorKind, EngineError) {
    match status {
        401 | 403 => (
            UpstreamErrorKind::Auth,
            EngineError::UpstreamAuth(format!("upstream returned {status}")),
        ),
        429 => (
            UpstreamErrorKind::RateLimited,
            EngineError::RateLimited {
                retry_after_ms: retry_after_secs.unwrap_or(1).saturating_mul(1000),
            },
        ),
        500..=599 => (
            UpstreamErrorKind::Transient,
            EngineError::UpstreamTransient(format!("upstream returned {status}")),
        ),
        _ => (
            UpstreamErrorKind::Permanent,
            EngineError::UpstreamPermanent(format!("upstream returned {status}")),
        ),
    }
}

/// Classify a transport-level failure (connect/timeout errors have no
/// status code at all).
pub fn classify_transport_error(err: &reqwest::Error) -> (UpstreamErrorKind, EngineError) {
    if err.is_timeout() {
        (
            UpstreamErrorKind::Transient,
            EngineError::Timeout(err.to_string()),
        )
    } else {
        (
            UpstreamErrorKind::Transient,
            EngineError::UpstreamTransient(err.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_classify_as_auth() {
        let (kind, _) = classify_status(401, None);
        assert_eq!(kind, UpstreamErrorKind::Auth);
    }

    #[test]
    fn rate_limit_uses_retry_after_hint() {
        let (kind, err) = classify_status(429, Some(2));
        assert_eq!(kind, UpstreamErrorKind::RateLimited);
        match err {
            EngineError::RateLimited { retry_after_ms } => assert_eq!(retry_after_ms, 2000),
            _ => panic!("expected RateLimited"),
        }
    }

    #[test]
    fn rate_limit_defaults_to_one_second() {
        let (_, err) = classify_status(429, None);
        match err {
            EngineError::RateLimited { retry_after_ms } => assert_eq!(retry_after_ms, 1000),
            _ => panic!("expected RateLimited"),
        }
    }

    #[test]
    fn server_errors_are_transient() {
        let (kind, _) = classify_status(503, None);
        assert_eq!(kind, UpstreamErrorKind::Transient);
    }

    #[test]
    fn unmapped_client_errors_are_permanent() {
        let (kind, _) = classify_status(404, None);
        assert_eq!(kind, UpstreamErrorKind::Permanent);
    }
}
