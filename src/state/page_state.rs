//! Fetch error classification
//!
//! A fetcher that cannot successfully return a page classifies the failure
//! into one of the categories enumerated by the error-handling design:
//! transient network errors that earn a retry, and protocol/policy errors
//! that are terminal for the URL.
use std::fmt;

/// The outcome of a single fetch attempt that did not produce a usable page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Non-200 HTTP status (terminal, no retry).
    HttpStatus(u16),
    /// Content-Type did not contain `text/html` (terminal, no retry).
    NotHtml,
    /// Response body exceeded MAX_BYTES (terminal, no retry).
    TooLarge,
    /// Connect or read timeout (transient, retryable).
    Timeout,
    /// TLS/SSL handshake failure (transient, retryable).
    SslError,
    /// Other network failure: DNS, connection reset, refused (transient, retryable).
    NetError,
    /// robots.txt disallowed this URL (terminal, no retry).
    RobotsDenied,
}

impl FetchErrorKind {
    /// Transient network errors are retried (up to the configured retry
    /// limit); protocol/policy errors are terminal for the URL.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::SslError | Self::NetError)
    }

    /// Short machine-readable tag, used in logs and as the `visited.http_status`
    /// fallback for non-HTTP failures.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::HttpStatus(_) => "http_status",
            Self::NotHtml => "not_html",
            Self::TooLarge => "too_large",
            Self::Timeout => "timeout",
            Self::SslError => "ssl_error",
            Self::NetError => "net_error",
            Self::RobotsDenied => "robots_denied",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus(code) => write!(f, "http status {}", code),
            other => write!(f, "{}", other.tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(FetchErrorKind::Timeout.is_retryable());
        assert!(FetchErrorKind::SslError.is_retryable());
        assert!(FetchErrorKind::NetError.is_retryable());
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(!FetchErrorKind::HttpStatus(404).is_retryable());
        assert!(!FetchErrorKind::NotHtml.is_retryable());
        assert!(!FetchErrorKind::TooLarge.is_retryable());
        assert!(!FetchErrorKind::RobotsDenied.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(FetchErrorKind::HttpStatus(500).to_string(), "http status 500");
        assert_eq!(FetchErrorKind::TooLarge.to_string(), "too_large");
    }
}
