//! Error classification for LLM gateway failures.
//!
//! The pipeline never retries a failed request against the same agent, but
//! the error kind is still recorded so that invocation failures in the
//! result envelope say whether the upstream was down, rate limiting, or
//! rejecting the request outright.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Broad category of an LLM request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connection failure, DNS error, or request timeout.
    Network,
    /// HTTP 429 from the upstream provider.
    RateLimited,
    /// HTTP 5xx from the upstream provider.
    ServerError,
    /// HTTP 4xx other than 429 (bad request, auth failure, unknown model).
    ClientError,
    /// Response body could not be parsed.
    ParseError,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmErrorKind::Network => "network",
            LlmErrorKind::RateLimited => "rate_limited",
            LlmErrorKind::ServerError => "server_error",
            LlmErrorKind::ClientError => "client_error",
            LlmErrorKind::ParseError => "parse_error",
        };
        f.write_str(s)
    }
}

/// Classify an HTTP status code into an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500..=599 => LlmErrorKind::ServerError,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// An LLM gateway failure with its classification.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Retry-After hint from the provider, surfaced for diagnostics only.
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Network,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            kind: LlmErrorKind::RateLimited,
            message: message.into(),
            status: Some(429),
            retry_after,
        }
    }

    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ServerError,
            message: message.into(),
            status: Some(status),
            retry_after: None,
        }
    }

    pub fn client_error(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ClientError,
            message: message.into(),
            status: Some(status),
            retry_after: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(401), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(418), LlmErrorKind::ClientError);
    }

    #[test]
    fn error_display_includes_kind() {
        let err = LlmError::rate_limited("slow down", Some(Duration::from_secs(5)));
        assert!(err.to_string().starts_with("rate_limited"));
    }
}
