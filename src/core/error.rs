// src/core/error.rs

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Why the primary page could not be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    Dns,
    Tls,
    Connect,
    /// The server answered with a 4xx or 5xx status.
    HttpStatus(u16),
    /// More redirects than `max_redirects`, or a redirect without a usable Location.
    RedirectLoop,
    /// The response could not be read or decoded.
    Malformed,
}

/// Fatal failure of the primary fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to fetch {url} ({kind}): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }
}

/// The structured reason carried by a failed audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    InvalidUrl,
    Timeout,
    Dns,
    Tls,
    Connect,
    HttpStatus,
    RedirectLoop,
    Malformed,
}

/// The only errors that reach a caller of `Auditor::run_audit`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl AuditError {
    pub fn reason(&self) -> FailureReason {
        match self {
            AuditError::InvalidUrl(_) => FailureReason::InvalidUrl,
            AuditError::Fetch(e) => match e.kind {
                FetchErrorKind::Timeout => FailureReason::Timeout,
                FetchErrorKind::Dns => FailureReason::Dns,
                FetchErrorKind::Tls => FailureReason::Tls,
                FetchErrorKind::Connect => FailureReason::Connect,
                FetchErrorKind::HttpStatus(_) => FailureReason::HttpStatus,
                FetchErrorKind::RedirectLoop => FailureReason::RedirectLoop,
                FetchErrorKind::Malformed => FailureReason::Malformed,
            },
        }
    }
}

/// Rejected configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_maps_fetch_kinds() {
        let err = AuditError::from(FetchError::new(FetchErrorKind::Timeout, "https://a.test", "deadline"));
        assert_eq!(err.reason(), FailureReason::Timeout);

        let err = AuditError::from(FetchError::new(FetchErrorKind::HttpStatus(503), "https://a.test", "503"));
        assert_eq!(err.reason(), FailureReason::HttpStatus);
    }

    #[test]
    fn test_invalid_url_reason() {
        let err = AuditError::InvalidUrl("nope".to_string());
        assert_eq!(err.reason(), FailureReason::InvalidUrl);
        assert_eq!(err.reason().to_string(), "invalid_url");
    }

    #[test]
    fn test_fetch_error_display_includes_kind() {
        let err = FetchError::new(FetchErrorKind::RedirectLoop, "https://a.test", "6 hops");
        assert_eq!(err.to_string(), "failed to fetch https://a.test (redirect_loop): 6 hops");
    }
}
