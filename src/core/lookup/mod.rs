// src/core/lookup/mod.rs

//! Domain intelligence: registration data and the TLS certificate of the
//! audited host. Lookups never fail an audit; they come back empty instead.

pub mod ssl;
pub mod whois;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::error::Elapsed;
use tracing::{info, warn};

use crate::core::models::DomainInfo;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("network error: {0}")]
    Io(#[source] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("lookup not supported for {0}")]
    Unsupported(String),

    #[error("WHOIS lookup failed: {0}")]
    Whois(String),

    #[error("no registration data in the answer for {0}")]
    Unparseable(String),
}

#[async_trait]
pub trait DomainIntel: Send + Sync {
    /// `None` when nothing could be learned about `host`.
    async fn lookup(&self, host: &str) -> Option<DomainInfo>;
}

/// WHOIS plus a direct TLS handshake, both bounded by `timeout`.
pub struct NetworkDomainIntel {
    timeout: Duration,
}

impl NetworkDomainIntel {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DomainIntel for NetworkDomainIntel {
    async fn lookup(&self, host: &str) -> Option<DomainInfo> {
        info!(host, "Starting domain lookup.");
        let (registration, certificate) = tokio::join!(
            tokio::time::timeout(self.timeout, whois::lookup_registration(host)),
            tokio::time::timeout(self.timeout, ssl::fetch_certificate(host, ssl::HTTPS_PORT, self.timeout)),
        );

        let info = DomainInfo {
            registration: settle("whois", host, registration),
            certificate: settle("tls", host, certificate),
        };
        if info.registration.is_none() && info.certificate.is_none() {
            warn!(host, "Domain lookup produced no data.");
            return None;
        }
        Some(info)
    }
}

fn settle<T>(source: &str, host: &str, result: Result<Result<T, LookupError>, Elapsed>) -> Option<T> {
    match result {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(host, source, error = %e, "Domain lookup step failed.");
            None
        }
        Err(_) => {
            warn!(host, source, "Domain lookup step timed out.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settle_keeps_values_and_drops_failures() {
        let ok: Result<Result<u8, LookupError>, Elapsed> = Ok(Ok(7));
        assert_eq!(settle("test", "a.test", ok), Some(7));

        let failed: Result<Result<u8, LookupError>, Elapsed> = Ok(Err(LookupError::Unsupported("a.test".into())));
        assert_eq!(settle("test", "a.test", failed), None);

        let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(settle::<u8>("test", "a.test", Err(elapsed)), None);
    }

    #[tokio::test]
    async fn test_bare_suffix_host_is_unsupported() {
        let err = whois::lookup_registration("co.uk").await.unwrap_err();
        assert!(matches!(err, LookupError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_unresolvable_host_yields_nothing() {
        let intel = NetworkDomainIntel::new(Duration::from_millis(500));
        assert_eq!(intel.lookup("localhost").await, None);
    }
}
