// src/core/lookup/ssl.rs

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};
use x509_parser::prelude::*;

use crate::core::lookup::LookupError;
use crate::core::models::CertificateInfo;

pub const HTTPS_PORT: u16 = 443;

/// Reads the leaf certificate `host` presents on `port`.
///
/// The handshake runs on a blocking thread; `timeout` bounds the connect and
/// every read and write on the socket.
pub async fn fetch_certificate(host: &str, port: u16, timeout: Duration) -> Result<CertificateInfo, LookupError> {
    let host_owned = host.to_string();
    debug!(host, port, "Spawning blocking task for TLS handshake.");
    spawn_blocking(move || read_certificate(&host_owned, port, timeout))
        .await
        .unwrap_or_else(|e| {
            error!(panic = %e, "Blocking TLS task panicked.");
            Err(LookupError::Tls(format!("task panicked: {}", e)))
        })
}

fn read_certificate(host: &str, port: u16, timeout: Duration) -> Result<CertificateInfo, LookupError> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| LookupError::Tls(format!("connector: {}", e)))?;

    let addr = (host, port)
        .to_socket_addrs()
        .map_err(LookupError::Io)?
        .next()
        .ok_or_else(|| LookupError::Unsupported(format!("{} does not resolve", host)))?;
    let stream = TcpStream::connect_timeout(&addr, timeout).map_err(LookupError::Io)?;
    stream.set_read_timeout(Some(timeout)).map_err(LookupError::Io)?;
    stream.set_write_timeout(Some(timeout)).map_err(LookupError::Io)?;

    debug!(host, "Performing TLS handshake.");
    let stream = connector
        .connect(host, stream)
        .map_err(|e| LookupError::Tls(format!("handshake: {}", e)))?;

    let cert = stream
        .peer_certificate()
        .map_err(|e| LookupError::Tls(format!("peer certificate: {}", e)))?
        .ok_or_else(|| LookupError::Tls("no peer certificate".to_string()))?;
    let der = cert
        .to_der()
        .map_err(|e| LookupError::Tls(format!("DER encoding: {}", e)))?;

    let info = certificate_info(&der)?;
    info!(subject = %info.subject_name, issuer = %info.issuer_name, not_after = %info.not_after, "Parsed peer certificate.");
    Ok(info)
}

/// Subject, issuer and validity window of a DER certificate.
pub fn certificate_info(der: &[u8]) -> Result<CertificateInfo, LookupError> {
    let (_, x509) = parse_x509_certificate(der).map_err(|e| LookupError::Tls(format!("X.509 parse: {}", e)))?;
    let validity = x509.validity();
    Ok(CertificateInfo {
        subject_name: x509.subject().to_string(),
        issuer_name: x509.issuer().to_string(),
        not_before: asn1_time_to_chrono_utc(&validity.not_before),
        not_after: asn1_time_to_chrono_utc(&validity.not_after),
    })
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_der_is_a_tls_error() {
        let err = certificate_info(&[0x30, 0x03, 0x01, 0x01]).unwrap_err();
        assert!(matches!(err, LookupError::Tls(_)));
    }

    #[tokio::test]
    async fn test_closed_port_is_an_io_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let err = fetch_certificate("127.0.0.1", port, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LookupError::Io(_)));
    }
}
