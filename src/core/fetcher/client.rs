// src/core/fetcher/client.rs

//! The HTTP capability the fetcher is written against, and its reqwest
//! implementation.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::core::error::FetchErrorKind;
use crate::core::models::Headers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// One request. Redirects are never followed by the client.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: Url, timeout: Duration) -> Self {
        Self { method: Method::Get, url, timeout, headers: Vec::new() }
    }

    pub fn head(url: Url, timeout: Duration) -> Self {
        Self { method: Method::Head, url, timeout, headers: Vec::new() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Dns,
    Tls,
    Connect,
    /// The body could not be read, or anything else went wrong.
    Other,
}

impl From<TransportErrorKind> for FetchErrorKind {
    fn from(kind: TransportErrorKind) -> Self {
        match kind {
            TransportErrorKind::Timeout => FetchErrorKind::Timeout,
            TransportErrorKind::Dns => FetchErrorKind::Dns,
            TransportErrorKind::Tls => FetchErrorKind::Tls,
            TransportErrorKind::Connect => FetchErrorKind::Connect,
            TransportErrorKind::Other => FetchErrorKind::Malformed,
        }
    }
}

/// A request that produced no HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `HttpClient` over a shared `reqwest::Client` with redirects disabled.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::new(TransportErrorKind::Other, format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Head => self.client.head(request.url.clone()),
        }
        .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| categorize_reqwest_error(&e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
            .collect::<Headers>();
        let body = response.bytes().await.map_err(|e| categorize_reqwest_error(&e))?.to_vec();
        debug!(url = %request.url, status, bytes = body.len(), "HTTP response received.");

        Ok(HttpResponse { status, headers, body })
    }
}

/// Maps a `reqwest::Error` onto the transport failure kinds.
///
/// DNS and TLS failures both surface as connect errors; they are told apart
/// by the messages of the underlying error chain.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> TransportError {
    let chain = error_chain(error);
    let lower = chain.to_ascii_lowercase();
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if lower.contains("dns error") || lower.contains("failed to lookup address") || lower.contains("name or service not known") {
        TransportErrorKind::Dns
    } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") || lower.contains("handshake") {
        TransportErrorKind::Tls
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, chain)
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reqwest_client_does_not_follow_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&server)
            .await;

        let client = ReqwestClient::new("auditly-test").unwrap();
        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let response = client.send(HttpRequest::get(url, Duration::from_secs(2))).await.unwrap();

        assert_eq!(response.status, 301);
        assert_eq!(response.headers.get("location"), Some("/new"));
    }

    #[tokio::test]
    async fn test_reqwest_client_sends_extra_headers() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(header_exists("accept-encoding"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Encoding", "br"))
            .mount(&server)
            .await;

        let client = ReqwestClient::new("auditly-test").unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let request = HttpRequest::head(url, Duration::from_secs(2)).with_header("Accept-Encoding", "gzip, br");
        let response = client.send(request).await.unwrap();
        assert_eq!(response.headers.get("content-encoding"), Some("br"));
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_reqwest_client_reports_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = ReqwestClient::new("auditly-test").unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = client.send(HttpRequest::get(url, Duration::from_millis(50))).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_connect_error() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let client = ReqwestClient::new("auditly-test").unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let err = client.send(HttpRequest::get(url, Duration::from_secs(2))).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Connect);
    }
}
