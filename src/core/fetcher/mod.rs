// src/core/fetcher/mod.rs

//! Retrieval of the primary page and of the auxiliary resources around it.
//!
//! The primary fetch is the only fatal step of an audit. Everything fetched
//! afterwards (robots.txt, the compression probe, sampled links) runs under
//! its own shorter timeout and degrades to `Unknown` instead of failing.

pub mod auxiliary;
pub mod client;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, info};
use url::Url;

use crate::config::AuditConfig;
use crate::core::error::{FetchError, FetchErrorKind};
use crate::core::fetcher::client::{HttpClient, HttpRequest, HttpResponse};
use crate::core::models::{FetchedResource, Headers};

const REDIRECT_STATUSES: &[u16] = &[301, 302, 303, 307, 308];

pub struct Fetcher {
    client: Arc<dyn HttpClient>,
    primary_timeout: Duration,
    aux_timeout: Duration,
    link_timeout: Duration,
    max_redirects: usize,
    link_sample_size: usize,
    link_concurrency: usize,
}

impl Fetcher {
    pub fn new(client: Arc<dyn HttpClient>, config: &AuditConfig) -> Self {
        Self {
            client,
            primary_timeout: config.primary_fetch_timeout(),
            aux_timeout: config.aux_fetch_timeout(),
            link_timeout: config.link_check_timeout(),
            max_redirects: config.max_redirects,
            link_sample_size: config.link_sample_size,
            link_concurrency: config.link_check_concurrency.max(1),
        }
    }

    /// Fetches the page at `url`, following at most `max_redirects` redirects.
    ///
    /// The whole exchange, redirects included, shares one deadline of
    /// `primary_fetch_timeout`.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let fetched_at = Utc::now();
        let started = Instant::now();

        let (final_url, redirect_chain, response) =
            match tokio::time::timeout(self.primary_timeout, self.follow_redirects(url)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(FetchError::new(
                        FetchErrorKind::Timeout,
                        url.as_str(),
                        format!("no complete response within {}ms", self.primary_timeout.as_millis()),
                    ))
                }
            };

        if response.status >= 400 {
            return Err(FetchError::new(
                FetchErrorKind::HttpStatus(response.status),
                final_url.as_str(),
                format!("server answered with status {}", response.status),
            ));
        }
        // 300, 304 and friends carry no page to audit.
        if response.status >= 300 {
            return Err(FetchError::new(
                FetchErrorKind::Malformed,
                final_url.as_str(),
                format!("status {} is neither a page nor a followable redirect", response.status),
            ));
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            url = %final_url,
            status = response.status,
            redirects = redirect_chain.len(),
            elapsed_ms,
            "Primary page fetched."
        );

        let html = decode_body(&response.headers, &response.body);
        Ok(FetchedResource {
            requested_url: url.clone(),
            final_url,
            redirect_chain,
            status: response.status,
            headers: response.headers,
            html,
            elapsed_ms,
            byte_size: response.body.len(),
            fetched_at,
        })
    }

    async fn follow_redirects(&self, start: &Url) -> Result<(Url, Vec<Url>, HttpResponse), FetchError> {
        let mut current = start.clone();
        let mut chain: Vec<Url> = Vec::new();

        loop {
            let response = self
                .client
                .send(HttpRequest::get(current.clone(), self.primary_timeout))
                .await
                .map_err(|e| FetchError::new(e.kind.into(), current.as_str(), e.message))?;

            if !REDIRECT_STATUSES.contains(&response.status) {
                return Ok((current, chain, response));
            }

            let Some(location) = response.headers.get("location") else {
                return Err(FetchError::new(
                    FetchErrorKind::RedirectLoop,
                    current.as_str(),
                    format!("status {} without a Location header", response.status),
                ));
            };
            let next = current.join(location.trim()).map_err(|e| {
                FetchError::new(
                    FetchErrorKind::Malformed,
                    current.as_str(),
                    format!("unusable redirect target '{}': {}", location, e),
                )
            })?;
            if !matches!(next.scheme(), "http" | "https") {
                return Err(FetchError::new(
                    FetchErrorKind::Malformed,
                    current.as_str(),
                    format!("redirect to unsupported scheme '{}'", next.scheme()),
                ));
            }

            if chain.len() >= self.max_redirects {
                return Err(FetchError::new(
                    FetchErrorKind::RedirectLoop,
                    start.as_str(),
                    format!("more than {} redirects", self.max_redirects),
                ));
            }
            if next == current || chain.contains(&next) {
                return Err(FetchError::new(
                    FetchErrorKind::RedirectLoop,
                    start.as_str(),
                    format!("redirect cycle back to {}", next),
                ));
            }

            debug!(from = %current, to = %next, status = response.status, "Following redirect.");
            chain.push(current);
            current = next;
        }
    }
}

/// Decodes the body with the charset named in `Content-Type`, defaulting to
/// UTF-8. A byte order mark overrides both.
fn decode_body(headers: &Headers, body: &[u8]) -> String {
    let encoding = headers
        .get("content-type")
        .and_then(|value| {
            value.split(';').skip(1).find_map(|param| {
                let (name, label) = param.split_once('=')?;
                name.trim().eq_ignore_ascii_case("charset").then(|| label.trim().trim_matches('"'))
            })
        })
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}
