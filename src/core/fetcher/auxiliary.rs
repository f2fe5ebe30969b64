// src/core/fetcher/auxiliary.rs

//! Best-effort fetches around the primary page.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use url::Url;

use crate::core::analyzers::links::{discover_links, DiscoveredLink};
use crate::core::fetcher::client::{HttpRequest, HttpResponse, TransportError, TransportErrorKind};
use crate::core::fetcher::Fetcher;
use crate::core::models::{AuxResource, AuxiliaryResources, FetchedResource, LinkCheck, LinkStatus};
use crate::core::page::PageQuery;

const PROBE_ENCODINGS: &str = "gzip, deflate, br";

enum Probe {
    Response(HttpResponse),
    Failed(TransportError),
    TimedOut,
}

async fn within<F>(limit: Duration, request: F) -> Probe
where
    F: Future<Output = Result<HttpResponse, TransportError>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(Ok(response)) => Probe::Response(response),
        Ok(Err(e)) => Probe::Failed(e),
        Err(_) => Probe::TimedOut,
    }
}

fn reason_phrase(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

impl Fetcher {
    /// Fetches robots.txt, probes compression and checks a sample of the
    /// page's links, all concurrently. Never fails.
    pub async fn fetch_auxiliary(&self, resource: &FetchedResource, page: &dyn PageQuery) -> AuxiliaryResources {
        let links: Vec<DiscoveredLink> = discover_links(page, &resource.final_url)
            .into_iter()
            .take(self.link_sample_size)
            .collect();

        let (robots_txt, compression, link_checks) = tokio::join!(
            self.fetch_robots(&resource.final_url),
            self.probe_compression(resource),
            self.check_links(links),
        );

        AuxiliaryResources { robots_txt, compression, link_checks }
    }

    pub(crate) async fn fetch_robots(&self, page_url: &Url) -> AuxResource<String> {
        let robots_url = match page_url.join("/robots.txt") {
            Ok(url) => url,
            Err(e) => return AuxResource::unknown(format!("no robots.txt URL: {}", e)),
        };

        let request = HttpRequest::get(robots_url.clone(), self.aux_timeout);
        let result = match within(self.aux_timeout, self.client.send(request)).await {
            Probe::Response(r) if (200..300).contains(&r.status) => {
                AuxResource::Found { value: String::from_utf8_lossy(&r.body).into_owned() }
            }
            Probe::Response(r) if r.status == 404 || r.status == 410 => AuxResource::Missing,
            Probe::Response(r) => AuxResource::unknown(format!("robots.txt answered with status {}", r.status)),
            Probe::Failed(e) => AuxResource::unknown(format!("robots.txt request failed: {}", e)),
            Probe::TimedOut => AuxResource::unknown("robots.txt timed out"),
        };
        if let AuxResource::Unknown { reason } = &result {
            warn!(url = %robots_url, %reason, "robots.txt unavailable.");
        }
        result
    }

    /// Asks for a compressed response. Reuses the primary response's
    /// encoding when it already had one.
    pub(crate) async fn probe_compression(&self, resource: &FetchedResource) -> AuxResource<String> {
        if let Some(encoding) = resource.headers.get("content-encoding") {
            return AuxResource::Found { value: encoding.to_string() };
        }

        let url = &resource.final_url;
        let head = HttpRequest::head(url.clone(), self.aux_timeout).with_header("Accept-Encoding", PROBE_ENCODINGS);
        let mut probe = within(self.aux_timeout, self.client.send(head)).await;
        if matches!(&probe, Probe::Response(r) if r.status == 405 || r.status == 501) {
            let get = HttpRequest::get(url.clone(), self.aux_timeout).with_header("Accept-Encoding", PROBE_ENCODINGS);
            probe = within(self.aux_timeout, self.client.send(get)).await;
        }

        let result = match probe {
            Probe::Response(r) if r.status >= 400 => {
                AuxResource::unknown(format!("compression probe answered with status {}", r.status))
            }
            Probe::Response(r) => match r.headers.get("content-encoding") {
                Some(encoding) => AuxResource::Found { value: encoding.to_string() },
                None => AuxResource::Missing,
            },
            Probe::Failed(e) => AuxResource::unknown(format!("compression probe failed: {}", e)),
            Probe::TimedOut => AuxResource::unknown("compression probe timed out"),
        };
        if let AuxResource::Unknown { reason } = &result {
            warn!(%url, %reason, "Compression could not be determined.");
        }
        result
    }

    /// Checks links with at most `link_check_concurrency` requests in flight.
    /// Results keep the order of `links`.
    pub(crate) async fn check_links(&self, links: Vec<DiscoveredLink>) -> Vec<LinkCheck> {
        if links.is_empty() {
            return Vec::new();
        }
        debug!(count = links.len(), "Checking sampled links.");

        let checks: Vec<LinkCheck> = stream::iter(links)
            .map(|link| async move {
                let status = self.check_link(&link.url).await;
                LinkCheck { url: link.url, kind: link.kind, status }
            })
            .buffered(self.link_concurrency)
            .collect()
            .await;

        let unknown = checks.iter().filter(|c| matches!(c.status, LinkStatus::Unknown { .. })).count();
        if unknown > 0 {
            warn!(unknown, total = checks.len(), "Some link checks did not finish in time.");
        }
        checks
    }

    async fn check_link(&self, url: &Url) -> LinkStatus {
        let mut probe = within(self.link_timeout, self.client.send(HttpRequest::head(url.clone(), self.link_timeout))).await;
        if matches!(&probe, Probe::Response(r) if r.status == 405 || r.status == 501) {
            probe = within(self.link_timeout, self.client.send(HttpRequest::get(url.clone(), self.link_timeout))).await;
        }

        match probe {
            Probe::Response(r) if r.status < 400 => LinkStatus::Ok { status: r.status },
            Probe::Response(r) => LinkStatus::Broken { status: Some(r.status), reason: reason_phrase(r.status) },
            Probe::Failed(e) if e.kind == TransportErrorKind::Timeout => LinkStatus::Unknown { reason: e.message },
            Probe::Failed(e) => LinkStatus::Broken { status: None, reason: e.message },
            Probe::TimedOut => LinkStatus::Unknown {
                reason: format!("no answer within {}ms", self.link_timeout.as_millis()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::core::analyzers::test_support::resource;
    use crate::core::fetcher::tests::fetcher_with;
    use crate::core::models::LinkKind;
    use crate::core::page::ParsedPage;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_config() -> AuditConfig {
        AuditConfig { aux_fetch_timeout_ms: 300, link_check_timeout_ms: 200, ..AuditConfig::default() }
    }

    fn page_url(server: &MockServer) -> Url {
        Url::parse(&format!("{}/blog/post", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_robots_found_missing_and_unknown() {
        let fetcher = fetcher_with(quick_config());

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
            .mount(&server)
            .await;
        assert_eq!(
            fetcher.fetch_robots(&page_url(&server)).await,
            AuxResource::Found { value: "User-agent: *\nDisallow: /admin".to_string() }
        );

        let empty = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&empty).await;
        assert_eq!(fetcher.fetch_robots(&page_url(&empty)).await, AuxResource::Missing);

        let broken = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&broken).await;
        assert!(matches!(fetcher.fetch_robots(&page_url(&broken)).await, AuxResource::Unknown { .. }));
    }

    #[tokio::test]
    async fn test_slow_robots_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let result = fetcher_with(quick_config()).fetch_robots(&page_url(&server)).await;
        assert!(matches!(result, AuxResource::Unknown { .. }));
    }

    #[tokio::test]
    async fn test_compression_probe() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(header_exists("accept-encoding"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Encoding", "gzip"))
            .mount(&server)
            .await;

        let res = resource(page_url(&server).as_str(), "<html></html>", &[]);
        let result = fetcher_with(quick_config()).probe_compression(&res).await;
        assert_eq!(result, AuxResource::Found { value: "gzip".to_string() });
    }

    #[tokio::test]
    async fn test_compression_probe_falls_back_to_get() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(405)).mount(&server).await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let res = resource(page_url(&server).as_str(), "<html></html>", &[]);
        assert_eq!(fetcher_with(quick_config()).probe_compression(&res).await, AuxResource::Missing);
    }

    #[tokio::test]
    async fn test_link_checks_keep_timeouts_apart_from_broken_links() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/no-head"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/no-head"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let html = r#"<html><body>
            <a href="/ok">Ok</a> <a href="/gone">Gone</a>
            <a href="/slow">Slow</a> <a href="/no-head">No head</a>
        </body></html>"#;
        let res = resource(page_url(&server).as_str(), html, &[]);
        let page = ParsedPage::parse(html);

        let aux = fetcher_with(quick_config()).fetch_auxiliary(&res, &page).await;
        let statuses: Vec<&LinkStatus> = aux.link_checks.iter().map(|c| &c.status).collect();

        assert_eq!(statuses.len(), 4);
        assert_eq!(statuses[0], &LinkStatus::Ok { status: 200 });
        assert_eq!(statuses[1], &LinkStatus::Broken { status: Some(404), reason: "Not Found".to_string() });
        assert!(matches!(statuses[2], LinkStatus::Unknown { .. }));
        assert_eq!(statuses[3], &LinkStatus::Ok { status: 200 });
        assert!(aux.link_checks.iter().all(|c| c.kind == LinkKind::Internal));
    }

    #[tokio::test]
    async fn test_link_sample_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let html = (0..10).map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i)).collect::<String>();
        let res = resource(page_url(&server).as_str(), &html, &[]);
        let page = ParsedPage::parse(&html);

        let config = AuditConfig { link_sample_size: 3, ..quick_config() };
        let aux = fetcher_with(config).fetch_auxiliary(&res, &page).await;
        let paths: Vec<&str> = aux.link_checks.iter().map(|c| c.url.path()).collect();
        assert_eq!(paths, vec!["/p0", "/p1", "/p2"]);
    }
}
