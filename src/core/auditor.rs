// src/core/auditor.rs

//! The audit orchestrator.
//!
//! `Pending -> Fetching -> Analyzing -> Aggregating -> Complete`. `Failed` is
//! reachable from `Pending` (invalid URL) and `Fetching` (primary fetch) only.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use strum::Display;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, warn};

use crate::config::{AuditConfig, CategoryWeights};
use crate::core::aggregator::aggregate;
use crate::core::analyzers::rubric::Rubric;
use crate::core::analyzers::{all_analyzers, analyze, AnalysisInput};
use crate::core::error::{AuditError, ConfigError};
use crate::core::fetcher::client::{HttpClient, ReqwestClient};
use crate::core::fetcher::Fetcher;
use crate::core::lookup::{DomainIntel, NetworkDomainIntel};
use crate::core::models::{AuditReport, AuditRequest, AuditSnapshot, Category, CategoryResult, DomainInfo};
use crate::core::page::ParsedPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AuditPhase {
    Pending,
    Fetching,
    Analyzing,
    Aggregating,
    Complete,
    Failed,
}

/// Called on every phase transition.
pub type ProgressCallback = Arc<dyn Fn(AuditPhase) + Send + Sync>;

pub struct Auditor {
    fetcher: Fetcher,
    intel: Arc<dyn DomainIntel>,
    rubric: Arc<Rubric>,
    weights: CategoryWeights,
    lookup_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl Auditor {
    /// An auditor talking to the network through reqwest, WHOIS and TLS.
    pub fn new(config: AuditConfig) -> Result<Self, ConfigError> {
        let client = ReqwestClient::new(&config.user_agent)
            .map_err(|e| ConfigError::Invalid(format!("could not build HTTP client: {}", e)))?;
        let intel = NetworkDomainIntel::new(config.lookup_timeout());
        Self::with_collaborators(config, Arc::new(client), Arc::new(intel))
    }

    pub fn with_collaborators(
        config: AuditConfig,
        client: Arc<dyn HttpClient>,
        intel: Arc<dyn DomainIntel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fetcher: Fetcher::new(client, &config),
            intel,
            rubric: Arc::new(config.rubric()?),
            weights: config.category_weights,
            lookup_timeout: config.lookup_timeout(),
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn enter(&self, phase: AuditPhase) {
        debug!(%phase, "Audit phase changed.");
        if let Some(progress) = &self.progress {
            progress(phase);
        }
    }

    /// Audits `raw_url` end to end. Only an invalid URL or a failed primary
    /// fetch produce an error; everything else ends in a report.
    pub async fn run_audit(&self, raw_url: &str) -> Result<AuditReport, AuditError> {
        self.enter(AuditPhase::Pending);
        let request = match AuditRequest::parse(raw_url) {
            Ok(request) => request,
            Err(e) => {
                error!(url = raw_url, error = %e, "Rejected audit request.");
                self.enter(AuditPhase::Failed);
                return Err(e);
            }
        };
        info!(url = %request.url(), "Starting audit.");

        let (snapshot, page) = self.fetch(&request).await?;
        Ok(self.analyze_snapshot(&request, snapshot, page).await)
    }

    /// Fetches everything an audit looks at, without analysing it.
    pub async fn fetch_snapshot(&self, request: &AuditRequest) -> Result<AuditSnapshot, AuditError> {
        self.fetch(request).await.map(|(snapshot, _)| snapshot)
    }

    /// Scores an already fetched snapshot. Performs no network I/O, so the
    /// same snapshot always yields the same report apart from `generated_at`.
    pub async fn audit_snapshot(&self, request: &AuditRequest, snapshot: AuditSnapshot) -> AuditReport {
        let page = ParsedPage::parse(&snapshot.resource.html);
        self.analyze_snapshot(request, snapshot, page).await
    }

    async fn fetch(&self, request: &AuditRequest) -> Result<(AuditSnapshot, ParsedPage), AuditError> {
        self.enter(AuditPhase::Fetching);
        let resource = match self.fetcher.fetch(request.url()).await {
            Ok(resource) => resource,
            Err(e) => {
                error!(error = %e, "Primary fetch failed; aborting audit.");
                self.enter(AuditPhase::Failed);
                return Err(e.into());
            }
        };

        let page = ParsedPage::parse(&resource.html);
        let host = resource.final_url.host_str().unwrap_or_default().to_string();
        let (aux, domain) = tokio::join!(self.fetcher.fetch_auxiliary(&resource, &page), self.lookup(&host));

        Ok((AuditSnapshot { resource, aux, domain }, page))
    }

    async fn lookup(&self, host: &str) -> Option<DomainInfo> {
        match tokio::time::timeout(self.lookup_timeout, self.intel.lookup(host)).await {
            Ok(info) => info,
            Err(_) => {
                warn!(host, "Domain lookup timed out.");
                None
            }
        }
    }

    async fn analyze_snapshot(&self, request: &AuditRequest, snapshot: AuditSnapshot, page: ParsedPage) -> AuditReport {
        self.enter(AuditPhase::Analyzing);
        let resolved_url = snapshot.resource.final_url.clone();
        let shared = Arc::new((snapshot, page));

        let tasks = all_analyzers().into_iter().map(|analyzer| {
            let category = analyzer.category();
            let shared = Arc::clone(&shared);
            let rubric = Arc::clone(&self.rubric);
            let handle = spawn_blocking(move || {
                let (snapshot, page) = &*shared;
                let input = AnalysisInput {
                    resource: &snapshot.resource,
                    aux: &snapshot.aux,
                    domain: snapshot.domain.as_ref(),
                    page,
                };
                analyze(analyzer.as_ref(), &input, &rubric)
            });
            async move { (category, handle.await) }
        });

        let mut results: BTreeMap<Category, CategoryResult> = BTreeMap::new();
        for (category, joined) in join_all(tasks).await {
            let result = joined.unwrap_or_else(|e| {
                error!(%category, error = %e, "Analyzer task failed.");
                CategoryResult::unavailable(category, e.to_string())
            });
            debug!(%category, score = ?result.score(), findings = result.findings().len(), "Category analyzed.");
            results.insert(category, result);
        }

        self.enter(AuditPhase::Aggregating);
        let (composite, findings) = aggregate(&results, &self.weights);

        let report = AuditReport::new(request.clone(), resolved_url, composite, results, findings, Utc::now());
        info!(composite = ?report.composite_score(), findings = report.findings().len(), "Audit complete.");
        self.enter(AuditPhase::Complete);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::core::analyzers::test_support::{aux, resource};
    use crate::core::error::FailureReason;
    use crate::core::fetcher::client::{HttpRequest, HttpResponse, TransportError, TransportErrorKind};

    struct Offline;

    #[async_trait]
    impl HttpClient for Offline {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::new(TransportErrorKind::Connect, "offline"))
        }
    }

    #[async_trait]
    impl DomainIntel for Offline {
        async fn lookup(&self, _host: &str) -> Option<DomainInfo> {
            None
        }
    }

    fn recording_auditor() -> (Auditor, Arc<Mutex<Vec<AuditPhase>>>) {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let auditor = Auditor::with_collaborators(AuditConfig::default(), Arc::new(Offline), Arc::new(Offline))
            .unwrap()
            .with_progress(Arc::new(move |phase: AuditPhase| sink.lock().unwrap().push(phase)));
        (auditor, phases)
    }

    fn snapshot() -> AuditSnapshot {
        let html = "<html lang=\"en\"><head><title>Snapshot replay of a cached page</title></head>\
                    <body><h1>Cached</h1><p>Some text.</p><a href=\"/about\">About us</a></body></html>";
        AuditSnapshot { resource: resource("https://example.com/", html, &[]), aux: aux(), domain: None }
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_fetching() {
        let (auditor, phases) = recording_auditor();
        let err = auditor.run_audit("example.com").await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::InvalidUrl);
        assert_eq!(*phases.lock().unwrap(), vec![AuditPhase::Pending, AuditPhase::Failed]);
    }

    #[tokio::test]
    async fn test_failed_primary_fetch_is_the_only_fatal_path() {
        let (auditor, phases) = recording_auditor();
        let err = auditor.run_audit("https://example.com/").await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::Connect);
        assert_eq!(
            *phases.lock().unwrap(),
            vec![AuditPhase::Pending, AuditPhase::Fetching, AuditPhase::Failed]
        );
    }

    #[tokio::test]
    async fn test_snapshot_replay_covers_every_category() {
        let (auditor, phases) = recording_auditor();
        let request = AuditRequest::parse("https://example.com/").unwrap();
        let report = auditor.audit_snapshot(&request, snapshot()).await;

        assert_eq!(report.categories().len(), 6);
        for category in Category::all() {
            assert!(report.category(category).unwrap().score().is_available());
        }
        let composite = report.composite_score().unwrap();
        assert!((0.0..=100.0).contains(&composite));
        assert_eq!(
            *phases.lock().unwrap(),
            vec![AuditPhase::Analyzing, AuditPhase::Aggregating, AuditPhase::Complete]
        );
    }

    #[tokio::test]
    async fn test_snapshot_replay_is_deterministic() {
        let (auditor, _) = recording_auditor();
        let request = AuditRequest::parse("https://example.com/").unwrap();
        let first = auditor.audit_snapshot(&request, snapshot()).await;
        let second = auditor.audit_snapshot(&request, snapshot()).await;

        assert_eq!(first.composite_score(), second.composite_score());
        assert_eq!(first.categories(), second.categories());
        assert_eq!(first.findings(), second.findings());
    }
}
