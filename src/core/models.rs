// src/core/models.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use url::Url;

use crate::core::error::AuditError;

/// Longest URL accepted as audit input.
const MAX_URL_LENGTH: usize = 2048;

// --- Core Data Models ---

/// Severity of a finding. Declaration order is the report order:
/// critical findings sort before warnings, warnings before info.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// The six fixed evaluation dimensions. Declaration order is the tie-break
/// order used when findings of equal severity are sorted.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[strum(to_string = "Meta & Headers")]
    Meta,
    #[strum(to_string = "Content Quality")]
    Content,
    #[strum(to_string = "Technical SEO")]
    Technical,
    #[strum(to_string = "Speed")]
    Speed,
    #[strum(to_string = "Security")]
    Security,
    #[strum(to_string = "Link Structure")]
    Links,
}

impl Category {
    /// Every category, in declaration order.
    pub fn all() -> Vec<Category> {
        Category::iter().collect()
    }
}

/// A single observation emitted by an analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity,
            message: message.into(),
            remediation: None,
        }
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}

// --- Request ---

/// The validated input of one audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRequest {
    url: Url,
}

impl AuditRequest {
    /// Validates `raw` as an absolute http(s) URL with a host.
    ///
    /// No scheme is guessed: `example.com` is rejected rather than rewritten.
    pub fn parse(raw: &str) -> Result<Self, AuditError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuditError::InvalidUrl("URL is empty".to_string()));
        }
        if raw.len() > MAX_URL_LENGTH {
            return Err(AuditError::InvalidUrl(format!(
                "URL exceeds {} characters",
                MAX_URL_LENGTH
            )));
        }
        let url = Url::parse(raw).map_err(|e| AuditError::InvalidUrl(format!("{}: {}", raw, e)))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AuditError::InvalidUrl(format!(
                    "unsupported scheme '{}', expected http or https",
                    other
                )));
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(AuditError::InvalidUrl(format!("{} has no host", raw)));
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

// --- Fetched Data ---

/// Response headers keyed by lowercased name. Repeated headers keep every value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value of the header, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.0
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

/// The primary page as retrieved once per audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchedResource {
    pub requested_url: Url,
    pub final_url: Url,
    /// Every URL visited before `final_url`, in order. Empty when no redirect happened.
    pub redirect_chain: Vec<Url>,
    pub status: u16,
    pub headers: Headers,
    pub html: String,
    pub elapsed_ms: u64,
    pub byte_size: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Outcome of an auxiliary fetch. Failures never abort the audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuxResource<T> {
    Found { value: T },
    Missing,
    Unknown { reason: String },
}

impl<T> AuxResource<T> {
    pub fn unknown(reason: impl Into<String>) -> Self {
        AuxResource::Unknown { reason: reason.into() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Internal,
    External,
}

/// Result of a lightweight reachability check on one sampled link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkStatus {
    Ok { status: u16 },
    Broken { status: Option<u16>, reason: String },
    /// The check timed out. Never counted as broken.
    Unknown { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkCheck {
    pub url: Url,
    pub kind: LinkKind,
    pub status: LinkStatus,
}

/// Everything fetched besides the primary page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuxiliaryResources {
    pub robots_txt: AuxResource<String>,
    /// The `content-encoding` the server chose when offered compression.
    pub compression: AuxResource<String>,
    pub link_checks: Vec<LinkCheck>,
}

impl Default for AuxiliaryResources {
    fn default() -> Self {
        Self {
            robots_txt: AuxResource::unknown("not fetched"),
            compression: AuxResource::unknown("not fetched"),
            link_checks: Vec::new(),
        }
    }
}

// --- Domain Intelligence ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub registrar: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject_name: String,
    pub issuer_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Registration and certificate metadata for the audited host.
/// Each half is optional; a lookup that produced neither is reported as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainInfo {
    pub registration: Option<Registration>,
    pub certificate: Option<CertificateInfo>,
}

/// The immutable input every analyzer observes during one audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditSnapshot {
    pub resource: FetchedResource,
    pub aux: AuxiliaryResources,
    pub domain: Option<DomainInfo>,
}

// --- Results ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryScore {
    /// `value` is in [0, 100]; `confidence` is the share of the rubric budget
    /// that could actually be evaluated, in [0, 1].
    Scored { value: f64, confidence: f64 },
    Unavailable,
}

impl CategoryScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            CategoryScore::Scored { value, .. } => Some(*value),
            CategoryScore::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CategoryScore::Scored { .. })
    }
}

/// One analyzer's verdict. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryResult {
    category: Category,
    score: CategoryScore,
    findings: Vec<Finding>,
}

impl CategoryResult {
    pub fn scored(category: Category, value: f64, confidence: f64, findings: Vec<Finding>) -> Self {
        Self {
            category,
            score: CategoryScore::Scored {
                value: round_tenth(value.clamp(0.0, 100.0)),
                confidence: round_hundredth(confidence.clamp(0.0, 1.0)),
            },
            findings,
        }
    }

    /// A category whose analyzer could not run, carrying a critical diagnostic.
    pub fn unavailable(category: Category, diagnostic: impl Into<String>) -> Self {
        Self {
            category,
            score: CategoryScore::Unavailable,
            findings: vec![Finding::new(
                Severity::Critical,
                "ANALYZER_UNAVAILABLE",
                format!("{} could not be evaluated: {}", category, diagnostic.into()),
            )],
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn score(&self) -> CategoryScore {
        self.score
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }
}

/// A finding placed in report order, tagged with its category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportFinding {
    pub category: Category,
    #[serde(flatten)]
    pub finding: Finding,
}

/// The sole artifact returned to callers. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditReport {
    request: AuditRequest,
    resolved_url: Url,
    composite_score: Option<f64>,
    categories: BTreeMap<Category, CategoryResult>,
    findings: Vec<ReportFinding>,
    generated_at: DateTime<Utc>,
}

impl AuditReport {
    pub(crate) fn new(
        request: AuditRequest,
        resolved_url: Url,
        composite_score: Option<f64>,
        categories: BTreeMap<Category, CategoryResult>,
        findings: Vec<ReportFinding>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request,
            resolved_url,
            composite_score,
            categories,
            findings,
            generated_at,
        }
    }

    pub fn request(&self) -> &AuditRequest {
        &self.request
    }

    pub fn resolved_url(&self) -> &Url {
        &self.resolved_url
    }

    /// `None` only when every category is unavailable.
    pub fn composite_score(&self) -> Option<f64> {
        self.composite_score
    }

    pub fn categories(&self) -> &BTreeMap<Category, CategoryResult> {
        &self.categories
    }

    pub fn category(&self, category: Category) -> Option<&CategoryResult> {
        self.categories.get(&category)
    }

    pub fn findings(&self) -> &[ReportFinding] {
        &self.findings
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round_hundredth(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_http_and_https() {
        assert!(AuditRequest::parse("https://example.com").is_ok());
        assert!(AuditRequest::parse("http://example.com/path?q=1").is_ok());
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        let err = AuditRequest::parse("example.com").unwrap_err();
        assert!(matches!(err, AuditError::InvalidUrl(_)));
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(AuditRequest::parse("ftp://example.com").is_err());
        assert!(AuditRequest::parse("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_parse_rejects_overlong_url() {
        let url = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(AuditRequest::parse(&url).is_err());
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let headers: Headers = [("Content-Type", "text/html"), ("set-cookie", "a=1"), ("Set-Cookie", "b=2")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(headers.get_all("SET-COOKIE").len(), 2);
        assert!(!headers.contains("server"));
    }

    #[test]
    fn test_severity_orders_critical_first() {
        let mut severities = vec![Severity::Info, Severity::Critical, Severity::Warning];
        severities.sort();
        assert_eq!(severities, vec![Severity::Critical, Severity::Warning, Severity::Info]);
    }

    #[test]
    fn test_category_result_clamps_score() {
        let result = CategoryResult::scored(Category::Speed, 130.0, 1.5, Vec::new());
        assert_eq!(
            result.score(),
            CategoryScore::Scored { value: 100.0, confidence: 1.0 }
        );
    }

    #[test]
    fn test_unavailable_result_carries_diagnostic() {
        let result = CategoryResult::unavailable(Category::Links, "task panicked");
        assert!(!result.score().is_available());
        assert_eq!(result.findings().len(), 1);
        assert_eq!(result.findings()[0].severity, Severity::Critical);
    }

    #[test]
    fn test_category_serializes_as_snake_case_key() {
        let json = serde_json::to_string(&Category::Technical).unwrap();
        assert_eq!(json, "\"technical\"");
        assert_eq!(Category::Meta.to_string(), "Meta & Headers");
    }
}
