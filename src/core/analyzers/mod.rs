// src/core/analyzers/mod.rs

//! The six category analyzers and the rubric scoring they share.
//!
//! An analyzer is a fixed list of checks. Each check looks at the shared,
//! immutable audit input and returns a verdict; it never performs I/O. The
//! points a verdict costs come from the `Rubric`, and the wording and severity
//! of the resulting finding come from the knowledge base. `analyze` is total:
//! a check that panics is contained and reported as a critical finding.

pub mod content;
pub mod fingerprint;
pub mod links;
pub mod meta;
pub mod robots;
pub mod rubric;
pub mod security;
pub mod speed;
pub mod technical;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::core::knowledge_base::get_finding_detail;
use crate::core::models::{
    AuxiliaryResources, Category, CategoryResult, DomainInfo, FetchedResource, Finding, Severity,
};
use crate::core::page::PageQuery;
use self::rubric::Rubric;

/// Finding code for a check that crashed while evaluating.
pub const INTERNAL_ERROR_CODE: &str = "ANALYZER_INTERNAL_ERROR";

/// Everything an analyzer may look at. All of it is read-only.
#[derive(Clone, Copy)]
pub struct AnalysisInput<'a> {
    pub resource: &'a FetchedResource,
    pub aux: &'a AuxiliaryResources,
    pub domain: Option<&'a DomainInfo>,
    pub page: &'a dyn PageQuery,
}

/// How a single check went.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Pass,
    Fail,
    /// Loses the given fraction (0..=1) of the check's points.
    Partial(f64),
    /// Could not be evaluated. No points lost, confidence reduced.
    Unknown,
    /// Does not apply to this page. Excluded from the budget.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub verdict: Verdict,
    /// Knowledge-base code of the finding raised by a failing verdict.
    pub code: Option<&'static str>,
    pub message: String,
}

impl CheckOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self { verdict: Verdict::Pass, code: None, message: message.into() }
    }

    pub fn fail(code: &'static str, message: impl Into<String>) -> Self {
        Self { verdict: Verdict::Fail, code: Some(code), message: message.into() }
    }

    /// A failure costing `fraction` of the check's points. A fraction of zero
    /// or below is a pass.
    pub fn partial(code: &'static str, fraction: f64, message: impl Into<String>) -> Self {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 1.0 };
        if fraction <= 0.0 {
            return Self::pass(message);
        }
        Self { verdict: Verdict::Partial(fraction), code: Some(code), message: message.into() }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self { verdict: Verdict::Unknown, code: None, message: message.into() }
    }

    pub fn not_applicable() -> Self {
        Self { verdict: Verdict::NotApplicable, code: None, message: String::new() }
    }

    fn internal_error(message: String) -> Self {
        Self { verdict: Verdict::Fail, code: Some(INTERNAL_ERROR_CODE), message }
    }

    fn lost_fraction(&self) -> f64 {
        match self.verdict {
            Verdict::Fail => 1.0,
            Verdict::Partial(f) => f,
            Verdict::Pass | Verdict::Unknown | Verdict::NotApplicable => 0.0,
        }
    }
}

pub type CheckFn = fn(&AnalysisInput<'_>) -> CheckOutcome;

/// A rubric check: its id in the rubric and the function evaluating it.
pub struct Check {
    pub id: &'static str,
    pub run: CheckFn,
}

/// Trait implemented by all category analyzers.
pub trait Analyzer: Send + Sync {
    fn category(&self) -> Category;

    /// The rubric checks, in the order their findings are reported.
    fn checks(&self) -> &'static [Check];

    /// Unscored informational findings appended after the checks.
    fn observations(&self, _input: &AnalysisInput<'_>) -> Vec<Finding> {
        Vec::new()
    }
}

/// All six analyzers in category declaration order.
pub fn all_analyzers() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(meta::MetaAnalyzer),
        Box::new(content::ContentAnalyzer),
        Box::new(technical::TechnicalAnalyzer),
        Box::new(speed::SpeedAnalyzer),
        Box::new(security::SecurityAnalyzer),
        Box::new(links::LinksAnalyzer),
    ]
}

/// Runs every check of `analyzer` and scores the category.
///
/// Score is 100 minus the points lost, clamped to [0, 100]. Confidence is the
/// share of applicable points whose checks could be evaluated.
pub fn analyze(analyzer: &dyn Analyzer, input: &AnalysisInput<'_>, rubric: &Rubric) -> CategoryResult {
    let category = analyzer.category();
    let mut findings = Vec::new();
    let mut applicable = 0.0;
    let mut evaluated = 0.0;
    let mut lost = 0.0;

    for check in analyzer.checks() {
        let points = f64::from(rubric.points(check.id));
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| (check.run)(input))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(check = check.id, %reason, "Check panicked; scoring it as failed.");
                CheckOutcome::internal_error(format!("Check {} failed internally: {}", check.id, reason))
            }
        };
        debug!(check = check.id, verdict = ?outcome.verdict, "Check evaluated.");

        if outcome.verdict != Verdict::NotApplicable {
            applicable += points;
        }
        if !matches!(outcome.verdict, Verdict::NotApplicable | Verdict::Unknown) {
            evaluated += points;
        }
        lost += points * outcome.lost_fraction();

        if let Some(finding) = to_finding(check.id, outcome) {
            findings.push(finding);
        }
    }

    match panic::catch_unwind(AssertUnwindSafe(|| analyzer.observations(input))) {
        Ok(observations) => findings.extend(observations),
        Err(payload) => {
            warn!(%category, reason = %panic_message(payload.as_ref()), "Observations panicked; skipping them.");
        }
    }

    let confidence = if applicable > 0.0 { evaluated / applicable } else { 1.0 };
    CategoryResult::scored(category, 100.0 - lost, confidence, findings)
}

fn to_finding(check_id: &str, outcome: CheckOutcome) -> Option<Finding> {
    match (outcome.verdict, outcome.code) {
        (Verdict::NotApplicable, _) => None,
        (Verdict::Fail | Verdict::Partial(_), Some(INTERNAL_ERROR_CODE)) => {
            Some(Finding::new(Severity::Critical, INTERNAL_ERROR_CODE, outcome.message))
        }
        (Verdict::Fail | Verdict::Partial(_), Some(code)) => Some(match get_finding_detail(code) {
            Some(detail) => Finding::new(detail.severity, code, outcome.message).with_remediation(detail.remediation),
            None => {
                warn!(code, "Finding code missing from the knowledge base.");
                Finding::new(Severity::Warning, code, outcome.message)
            }
        }),
        _ if outcome.message.is_empty() => None,
        _ => Some(Finding::new(Severity::Info, check_id, outcome.message)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};
    use url::Url;

    use crate::core::models::{AuxiliaryResources, FetchedResource, Headers};

    /// A 200 response for `url` fetched in 150ms on 2024-06-01.
    pub fn resource(url: &str, html: &str, headers: &[(&str, &str)]) -> FetchedResource {
        let url = Url::parse(url).unwrap();
        FetchedResource {
            requested_url: url.clone(),
            final_url: url,
            redirect_chain: Vec::new(),
            status: 200,
            headers: headers.iter().copied().collect::<Headers>(),
            html: html.to_string(),
            elapsed_ms: 150,
            byte_size: html.len(),
            fetched_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    pub fn aux() -> AuxiliaryResources {
        AuxiliaryResources::default()
    }
}
