// src/core/aggregator.rs

//! Combines category results into the composite score and the report's
//! finding list.
//!
//! The composite is the weighted mean over *available* categories only. An
//! unavailable category drops out of both the numerator and the denominator,
//! so the remaining categories keep their relative weights and nothing is
//! moved onto any one of them. Two composites computed with different sets of
//! available categories are therefore means over different sets; compare the
//! per-category scores when availability differs.
//!
//! Individual weights may be zero. If every *available* category weighs zero,
//! the composite falls back to the plain mean of the available scores, so a
//! composite exists whenever at least one category is available.

use std::collections::BTreeMap;

use crate::config::CategoryWeights;
use crate::core::models::{round_tenth, Category, CategoryResult, ReportFinding};

/// Weighted mean of the available category scores, rounded to one decimal.
/// `None` only when no category is available.
pub fn composite_score(results: &BTreeMap<Category, CategoryResult>, weights: &CategoryWeights) -> Option<f64> {
    let available: Vec<(f64, f64)> = results
        .values()
        .filter_map(|r| r.score().value().map(|v| (v, weights.weight(r.category()))))
        .collect();
    if available.is_empty() {
        return None;
    }

    let (weighted, total) = available
        .iter()
        .fold((0.0, 0.0), |(sum, total), (value, weight)| (sum + value * weight, total + weight));
    let mean = if total > 0.0 {
        weighted / total
    } else {
        available.iter().map(|(value, _)| value).sum::<f64>() / available.len() as f64
    };
    Some(round_tenth(mean.clamp(0.0, 100.0)))
}

/// Every finding, ordered by severity (critical first) and then by category
/// declaration order. Findings tied on both keep their analyzer order.
pub fn ordered_findings(results: &BTreeMap<Category, CategoryResult>) -> Vec<ReportFinding> {
    let mut findings: Vec<ReportFinding> = results
        .values()
        .flat_map(|r| {
            r.findings()
                .iter()
                .cloned()
                .map(move |finding| ReportFinding { category: r.category(), finding })
        })
        .collect();
    findings.sort_by_key(|f| (f.finding.severity, f.category));
    findings
}

pub fn aggregate(
    results: &BTreeMap<Category, CategoryResult>,
    weights: &CategoryWeights,
) -> (Option<f64>, Vec<ReportFinding>) {
    (composite_score(results, weights), ordered_findings(results))
}
