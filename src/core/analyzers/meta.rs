// src/core/analyzers/meta.rs

//! Meta & Headers: title, description, canonical, Open Graph, robots, viewport.

use crate::core::analyzers::{AnalysisInput, Analyzer, Check, CheckOutcome};
use crate::core::models::Category;
use crate::core::page::{clean_text, AttrMatch};

const TITLE_MIN_CHARS: usize = 30;
const TITLE_MAX_CHARS: usize = 60;
const DESCRIPTION_MIN_CHARS: usize = 120;
const DESCRIPTION_MAX_CHARS: usize = 155;

pub struct MetaAnalyzer;

static CHECKS: &[Check] = &[
    Check { id: "META_TITLE", run: check_title },
    Check { id: "META_TITLE_LENGTH", run: check_title_length },
    Check { id: "META_DESCRIPTION", run: check_description },
    Check { id: "META_DESCRIPTION_LENGTH", run: check_description_length },
    Check { id: "META_CANONICAL", run: check_canonical },
    Check { id: "META_OPEN_GRAPH", run: check_open_graph },
    Check { id: "META_ROBOTS", run: check_robots },
    Check { id: "META_VIEWPORT", run: check_viewport },
];

impl Analyzer for MetaAnalyzer {
    fn category(&self) -> Category {
        Category::Meta
    }

    fn checks(&self) -> &'static [Check] {
        CHECKS
    }
}

fn title(input: &AnalysisInput<'_>) -> Option<String> {
    input
        .page
        .find_first("title", &[])
        .map(|t| t.clean_text())
        .filter(|t| !t.is_empty())
}

fn description(input: &AnalysisInput<'_>) -> Option<String> {
    input
        .page
        .find_first("meta", &[("name", AttrMatch::Equals("description"))])
        .and_then(|m| m.attr("content"))
        .map(clean_text)
        .filter(|d| !d.is_empty())
}

fn check_title(input: &AnalysisInput<'_>) -> CheckOutcome {
    match title(input) {
        Some(t) => CheckOutcome::pass(format!("Title tag found: \"{}\"", t)),
        None => CheckOutcome::fail("META_TITLE_MISSING", "Missing title tag"),
    }
}

fn check_title_length(input: &AnalysisInput<'_>) -> CheckOutcome {
    let Some(t) = title(input) else {
        return CheckOutcome::not_applicable();
    };
    let len = t.chars().count();
    if len < TITLE_MIN_CHARS {
        CheckOutcome::fail(
            "META_TITLE_TOO_SHORT",
            format!(
                "Title tag is too short ({} chars, recommended: {}-{})",
                len, TITLE_MIN_CHARS, TITLE_MAX_CHARS
            ),
        )
    } else if len > TITLE_MAX_CHARS {
        CheckOutcome::fail(
            "META_TITLE_TOO_LONG",
            format!(
                "Title tag is too long ({} chars, recommended: {}-{})",
                len, TITLE_MIN_CHARS, TITLE_MAX_CHARS
            ),
        )
    } else {
        CheckOutcome::pass(format!("Title tag length is optimal ({} chars)", len))
    }
}

fn check_description(input: &AnalysisInput<'_>) -> CheckOutcome {
    match description(input) {
        Some(_) => CheckOutcome::pass("Meta description found"),
        None => CheckOutcome::fail("META_DESCRIPTION_MISSING", "Missing meta description"),
    }
}

fn check_description_length(input: &AnalysisInput<'_>) -> CheckOutcome {
    let Some(d) = description(input) else {
        return CheckOutcome::not_applicable();
    };
    let len = d.chars().count();
    if len < DESCRIPTION_MIN_CHARS {
        CheckOutcome::fail(
            "META_DESCRIPTION_TOO_SHORT",
            format!(
                "Meta description is too short ({} chars, recommended: {}-{})",
                len, DESCRIPTION_MIN_CHARS, DESCRIPTION_MAX_CHARS
            ),
        )
    } else if len > DESCRIPTION_MAX_CHARS {
        CheckOutcome::fail(
            "META_DESCRIPTION_TOO_LONG",
            format!(
                "Meta description is too long ({} chars, recommended: {}-{})",
                len, DESCRIPTION_MIN_CHARS, DESCRIPTION_MAX_CHARS
            ),
        )
    } else {
        CheckOutcome::pass(format!("Meta description length is optimal ({} chars)", len))
    }
}

fn check_canonical(input: &AnalysisInput<'_>) -> CheckOutcome {
    let href = input
        .page
        .find_first("link", &[("rel", AttrMatch::HasToken("canonical"))])
        .and_then(|l| l.attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty());
    match href {
        Some(h) => CheckOutcome::pass(format!("Canonical URL is set to: {}", h)),
        None => CheckOutcome::fail("META_CANONICAL_MISSING", "No canonical URL specified"),
    }
}

fn check_open_graph(input: &AnalysisInput<'_>) -> CheckOutcome {
    let count = input
        .page
        .find_all("meta", &[("property", AttrMatch::Prefix("og:"))])
        .len();
    if count > 0 {
        CheckOutcome::pass(format!("Found {} Open Graph tags for social media sharing", count))
    } else {
        CheckOutcome::fail("META_OPEN_GRAPH_MISSING", "No Open Graph tags found for social media optimization")
    }
}

fn blocks_indexing(directives: &str) -> bool {
    directives
        .split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .any(|d| d == "noindex" || d == "none")
}

fn check_robots(input: &AnalysisInput<'_>) -> CheckOutcome {
    let meta = input
        .page
        .find_first("meta", &[("name", AttrMatch::Equals("robots"))])
        .and_then(|m| m.attr("content"))
        .map(str::to_string);
    let header = input
        .resource
        .headers
        .get_all("x-robots-tag")
        .iter()
        .any(|v| blocks_indexing(v));

    if header {
        return CheckOutcome::fail("META_ROBOTS_NOINDEX", "X-Robots-Tag header blocks indexing (noindex)");
    }
    match meta {
        Some(content) if blocks_indexing(&content) => CheckOutcome::fail(
            "META_ROBOTS_NOINDEX",
            format!("Robots meta tag blocks indexing: {}", content),
        ),
        Some(content) => CheckOutcome::pass(format!("Robots meta tag found: {}", content)),
        None => CheckOutcome::pass("No robots meta tag found; page is indexable by default"),
    }
}

fn check_viewport(input: &AnalysisInput<'_>) -> CheckOutcome {
    if input
        .page
        .find_first("meta", &[("name", AttrMatch::Equals("viewport"))])
        .is_some()
    {
        CheckOutcome::pass("Viewport meta tag is set for mobile devices")
    } else {
        CheckOutcome::fail("META_VIEWPORT_MISSING", "Missing viewport meta tag for mobile responsiveness")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analyzers::rubric::Rubric;
    use crate::core::analyzers::test_support::{aux, resource};
    use crate::core::analyzers::{analyze, Verdict};
    use crate::core::models::{CategoryResult, CategoryScore, Severity};
    use crate::core::page::ParsedPage;

    fn run(html: &str, headers: &[(&str, &str)]) -> CategoryResult {
        let resource = resource("https://example.com/", html, headers);
        let aux = aux();
        let page = ParsedPage::parse(html);
        let input = AnalysisInput { resource: &resource, aux: &aux, domain: None, page: &page };
        analyze(&MetaAnalyzer, &input, &Rubric::default())
    }

    fn codes(result: &CategoryResult) -> Vec<&str> {
        result.findings().iter().map(|f| f.code.as_str()).collect()
    }

    const COMPLETE: &str = r#"<html><head>
        <title>Rust auditing made simple for every website</title>
        <meta name="description" content="Auditly checks titles, descriptions, canonical tags, Open Graph data and robots directives so your pages rank better in search.">
        <link rel="canonical" href="https://example.com/">
        <meta property="og:title" content="Auditly">
        <meta name="viewport" content="width=device-width, initial-scale=1">
        </head><body></body></html>"#;

    #[test]
    fn test_complete_page_scores_full_marks() {
        let result = run(COMPLETE, &[]);
        assert_eq!(result.score(), CategoryScore::Scored { value: 100.0, confidence: 1.0 });
        assert!(result.findings().iter().all(|f| f.severity == Severity::Info));
    }

    #[test]
    fn test_short_title_and_missing_description_lose_exactly_their_points() {
        // Title of exactly 20 characters.
        let html = r#"<html><head>
            <title>Twenty chars title!!</title>
            <link rel="canonical" href="https://example.com/">
            <meta property="og:title" content="x">
            <meta name="viewport" content="width=device-width, initial-scale=1">
            </head><body></body></html>"#;
        let result = run(html, &[]);

        let rubric = Rubric::default();
        let expected = 100.0 - f64::from(rubric.points("META_TITLE_LENGTH") + rubric.points("META_DESCRIPTION"));
        assert_eq!(result.score().value(), Some(expected));

        let short = result.findings().iter().find(|f| f.code == "META_TITLE_TOO_SHORT").unwrap();
        assert_eq!(short.severity, Severity::Warning);
        assert!(short.message.contains("20 chars"));
        let missing = result.findings().iter().find(|f| f.code == "META_DESCRIPTION_MISSING").unwrap();
        assert_eq!(missing.severity, Severity::Warning);
        assert!(missing.remediation.is_some());
        assert!(!codes(&result).contains(&"META_DESCRIPTION_TOO_SHORT"));
    }

    #[test]
    fn test_missing_title_skips_length_check() {
        let html = "<html><head></head><body></body></html>";
        let resource = resource("https://example.com/", html, &[]);
        let aux = aux();
        let page = ParsedPage::parse(html);
        let input = AnalysisInput { resource: &resource, aux: &aux, domain: None, page: &page };
        assert_eq!(check_title_length(&input).verdict, Verdict::NotApplicable);
        assert_eq!(check_title(&input).code, Some("META_TITLE_MISSING"));
    }

    #[test]
    fn test_noindex_in_header_is_critical() {
        let result = run(COMPLETE, &[("X-Robots-Tag", "noindex, nofollow")]);
        let f = result.findings().iter().find(|f| f.code == "META_ROBOTS_NOINDEX").unwrap();
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(result.score().value(), Some(85.0));
    }

    #[test]
    fn test_noindex_in_meta_is_detected() {
        let html = COMPLETE.replace("</head>", r#"<meta name="robots" content="NOINDEX,follow"></head>"#);
        let result = run(&html, &[]);
        assert!(codes(&result).contains(&"META_ROBOTS_NOINDEX"));
    }
}
