// src/core/analyzers/security.rs

//! Security: transport security, protective headers, mixed content, and
//! registration health.
//!
//! Every time comparison is made against the snapshot's `fetched_at`, so the
//! same snapshot always produces the same result.

use chrono::Duration;

use crate::core::analyzers::{AnalysisInput, Analyzer, Check, CheckOutcome};
use crate::core::models::{Category, Registration};
use crate::core::page::AttrMatch;

const CERT_EXPIRY_WARNING_DAYS: i64 = 30;
const YOUNG_DOMAIN_DAYS: i64 = 180;
const DOMAIN_EXPIRY_WARNING_DAYS: i64 = 30;

pub struct SecurityAnalyzer;

static CHECKS: &[Check] = &[
    Check { id: "SEC_HTTPS", run: check_https },
    Check { id: "SEC_CERTIFICATE", run: check_certificate },
    Check { id: "SEC_HSTS", run: check_hsts },
    Check { id: "SEC_CSP", run: check_csp },
    Check { id: "SEC_FRAME_OPTIONS", run: check_frame_options },
    Check { id: "SEC_CONTENT_TYPE_OPTIONS", run: check_content_type_options },
    Check { id: "SEC_MIXED_CONTENT", run: check_mixed_content },
    Check { id: "SEC_DOMAIN_AGE", run: check_domain_age },
    Check { id: "SEC_DOMAIN_EXPIRY", run: check_domain_expiry },
];

impl Analyzer for SecurityAnalyzer {
    fn category(&self) -> Category {
        Category::Security
    }

    fn checks(&self) -> &'static [Check] {
        CHECKS
    }
}

fn is_https(input: &AnalysisInput<'_>) -> bool {
    input.resource.final_url.scheme() == "https"
}

fn csp_header(input: &AnalysisInput<'_>) -> Option<String> {
    let header = input.resource.headers.get("content-security-policy").map(str::to_string);
    header.or_else(|| {
        input
            .page
            .find_first("meta", &[("http-equiv", AttrMatch::Equals("content-security-policy"))])
            .and_then(|m| m.attr("content"))
            .map(str::to_string)
    })
}

fn check_https(input: &AnalysisInput<'_>) -> CheckOutcome {
    if is_https(input) {
        CheckOutcome::pass("Site is served over HTTPS")
    } else {
        CheckOutcome::fail("SEC_NO_HTTPS", "Site is not using HTTPS")
    }
}

fn check_certificate(input: &AnalysisInput<'_>) -> CheckOutcome {
    if !is_https(input) {
        return CheckOutcome::not_applicable();
    }
    let Some(cert) = input.domain.and_then(|d| d.certificate.as_ref()) else {
        return CheckOutcome::unknown("TLS certificate details are unavailable");
    };
    let now = input.resource.fetched_at;
    if now < cert.not_before || now > cert.not_after {
        return CheckOutcome::fail(
            "SEC_CERT_INVALID",
            format!(
                "Certificate for {} is outside its validity period ({} to {})",
                cert.subject_name,
                cert.not_before.format("%Y-%m-%d"),
                cert.not_after.format("%Y-%m-%d")
            ),
        );
    }
    let days_left = (cert.not_after - now).num_days();
    if days_left <= CERT_EXPIRY_WARNING_DAYS {
        CheckOutcome::partial(
            "SEC_CERT_EXPIRING_SOON",
            0.5,
            format!("Certificate expires in {} days", days_left),
        )
    } else {
        CheckOutcome::pass(format!(
            "Certificate issued by {} is valid for another {} days",
            cert.issuer_name, days_left
        ))
    }
}

fn check_hsts(input: &AnalysisInput<'_>) -> CheckOutcome {
    if !is_https(input) {
        return CheckOutcome::not_applicable();
    }
    match input.resource.headers.get("strict-transport-security") {
        Some(value) => CheckOutcome::pass(format!("HSTS is enabled: {}", value)),
        None => CheckOutcome::fail("SEC_HSTS_MISSING", "Strict-Transport-Security header is missing"),
    }
}

fn check_csp(input: &AnalysisInput<'_>) -> CheckOutcome {
    match csp_header(input) {
        Some(_) => CheckOutcome::pass("Content-Security-Policy is set"),
        None => CheckOutcome::fail("SEC_CSP_MISSING", "Content-Security-Policy is missing"),
    }
}

fn check_frame_options(input: &AnalysisInput<'_>) -> CheckOutcome {
    if let Some(value) = input.resource.headers.get("x-frame-options") {
        return CheckOutcome::pass(format!("X-Frame-Options is set: {}", value));
    }
    if csp_header(input).is_some_and(|csp| csp.to_ascii_lowercase().contains("frame-ancestors")) {
        return CheckOutcome::pass("Framing is restricted by CSP frame-ancestors");
    }
    CheckOutcome::fail(
        "SEC_X_FRAME_OPTIONS_MISSING",
        "Neither X-Frame-Options nor CSP frame-ancestors restrict framing",
    )
}

fn check_content_type_options(input: &AnalysisInput<'_>) -> CheckOutcome {
    match input.resource.headers.get("x-content-type-options") {
        Some(value) if value.trim().eq_ignore_ascii_case("nosniff") => {
            CheckOutcome::pass("X-Content-Type-Options is set to nosniff")
        }
        _ => CheckOutcome::fail(
            "SEC_X_CONTENT_TYPE_OPTIONS_MISSING",
            "X-Content-Type-Options: nosniff is missing",
        ),
    }
}

/// (tag, attribute) pairs whose insecure loading browsers block outright.
const ACTIVE_SOURCES: &[(&str, &str)] = &[
    ("script", "src"),
    ("iframe", "src"),
    ("object", "data"),
    ("embed", "src"),
];
const PASSIVE_SOURCES: &[(&str, &str)] = &[
    ("img", "src"),
    ("audio", "src"),
    ("video", "src"),
    ("source", "src"),
];

fn insecure_count(input: &AnalysisInput<'_>, sources: &[(&str, &str)]) -> usize {
    sources
        .iter()
        .map(|&(tag, attr)| {
            input
                .page
                .find_all(tag, &[(attr, AttrMatch::Prefix("http://"))])
                .len()
        })
        .sum()
}

fn check_mixed_content(input: &AnalysisInput<'_>) -> CheckOutcome {
    if !is_https(input) {
        return CheckOutcome::not_applicable();
    }
    let stylesheets = input
        .page
        .find_all(
            "link",
            &[("rel", AttrMatch::HasToken("stylesheet")), ("href", AttrMatch::Prefix("http://"))],
        )
        .len();
    let active = insecure_count(input, ACTIVE_SOURCES) + stylesheets;
    let passive = insecure_count(input, PASSIVE_SOURCES);

    if active > 0 {
        CheckOutcome::fail(
            "SEC_MIXED_CONTENT",
            format!(
                "HTTPS page loads {} scripts, frames or stylesheets over plain HTTP ({} passive resources)",
                active, passive
            ),
        )
    } else if passive > 0 {
        CheckOutcome::partial(
            "SEC_MIXED_CONTENT",
            0.5,
            format!("HTTPS page loads {} images or media over plain HTTP", passive),
        )
    } else {
        CheckOutcome::pass("No mixed content found")
    }
}

fn registration<'a>(input: &AnalysisInput<'a>) -> Option<&'a Registration> {
    input.domain.and_then(|d| d.registration.as_ref())
}

fn check_domain_age(input: &AnalysisInput<'_>) -> CheckOutcome {
    let Some(created) = registration(input).and_then(|r| r.created) else {
        return CheckOutcome::unknown("Domain registration date is unavailable");
    };
    let age = input.resource.fetched_at - created;
    if age < Duration::days(YOUNG_DOMAIN_DAYS) {
        CheckOutcome::fail(
            "SEC_DOMAIN_YOUNG",
            format!("Domain was registered {} days ago", age.num_days().max(0)),
        )
    } else {
        CheckOutcome::pass(format!(
            "Domain registered on {} ({} days ago)",
            created.format("%Y-%m-%d"),
            age.num_days()
        ))
    }
}

fn check_domain_expiry(input: &AnalysisInput<'_>) -> CheckOutcome {
    let Some(expires) = registration(input).and_then(|r| r.expires) else {
        return CheckOutcome::unknown("Domain expiry date is unavailable");
    };
    let days_left = (expires - input.resource.fetched_at).num_days();
    if days_left <= DOMAIN_EXPIRY_WARNING_DAYS {
        CheckOutcome::fail(
            "SEC_DOMAIN_EXPIRING",
            format!("Domain registration expires in {} days", days_left),
        )
    } else {
        CheckOutcome::pass(format!("Domain registration expires in {} days", days_left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analyzers::rubric::Rubric;
    use crate::core::analyzers::test_support::{aux, resource};
    use crate::core::analyzers::{analyze, Verdict};
    use crate::core::models::{CategoryResult, CategoryScore, CertificateInfo, DomainInfo, FetchedResource};
    use crate::core::page::ParsedPage;
    use chrono::{TimeZone, Utc};

    const HARDENED: &[(&str, &str)] = &[
        ("Strict-Transport-Security", "max-age=31536000"),
        ("Content-Security-Policy", "default-src 'self'; frame-ancestors 'none'"),
        ("X-Content-Type-Options", "nosniff"),
    ];

    fn domain(cert_days_left: i64, created_days_ago: i64, expires_in_days: i64) -> DomainInfo {
        let fetched = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        DomainInfo {
            registration: Some(Registration {
                registrar: Some("Example Registrar".to_string()),
                created: Some(fetched - Duration::days(created_days_ago)),
                expires: Some(fetched + Duration::days(expires_in_days)),
            }),
            certificate: Some(CertificateInfo {
                subject_name: "CN=example.com".to_string(),
                issuer_name: "CN=Example CA".to_string(),
                not_before: fetched - Duration::days(60),
                not_after: fetched + Duration::days(cert_days_left),
            }),
        }
    }

    fn run(resource: &FetchedResource, domain: Option<&DomainInfo>) -> CategoryResult {
        let aux = aux();
        let page = ParsedPage::parse(&resource.html);
        let input = AnalysisInput { resource, aux: &aux, domain, page: &page };
        analyze(&SecurityAnalyzer, &input, &Rubric::default())
    }

    fn outcome(
        resource: &FetchedResource,
        domain: Option<&DomainInfo>,
        check: fn(&AnalysisInput<'_>) -> CheckOutcome,
    ) -> CheckOutcome {
        let aux = aux();
        let page = ParsedPage::parse(&resource.html);
        let input = AnalysisInput { resource, aux: &aux, domain, page: &page };
        check(&input)
    }

    #[test]
    fn test_hardened_site_scores_full_marks() {
        let res = resource("https://example.com/", "<html></html>", HARDENED);
        let info = domain(200, 4000, 300);
        let result = run(&res, Some(&info));
        assert_eq!(result.score(), CategoryScore::Scored { value: 100.0, confidence: 1.0 });
    }

    #[test]
    fn test_plain_http_skips_transport_checks() {
        let res = resource("http://example.com/", "<html></html>", &[]);
        assert_eq!(outcome(&res, None, check_https).code, Some("SEC_NO_HTTPS"));
        assert_eq!(outcome(&res, None, check_certificate).verdict, Verdict::NotApplicable);
        assert_eq!(outcome(&res, None, check_hsts).verdict, Verdict::NotApplicable);
        assert_eq!(outcome(&res, None, check_mixed_content).verdict, Verdict::NotApplicable);
    }

    #[test]
    fn test_missing_domain_info_lowers_confidence_only() {
        let res = resource("https://example.com/", "<html></html>", HARDENED);
        let result = run(&res, None);
        // Certificate (20), domain age (5) and expiry (5) cannot be evaluated.
        assert_eq!(result.score(), CategoryScore::Scored { value: 100.0, confidence: 0.7 });
    }

    #[test]
    fn test_certificate_validity_is_measured_at_fetch_time() {
        let res = resource("https://example.com/", "<html></html>", HARDENED);
        let expiring = domain(10, 4000, 300);
        let outcome_soon = outcome(&res, Some(&expiring), check_certificate);
        assert_eq!(outcome_soon.code, Some("SEC_CERT_EXPIRING_SOON"));
        assert_eq!(outcome_soon.verdict, Verdict::Partial(0.5));

        let expired = domain(-1, 4000, 300);
        assert_eq!(outcome(&res, Some(&expired), check_certificate).code, Some("SEC_CERT_INVALID"));
    }

    #[test]
    fn test_young_and_expiring_domain() {
        let res = resource("https://example.com/", "<html></html>", HARDENED);
        let info = domain(200, 30, 10);
        assert_eq!(outcome(&res, Some(&info), check_domain_age).code, Some("SEC_DOMAIN_YOUNG"));
        assert_eq!(outcome(&res, Some(&info), check_domain_expiry).code, Some("SEC_DOMAIN_EXPIRING"));
    }

    #[test]
    fn test_mixed_content() {
        let active = r#"<html><body><script src="http://cdn.example.com/x.js"></script></body></html>"#;
        let res = resource("https://example.com/", active, &[]);
        assert_eq!(outcome(&res, None, check_mixed_content).verdict, Verdict::Fail);

        let passive = r#"<html><body><img src="http://cdn.example.com/x.png" alt=""></body></html>"#;
        let res = resource("https://example.com/", passive, &[]);
        assert_eq!(outcome(&res, None, check_mixed_content).verdict, Verdict::Partial(0.5));
    }

    #[test]
    fn test_frame_options_from_csp_meta() {
        let html = r#"<html><head><meta http-equiv="Content-Security-Policy" content="frame-ancestors 'self'"></head></html>"#;
        let res = resource("https://example.com/", html, &[]);
        assert_eq!(outcome(&res, None, check_frame_options).verdict, Verdict::Pass);
        assert_eq!(outcome(&res, None, check_csp).verdict, Verdict::Pass);
    }
}
