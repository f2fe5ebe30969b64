// src/core/analyzers/technical.rs

//! Technical SEO: transport, crawlability and markup hygiene.

use crate::core::analyzers::fingerprint::detect_technologies;
use crate::core::analyzers::robots::parse_robots;
use crate::core::analyzers::{AnalysisInput, Analyzer, Check, CheckOutcome};
use crate::core::models::{AuxResource, Category, Finding, Severity};
use crate::core::page::AttrMatch;

/// Product token matched against robots.txt user-agent groups.
pub const ROBOTS_AGENT: &str = "auditly";
const MAX_URL_DEPTH: usize = 3;
const COMPRESSED_ENCODINGS: &[&str] = &["gzip", "br", "deflate", "zstd"];
const CACHE_HEADERS: &[&str] = &["cache-control", "expires", "etag", "last-modified"];

pub struct TechnicalAnalyzer;

static CHECKS: &[Check] = &[
    Check { id: "TECH_REDIRECTS", run: check_redirects },
    Check { id: "TECH_COMPRESSION", run: check_compression },
    Check { id: "TECH_CACHING", run: check_caching },
    Check { id: "TECH_CHARSET", run: check_charset },
    Check { id: "TECH_URL_DEPTH", run: check_url_depth },
    Check { id: "TECH_ROBOTS_TXT", run: check_robots_txt },
    Check { id: "TECH_MOBILE_VIEWPORT", run: check_mobile_viewport },
    Check { id: "TECH_LANG", run: check_lang },
    Check { id: "TECH_STRUCTURED_DATA", run: check_structured_data },
];

impl Analyzer for TechnicalAnalyzer {
    fn category(&self) -> Category {
        Category::Technical
    }

    fn checks(&self) -> &'static [Check] {
        CHECKS
    }

    fn observations(&self, input: &AnalysisInput<'_>) -> Vec<Finding> {
        let headers = &input.resource.headers;
        let mut findings = Vec::new();

        if let Some(server) = headers.get("server") {
            findings.push(Finding::new(Severity::Info, "TECH_SERVER", format!("Server: {}", server)));
        }
        if let Some(content_type) = headers.get("content-type") {
            findings.push(Finding::new(
                Severity::Info,
                "TECH_CONTENT_TYPE",
                format!("Content-Type: {}", content_type),
            ));
        }

        let techs = detect_technologies(input.resource, input.page);
        if !techs.is_empty() {
            let list = techs
                .iter()
                .map(|t| match &t.version {
                    Some(v) => format!("{} {} ({})", t.name, v, t.category),
                    None => format!("{} ({})", t.name, t.category),
                })
                .collect::<Vec<_>>()
                .join(", ");
            findings.push(Finding::new(
                Severity::Info,
                "TECH_TECHNOLOGIES",
                format!("Detected technologies: {}", list),
            ));
        }

        if let AuxResource::Found { value } = &input.aux.robots_txt {
            let sitemaps = parse_robots(value, ROBOTS_AGENT).sitemaps;
            if !sitemaps.is_empty() {
                findings.push(Finding::new(
                    Severity::Info,
                    "TECH_SITEMAPS",
                    format!("Sitemaps declared in robots.txt: {}", sitemaps.join(", ")),
                ));
            }
        }
        findings
    }
}

fn check_redirects(input: &AnalysisInput<'_>) -> CheckOutcome {
    let chain = &input.resource.redirect_chain;
    match chain.len() {
        0 => CheckOutcome::pass("No redirects before the final URL"),
        1 => CheckOutcome::pass(format!("Single redirect to {}", input.resource.final_url)),
        n => {
            let hops = chain
                .iter()
                .chain(std::iter::once(&input.resource.final_url))
                .map(|u| u.as_str())
                .collect::<Vec<_>>()
                .join(" -> ");
            CheckOutcome::fail("TECH_REDIRECT_CHAIN", format!("Redirect chain of {} hops: {}", n, hops))
        }
    }
}

fn is_compressed(encoding: &str) -> bool {
    encoding
        .split(',')
        .any(|e| COMPRESSED_ENCODINGS.contains(&e.trim().to_ascii_lowercase().as_str()))
}

fn check_compression(input: &AnalysisInput<'_>) -> CheckOutcome {
    if let Some(encoding) = input.resource.headers.get("content-encoding").filter(|e| is_compressed(e)) {
        return CheckOutcome::pass(format!("Response is compressed ({})", encoding));
    }
    match &input.aux.compression {
        AuxResource::Found { value } if is_compressed(value) => {
            CheckOutcome::pass(format!("Response is compressed ({})", value))
        }
        AuxResource::Found { value } => CheckOutcome::fail(
            "TECH_COMPRESSION_MISSING",
            format!("Server answered with '{}' encoding when offered gzip or brotli", value),
        ),
        AuxResource::Missing => CheckOutcome::fail(
            "TECH_COMPRESSION_MISSING",
            "Response is not compressed (no gzip or brotli)",
        ),
        AuxResource::Unknown { reason } => {
            CheckOutcome::unknown(format!("Compression could not be determined: {}", reason))
        }
    }
}

fn check_caching(input: &AnalysisInput<'_>) -> CheckOutcome {
    let present: Vec<&str> = CACHE_HEADERS
        .iter()
        .copied()
        .filter(|h| input.resource.headers.contains(h))
        .collect();
    if present.is_empty() {
        CheckOutcome::fail("TECH_CACHE_HEADERS_MISSING", "No caching headers found")
    } else {
        CheckOutcome::pass(format!("Caching headers present: {}", present.join(", ")))
    }
}

fn check_charset(input: &AnalysisInput<'_>) -> CheckOutcome {
    let in_header = input
        .resource
        .headers
        .get("content-type")
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("charset="));
    let in_meta = input.page.find_first("meta", &[("charset", AttrMatch::Present)]).is_some()
        || input
            .page
            .find_all("meta", &[("http-equiv", AttrMatch::Equals("content-type"))])
            .iter()
            .any(|m| m.attr("content").is_some_and(|c| c.to_ascii_lowercase().contains("charset=")));
    if in_header || in_meta {
        CheckOutcome::pass("Character encoding is declared")
    } else {
        CheckOutcome::fail("TECH_CHARSET_MISSING", "No character encoding declared in headers or markup")
    }
}

fn check_url_depth(input: &AnalysisInput<'_>) -> CheckOutcome {
    let depth = input
        .resource
        .final_url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0);
    if depth > MAX_URL_DEPTH {
        CheckOutcome::fail(
            "TECH_URL_TOO_DEEP",
            format!("URL is {} levels deep (recommended: at most {})", depth, MAX_URL_DEPTH),
        )
    } else {
        CheckOutcome::pass(format!("URL depth is {}", depth))
    }
}

fn check_robots_txt(input: &AnalysisInput<'_>) -> CheckOutcome {
    match &input.aux.robots_txt {
        AuxResource::Found { value } => {
            let url = &input.resource.final_url;
            let path = match url.query() {
                Some(q) => format!("{}?{}", url.path(), q),
                None => url.path().to_string(),
            };
            if parse_robots(value, ROBOTS_AGENT).is_allowed(&path) {
                CheckOutcome::pass("robots.txt allows crawling this page")
            } else {
                CheckOutcome::fail(
                    "TECH_ROBOTS_TXT_BLOCKS_PAGE",
                    format!("robots.txt disallows crawling {}", path),
                )
            }
        }
        AuxResource::Missing => CheckOutcome::partial("TECH_ROBOTS_TXT_MISSING", 0.5, "No robots.txt found"),
        AuxResource::Unknown { reason } => {
            CheckOutcome::unknown(format!("robots.txt could not be retrieved: {}", reason))
        }
    }
}

fn check_mobile_viewport(input: &AnalysisInput<'_>) -> CheckOutcome {
    let Some(content) = input
        .page
        .find_first("meta", &[("name", AttrMatch::Equals("viewport"))])
        .map(|m| m.attr("content").unwrap_or("").to_ascii_lowercase())
    else {
        return CheckOutcome::not_applicable();
    };
    let directives: Vec<String> = content.split(',').map(|d| d.split_whitespace().collect()).collect();
    let device_width = directives.iter().any(|d| d == "width=device-width");
    let initial_scale = directives
        .iter()
        .any(|d| d.strip_prefix("initial-scale=").and_then(|v| v.parse::<f64>().ok()) == Some(1.0));
    if device_width && initial_scale {
        CheckOutcome::pass("Viewport is configured for responsive layouts")
    } else {
        CheckOutcome::fail(
            "TECH_VIEWPORT_NOT_RESPONSIVE",
            format!("Viewport '{}' lacks width=device-width or initial-scale=1", content),
        )
    }
}

fn check_lang(input: &AnalysisInput<'_>) -> CheckOutcome {
    let lang = input
        .page
        .find_first("html", &[("lang", AttrMatch::Present)])
        .and_then(|h| h.attr("lang"))
        .map(str::trim)
        .filter(|l| !l.is_empty());
    match lang {
        Some(l) => CheckOutcome::pass(format!("Document language is declared: {}", l)),
        None => CheckOutcome::fail("TECH_LANG_MISSING", "The html element has no lang attribute"),
    }
}

fn check_structured_data(input: &AnalysisInput<'_>) -> CheckOutcome {
    let json_ld = input
        .page
        .find_all("script", &[("type", AttrMatch::Equals("application/ld+json"))])
        .len();
    let microdata = input.page.find_all("*", &[("itemscope", AttrMatch::Present)]).len();
    if json_ld + microdata > 0 {
        CheckOutcome::pass(format!(
            "Structured data found ({} JSON-LD blocks, {} microdata items)",
            json_ld, microdata
        ))
    } else {
        CheckOutcome::fail("TECH_STRUCTURED_DATA_MISSING", "No structured data (JSON-LD or microdata) found")
    }
}
