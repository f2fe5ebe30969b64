//! This module acts as the central "brain" of the auditor.
//! It holds two static, read-only tables: the rubric (every scored check and
//! its default point value) and the catalogue of findings a failed check can
//! raise, with severity and remediation advice.
//! Analyzers only decide verdicts; what a verdict costs and how it is worded
//! for the reader lives here.

use crate::core::models::{Category, Severity};

/// A scored check. Points are the maximum a page can lose on it.
#[derive(Debug)]
pub struct RubricCheck {
    /// Stable identifier, also the key of `rubric_overrides` in the config.
    pub id: &'static str,
    pub category: Category,
    pub points: u32,
}

/// Human-readable detail for a finding code raised by a failed check.
#[derive(Debug)]
pub struct FindingDetail {
    pub code: &'static str,
    pub title: &'static str,
    pub severity: Severity,
    pub remediation: &'static str,
}

/// Default rubric. Per category the points sum to 100.
static RUBRIC: &[RubricCheck] = &[
    // --- Meta & Headers ---
    RubricCheck { id: "META_TITLE", category: Category::Meta, points: 20 },
    RubricCheck { id: "META_TITLE_LENGTH", category: Category::Meta, points: 10 },
    RubricCheck { id: "META_DESCRIPTION", category: Category::Meta, points: 15 },
    RubricCheck { id: "META_DESCRIPTION_LENGTH", category: Category::Meta, points: 10 },
    RubricCheck { id: "META_CANONICAL", category: Category::Meta, points: 10 },
    RubricCheck { id: "META_OPEN_GRAPH", category: Category::Meta, points: 10 },
    RubricCheck { id: "META_ROBOTS", category: Category::Meta, points: 15 },
    RubricCheck { id: "META_VIEWPORT", category: Category::Meta, points: 10 },
    // --- Content Quality ---
    RubricCheck { id: "CONTENT_H1", category: Category::Content, points: 20 },
    RubricCheck { id: "CONTENT_HEADING_ORDER", category: Category::Content, points: 10 },
    RubricCheck { id: "CONTENT_WORD_COUNT", category: Category::Content, points: 25 },
    RubricCheck { id: "CONTENT_IMAGE_ALT", category: Category::Content, points: 20 },
    RubricCheck { id: "CONTENT_IMAGE_FORMAT", category: Category::Content, points: 10 },
    RubricCheck { id: "CONTENT_KEYWORD_DENSITY", category: Category::Content, points: 15 },
    // --- Technical SEO ---
    RubricCheck { id: "TECH_REDIRECTS", category: Category::Technical, points: 10 },
    RubricCheck { id: "TECH_COMPRESSION", category: Category::Technical, points: 15 },
    RubricCheck { id: "TECH_CACHING", category: Category::Technical, points: 10 },
    RubricCheck { id: "TECH_CHARSET", category: Category::Technical, points: 10 },
    RubricCheck { id: "TECH_URL_DEPTH", category: Category::Technical, points: 10 },
    RubricCheck { id: "TECH_ROBOTS_TXT", category: Category::Technical, points: 15 },
    RubricCheck { id: "TECH_MOBILE_VIEWPORT", category: Category::Technical, points: 10 },
    RubricCheck { id: "TECH_LANG", category: Category::Technical, points: 10 },
    RubricCheck { id: "TECH_STRUCTURED_DATA", category: Category::Technical, points: 10 },
    // --- Speed ---
    RubricCheck { id: "SPEED_RESPONSE_TIME", category: Category::Speed, points: 40 },
    RubricCheck { id: "SPEED_PAGE_SIZE", category: Category::Speed, points: 30 },
    RubricCheck { id: "SPEED_RESOURCE_COUNT", category: Category::Speed, points: 15 },
    RubricCheck { id: "SPEED_RENDER_BLOCKING", category: Category::Speed, points: 15 },
    // --- Security ---
    RubricCheck { id: "SEC_HTTPS", category: Category::Security, points: 25 },
    RubricCheck { id: "SEC_CERTIFICATE", category: Category::Security, points: 20 },
    RubricCheck { id: "SEC_HSTS", category: Category::Security, points: 10 },
    RubricCheck { id: "SEC_CSP", category: Category::Security, points: 10 },
    RubricCheck { id: "SEC_FRAME_OPTIONS", category: Category::Security, points: 10 },
    RubricCheck { id: "SEC_CONTENT_TYPE_OPTIONS", category: Category::Security, points: 5 },
    RubricCheck { id: "SEC_MIXED_CONTENT", category: Category::Security, points: 10 },
    RubricCheck { id: "SEC_DOMAIN_AGE", category: Category::Security, points: 5 },
    RubricCheck { id: "SEC_DOMAIN_EXPIRY", category: Category::Security, points: 5 },
    // --- Link Structure ---
    RubricCheck { id: "LINKS_REACHABLE", category: Category::Links, points: 50 },
    RubricCheck { id: "LINKS_INTERNAL", category: Category::Links, points: 20 },
    RubricCheck { id: "LINKS_ANCHOR_TEXT", category: Category::Links, points: 15 },
    RubricCheck { id: "LINKS_CRAWLABLE", category: Category::Links, points: 15 },
];

static FINDINGS: &[FindingDetail] = &[
    // --- Meta & Headers ---
    FindingDetail {
        code: "META_TITLE_MISSING",
        title: "Title Tag Missing",
        severity: Severity::Critical,
        remediation: "Add a unique <title> inside <head> that describes the page in 30 to 60 characters.",
    },
    FindingDetail {
        code: "META_TITLE_TOO_SHORT",
        title: "Title Too Short",
        severity: Severity::Warning,
        remediation: "Lengthen the title to between 30 and 60 characters, leading with the page's main keyword.",
    },
    FindingDetail {
        code: "META_TITLE_TOO_LONG",
        title: "Title Too Long",
        severity: Severity::Warning,
        remediation: "Shorten the title to at most 60 characters so search results do not truncate it.",
    },
    FindingDetail {
        code: "META_DESCRIPTION_MISSING",
        title: "Meta Description Missing",
        severity: Severity::Warning,
        remediation: "Add <meta name=\"description\" content=\"...\"> summarising the page in 120 to 155 characters.",
    },
    FindingDetail {
        code: "META_DESCRIPTION_TOO_SHORT",
        title: "Meta Description Too Short",
        severity: Severity::Warning,
        remediation: "Expand the meta description to between 120 and 155 characters.",
    },
    FindingDetail {
        code: "META_DESCRIPTION_TOO_LONG",
        title: "Meta Description Too Long",
        severity: Severity::Info,
        remediation: "Trim the meta description to at most 155 characters.",
    },
    FindingDetail {
        code: "META_CANONICAL_MISSING",
        title: "Canonical URL Missing",
        severity: Severity::Warning,
        remediation: "Add <link rel=\"canonical\" href=\"...\"> pointing at the preferred URL of this page.",
    },
    FindingDetail {
        code: "META_OPEN_GRAPH_MISSING",
        title: "Open Graph Tags Missing",
        severity: Severity::Info,
        remediation: "Add og:title, og:description and og:image meta tags for richer social sharing previews.",
    },
    FindingDetail {
        code: "META_ROBOTS_NOINDEX",
        title: "Page Blocked From Indexing",
        severity: Severity::Critical,
        remediation: "Remove 'noindex' from the robots meta tag or X-Robots-Tag header if the page should appear in search results.",
    },
    FindingDetail {
        code: "META_VIEWPORT_MISSING",
        title: "Viewport Meta Tag Missing",
        severity: Severity::Warning,
        remediation: "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">.",
    },
    // --- Content Quality ---
    FindingDetail {
        code: "CONTENT_H1_MISSING",
        title: "H1 Heading Missing",
        severity: Severity::Warning,
        remediation: "Add exactly one <h1> stating the main topic of the page.",
    },
    FindingDetail {
        code: "CONTENT_H1_MULTIPLE",
        title: "Multiple H1 Headings",
        severity: Severity::Warning,
        remediation: "Keep a single <h1> and demote the others to <h2> or lower.",
    },
    FindingDetail {
        code: "CONTENT_HEADING_SKIPPED",
        title: "Heading Levels Skipped",
        severity: Severity::Info,
        remediation: "Nest headings without gaps (h1, then h2, then h3) so the outline is navigable.",
    },
    FindingDetail {
        code: "CONTENT_THIN",
        title: "Thin Content",
        severity: Severity::Warning,
        remediation: "Expand the main content to at least 300 words of useful, original text.",
    },
    FindingDetail {
        code: "CONTENT_IMAGES_MISSING_ALT",
        title: "Images Without Alt Text",
        severity: Severity::Warning,
        remediation: "Give every informative image a descriptive alt attribute; use alt=\"\" for decorative ones.",
    },
    FindingDetail {
        code: "CONTENT_IMAGES_UNOPTIMIZED",
        title: "Unoptimised Image Formats",
        severity: Severity::Info,
        remediation: "Serve raster images as WebP or AVIF and compress them before upload.",
    },
    FindingDetail {
        code: "CONTENT_KEYWORD_STUFFING",
        title: "Keyword Stuffing",
        severity: Severity::Warning,
        remediation: "Reduce repetition of the dominant keyword below 5% density and use natural synonyms.",
    },
    // --- Technical SEO ---
    FindingDetail {
        code: "TECH_REDIRECT_CHAIN",
        title: "Redirect Chain",
        severity: Severity::Warning,
        remediation: "Link directly to the final URL so visitors and crawlers reach it in a single hop.",
    },
    FindingDetail {
        code: "TECH_COMPRESSION_MISSING",
        title: "Compression Disabled",
        severity: Severity::Warning,
        remediation: "Enable gzip or Brotli compression for HTML, CSS and JavaScript on the web server.",
    },
    FindingDetail {
        code: "TECH_CACHE_HEADERS_MISSING",
        title: "Caching Headers Missing",
        severity: Severity::Info,
        remediation: "Send Cache-Control (and ETag or Last-Modified) so browsers and CDNs can reuse responses.",
    },
    FindingDetail {
        code: "TECH_CHARSET_MISSING",
        title: "Character Set Not Declared",
        severity: Severity::Info,
        remediation: "Declare the encoding with <meta charset=\"utf-8\"> or a charset in the Content-Type header.",
    },
    FindingDetail {
        code: "TECH_URL_TOO_DEEP",
        title: "Deep URL Structure",
        severity: Severity::Warning,
        remediation: "Flatten the URL to at most three path segments.",
    },
    FindingDetail {
        code: "TECH_ROBOTS_TXT_MISSING",
        title: "robots.txt Missing",
        severity: Severity::Warning,
        remediation: "Publish /robots.txt declaring crawl rules and the sitemap location.",
    },
    FindingDetail {
        code: "TECH_ROBOTS_TXT_BLOCKS_PAGE",
        title: "robots.txt Blocks This Page",
        severity: Severity::Critical,
        remediation: "Remove the Disallow rule matching this path if the page should be crawled.",
    },
    FindingDetail {
        code: "TECH_VIEWPORT_NOT_RESPONSIVE",
        title: "Viewport Not Responsive",
        severity: Severity::Warning,
        remediation: "Set the viewport content to 'width=device-width, initial-scale=1'.",
    },
    FindingDetail {
        code: "TECH_LANG_MISSING",
        title: "Document Language Missing",
        severity: Severity::Info,
        remediation: "Add a lang attribute to the <html> element, e.g. <html lang=\"en\">.",
    },
    FindingDetail {
        code: "TECH_STRUCTURED_DATA_MISSING",
        title: "Structured Data Missing",
        severity: Severity::Info,
        remediation: "Describe the page with schema.org JSON-LD to become eligible for rich results.",
    },
    // --- Speed ---
    FindingDetail {
        code: "SPEED_RESPONSE_SLOW",
        title: "Slow Server Response",
        severity: Severity::Warning,
        remediation: "Bring the response time under 2 seconds with server-side caching, a CDN or lighter backend work.",
    },
    FindingDetail {
        code: "SPEED_RESPONSE_MODERATE",
        title: "Moderate Server Response",
        severity: Severity::Info,
        remediation: "Aim for a response time below 1 second; profile backend rendering and database queries.",
    },
    FindingDetail {
        code: "SPEED_PAGE_HEAVY",
        title: "Heavy Page",
        severity: Severity::Warning,
        remediation: "Reduce the HTML payload below 3 MB by removing inline assets and unused markup.",
    },
    FindingDetail {
        code: "SPEED_PAGE_LARGE",
        title: "Large Page",
        severity: Severity::Info,
        remediation: "Keep the HTML payload under 1 MB; move inline scripts and styles to cacheable files.",
    },
    FindingDetail {
        code: "SPEED_TOO_MANY_RESOURCES",
        title: "Too Many Resources",
        severity: Severity::Info,
        remediation: "Bundle scripts and stylesheets to cut the number of requests.",
    },
    FindingDetail {
        code: "SPEED_RENDER_BLOCKING_SCRIPTS",
        title: "Render-Blocking Scripts",
        severity: Severity::Warning,
        remediation: "Mark head scripts async or defer, or move them to the end of <body>.",
    },
    // --- Security ---
    FindingDetail {
        code: "SEC_NO_HTTPS",
        title: "HTTPS Not Used",
        severity: Severity::Critical,
        remediation: "Serve the site over HTTPS and redirect all HTTP traffic to it.",
    },
    FindingDetail {
        code: "SEC_CERT_INVALID",
        title: "Certificate Not Valid",
        severity: Severity::Critical,
        remediation: "Install a valid certificate from a trusted CA and automate its renewal.",
    },
    FindingDetail {
        code: "SEC_CERT_EXPIRING_SOON",
        title: "Certificate Expiring Soon",
        severity: Severity::Warning,
        remediation: "Renew the certificate before it expires and verify automated renewal works.",
    },
    FindingDetail {
        code: "SEC_HSTS_MISSING",
        title: "HSTS Header Missing",
        severity: Severity::Warning,
        remediation: "Add 'Strict-Transport-Security: max-age=31536000; includeSubDomains'.",
    },
    FindingDetail {
        code: "SEC_CSP_MISSING",
        title: "CSP Header Missing",
        severity: Severity::Warning,
        remediation: "Define a Content-Security-Policy listing trusted sources for scripts, styles and frames.",
    },
    FindingDetail {
        code: "SEC_X_FRAME_OPTIONS_MISSING",
        title: "Clickjacking Protection Missing",
        severity: Severity::Warning,
        remediation: "Send 'X-Frame-Options: SAMEORIGIN' or a CSP frame-ancestors directive.",
    },
    FindingDetail {
        code: "SEC_X_CONTENT_TYPE_OPTIONS_MISSING",
        title: "X-Content-Type-Options Missing",
        severity: Severity::Info,
        remediation: "Send 'X-Content-Type-Options: nosniff'.",
    },
    FindingDetail {
        code: "SEC_MIXED_CONTENT",
        title: "Mixed Content",
        severity: Severity::Warning,
        remediation: "Load every script, stylesheet, image and frame over HTTPS.",
    },
    FindingDetail {
        code: "SEC_DOMAIN_YOUNG",
        title: "Recently Registered Domain",
        severity: Severity::Info,
        remediation: "Nothing to fix directly; young domains earn trust over time through consistent, quality content.",
    },
    FindingDetail {
        code: "SEC_DOMAIN_EXPIRING",
        title: "Domain Registration Expiring",
        severity: Severity::Warning,
        remediation: "Renew the domain registration and enable auto-renew with the registrar.",
    },
    // --- Link Structure ---
    FindingDetail {
        code: "LINKS_BROKEN",
        title: "Broken Links",
        severity: Severity::Warning,
        remediation: "Fix or remove links that return errors, or redirect their targets to live pages.",
    },
    FindingDetail {
        code: "LINKS_NO_INTERNAL",
        title: "No Internal Links",
        severity: Severity::Warning,
        remediation: "Link to related pages on the same site so crawlers and visitors can discover them.",
    },
    FindingDetail {
        code: "LINKS_GENERIC_ANCHOR_TEXT",
        title: "Non-Descriptive Link Text",
        severity: Severity::Info,
        remediation: "Replace 'click here' or empty anchors with text describing the link target.",
    },
    FindingDetail {
        code: "LINKS_UNCRAWLABLE",
        title: "Uncrawlable Links",
        severity: Severity::Info,
        remediation: "Use real URLs in href instead of 'javascript:' handlers or empty values.",
    },
];

/// Every rubric check, in declaration order.
pub fn rubric_checks() -> &'static [RubricCheck] {
    RUBRIC
}

pub fn get_rubric_check(id: &str) -> Option<&'static RubricCheck> {
    RUBRIC.iter().find(|c| c.id == id)
}

/// Retrieves the full detail for a finding code, or `None` if it is not catalogued.
pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn test_default_rubric_budgets_are_exactly_100() {
        for category in Category::iter() {
            let total: u32 = RUBRIC
                .iter()
                .filter(|c| c.category == category)
                .map(|c| c.points)
                .sum();
            assert_eq!(total, 100, "{} rubric sums to {}", category, total);
        }
    }

    #[test]
    fn test_codes_are_unique() {
        let mut seen = HashSet::new();
        for f in FINDINGS {
            assert!(seen.insert(f.code), "duplicate finding code {}", f.code);
        }
        let mut seen = HashSet::new();
        for c in RUBRIC {
            assert!(seen.insert(c.id), "duplicate rubric id {}", c.id);
        }
    }

    #[test]
    fn test_every_finding_has_remediation() {
        for f in FINDINGS {
            assert!(!f.remediation.is_empty(), "{} has no remediation", f.code);
            assert!(!f.title.is_empty());
        }
    }

    #[test]
    fn test_lookup() {
        let detail = get_finding_detail("META_DESCRIPTION_MISSING").unwrap();
        assert_eq!(detail.severity, Severity::Warning);
        assert_eq!(detail.title, "Meta Description Missing");
        assert!(get_finding_detail("NOPE").is_none());
        assert_eq!(get_rubric_check("LINKS_REACHABLE").unwrap().points, 50);
    }
}
