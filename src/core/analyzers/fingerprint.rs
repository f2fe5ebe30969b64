// src/core/analyzers/fingerprint.rs

//! Technology fingerprinting over the already-fetched page.
//!
//! Rules look at response headers, cookies, meta generator tags, script and
//! stylesheet URLs, and the raw body. Nothing is fetched here.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::core::models::FetchedResource;
use crate::core::page::{AttrMatch, PageQuery};

/// A technology identified on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technology {
    pub name: String,
    pub category: String,
    pub version: Option<String>,
}

/// Where a rule looks for its signature.
enum Signal<'a> {
    /// A pattern in a specific response header.
    Header(&'a str, &'a Lazy<Regex>),
    /// A pattern in the content of a named meta tag.
    MetaTag(&'a str, &'a Lazy<Regex>),
    /// A pattern anywhere in the HTML body.
    Body(&'a Lazy<Regex>),
    /// A pattern in the `src` of a `<script>`.
    ScriptSrc(&'a Lazy<Regex>),
    /// A pattern in the `href` of a `<link>`.
    LinkHref(&'a Lazy<Regex>),
    /// A pattern in the `set-cookie` headers.
    Cookie(&'a Lazy<Regex>),
}

struct FingerprintRule<'a> {
    tech_name: &'a str,
    category: &'a str,
    signal: Signal<'a>,
}

static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)nginx(?:/([\d\.]+))?").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache(?:/([\d\.]+))?").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)cloudflare").unwrap());
static RE_LITESPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)LiteSpeed").unwrap());
static RE_IIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Microsoft-IIS/([\d\.]+)").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ?([\d\.]+)?").unwrap());
static RE_WP_PATHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Joomla!").unwrap());
static RE_DRUPAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"Drupal ?([\d\.]+)?").unwrap());
static RE_SHOPIFY: Lazy<Regex> = Lazy::new(|| Regex::new(r"cdn\.shopify\.com").unwrap());
static RE_WIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Wix\.com").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP/([\d\.]+)").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_ASPNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"ASP\.NET").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_NEXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Next\.js ?([\d\.]+)?").unwrap());
static RE_NEXTJS_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_NUXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"__NUXT__").unwrap());
static RE_ANGULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ng-version="([\d\.]+)""#).unwrap());
static RE_GATSBY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id=["']___gatsby["']"#).unwrap());
static RE_HUGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"Hugo ([\d\.]+)").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"jquery(?:[-.]([\d\.]+\d))?(?:\.min|\.slim)?\.js").unwrap());
static RE_REACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"react-dom|data-reactroot|react\.production").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|__VUE_").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"bootstrap(?:\.min)?\.css").unwrap());
static RE_GOOGLE_ANALYTICS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"google-analytics\.com/|googletagmanager\.com/").unwrap());

static RULES: &[FingerprintRule] = &[
    FingerprintRule { tech_name: "Nginx", category: "Web Server", signal: Signal::Header("server", &RE_NGINX) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", signal: Signal::Header("server", &RE_APACHE) },
    FingerprintRule { tech_name: "LiteSpeed", category: "Web Server", signal: Signal::Header("server", &RE_LITESPEED) },
    FingerprintRule { tech_name: "IIS", category: "Web Server", signal: Signal::Header("server", &RE_IIS) },
    FingerprintRule { tech_name: "Cloudflare", category: "CDN / WAF", signal: Signal::Header("server", &RE_CLOUDFLARE) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", signal: Signal::MetaTag("generator", &RE_WORDPRESS) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", signal: Signal::Body(&RE_WP_PATHS) },
    FingerprintRule { tech_name: "Joomla", category: "CMS", signal: Signal::MetaTag("generator", &RE_JOOMLA) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", signal: Signal::MetaTag("generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", signal: Signal::Header("x-generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Wix", category: "CMS", signal: Signal::MetaTag("generator", &RE_WIX) },
    FingerprintRule { tech_name: "Hugo", category: "Static Site Generator", signal: Signal::MetaTag("generator", &RE_HUGO) },
    FingerprintRule { tech_name: "Shopify", category: "E-commerce", signal: Signal::ScriptSrc(&RE_SHOPIFY) },
    FingerprintRule { tech_name: "PHP", category: "Language", signal: Signal::Header("x-powered-by", &RE_PHP) },
    FingerprintRule { tech_name: "PHP", category: "Language", signal: Signal::Cookie(&RE_PHPSESSID) },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", signal: Signal::Header("x-powered-by", &RE_ASPNET) },
    FingerprintRule { tech_name: "Python/Django", category: "Framework", signal: Signal::Cookie(&RE_DJANGO_CSRF) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", signal: Signal::Header("x-powered-by", &RE_NEXTJS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", signal: Signal::ScriptSrc(&RE_NEXTJS_SCRIPT) },
    FingerprintRule { tech_name: "Nuxt.js", category: "JS Framework", signal: Signal::Body(&RE_NUXTJS) },
    FingerprintRule { tech_name: "Angular", category: "JS Framework", signal: Signal::Body(&RE_ANGULAR) },
    FingerprintRule { tech_name: "Gatsby", category: "JS Framework", signal: Signal::Body(&RE_GATSBY) },
    FingerprintRule { tech_name: "React", category: "JS Library", signal: Signal::Body(&RE_REACT) },
    FingerprintRule { tech_name: "Vue.js", category: "JS Library", signal: Signal::Body(&RE_VUE) },
    FingerprintRule { tech_name: "jQuery", category: "JS Library", signal: Signal::ScriptSrc(&RE_JQUERY) },
    FingerprintRule { tech_name: "Bootstrap", category: "UI Framework", signal: Signal::LinkHref(&RE_BOOTSTRAP) },
    FingerprintRule { tech_name: "Google Analytics", category: "Analytics", signal: Signal::ScriptSrc(&RE_GOOGLE_ANALYTICS) },
];

/// Applies every rule and returns the detected technologies sorted by name.
/// A technology matched by several rules keeps the first version found.
pub fn detect_technologies(resource: &FetchedResource, page: &dyn PageQuery) -> Vec<Technology> {
    let cookies = resource.headers.get_all("set-cookie").join("; ");
    let mut found: BTreeMap<&str, Technology> = BTreeMap::new();

    for rule in RULES {
        let version = match &rule.signal {
            Signal::Header(name, re) => match_with_regex(resource.headers.get(name), re),
            Signal::MetaTag(name, re) => {
                let content = page
                    .find_first("meta", &[("name", AttrMatch::Equals(*name))])
                    .and_then(|m| m.attr("content"));
                match_with_regex(content, re)
            }
            Signal::Body(re) => match_with_regex(Some(resource.html.as_str()), re),
            Signal::ScriptSrc(re) => match_attr(page, "script", "src", re),
            Signal::LinkHref(re) => match_attr(page, "link", "href", re),
            Signal::Cookie(re) => match_with_regex(Some(cookies.as_str()), re),
        };

        let Some(version) = version else {
            continue;
        };
        debug!(tech = rule.tech_name, version = ?version, "Fingerprint rule matched.");
        found
            .entry(rule.tech_name)
            .and_modify(|tech| {
                if tech.version.is_none() {
                    tech.version = version.clone();
                }
            })
            .or_insert_with(|| Technology {
                name: rule.tech_name.to_string(),
                category: rule.category.to_string(),
                version,
            });
    }

    found.into_values().collect()
}

/// `Some(version)` when `re` matches, where `version` is the first capture
/// group if it captured anything.
fn match_with_regex(text: Option<&str>, re: &Regex) -> Option<Option<String>> {
    text.and_then(|text| {
        re.captures(text).map(|caps| {
            caps.get(1)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        })
    })
}

/// Like `match_with_regex` over every `tag[attr]`, preferring a match that
/// carries a version.
fn match_attr(page: &dyn PageQuery, tag: &str, attr: &str, re: &Regex) -> Option<Option<String>> {
    let mut matched = None;
    for el in page.find_all(tag, &[(attr, AttrMatch::Present)]) {
        match match_with_regex(el.attr(attr), re) {
            Some(Some(version)) => return Some(Some(version)),
            Some(None) => matched = Some(None),
            None => {}
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analyzers::test_support::resource;
    use crate::core::page::ParsedPage;

    #[test]
    fn test_detects_server_cms_and_libraries() {
        let html = r#"<html><head>
            <meta name="generator" content="WordPress 6.4.2">
            <script src="/wp-includes/js/jquery/jquery.min.js"></script>
            <script src="https://code.jquery.com/jquery-3.7.1.min.js"></script>
            <link rel="stylesheet" href="/css/bootstrap.min.css">
            </head><body></body></html>"#;
        let resource = resource(
            "https://example.com/",
            html,
            &[("Server", "nginx/1.25.3"), ("X-Powered-By", "PHP/8.2.1")],
        );
        let page = ParsedPage::parse(html);

        let techs = detect_technologies(&resource, &page);
        let names: Vec<&str> = techs.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Bootstrap", "Nginx", "PHP", "WordPress", "jQuery"]);

        let version = |name: &str| techs.iter().find(|t| t.name == name).and_then(|t| t.version.clone());
        assert_eq!(version("Nginx").as_deref(), Some("1.25.3"));
        assert_eq!(version("WordPress").as_deref(), Some("6.4.2"));
        assert_eq!(version("PHP").as_deref(), Some("8.2.1"));
        assert_eq!(version("jQuery").as_deref(), Some("3.7.1"));
    }

    #[test]
    fn test_plain_page_has_no_technologies() {
        let html = "<html><body><p>hello</p></body></html>";
        let resource = resource("https://example.com/", html, &[]);
        let page = ParsedPage::parse(html);
        assert!(detect_technologies(&resource, &page).is_empty());
    }
}
