// src/core/analyzers/links.rs

//! Link Structure: broken links, internal linking, anchor text, crawlability.
//!
//! Link discovery lives here too; the fetcher uses it to pick which links to
//! check, so both sides agree on what a link is.

use std::collections::HashSet;

use url::Url;

use crate::core::analyzers::{AnalysisInput, Analyzer, Check, CheckOutcome};
use crate::core::models::{Category, LinkKind, LinkStatus};
use crate::core::page::{AttrMatch, PageElement, PageQuery};

const GENERIC_ANCHORS: &[&str] = &[
    "click here",
    "click",
    "here",
    "read more",
    "more",
    "learn more",
    "link",
    "this",
    "go",
];
const MAX_LISTED_BROKEN: usize = 5;

/// A unique link found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub url: Url,
    pub kind: LinkKind,
    pub nofollow: bool,
}

/// Same site when the hosts match, ignoring a leading `www.`.
pub fn classify_link(url: &Url, base: &Url) -> LinkKind {
    let strip = |host: Option<&str>| host.map(|h| h.trim_start_matches("www.").to_ascii_lowercase());
    match (strip(url.host_str()), strip(base.host_str())) {
        (Some(a), Some(b)) if a == b => LinkKind::Internal,
        _ => LinkKind::External,
    }
}

/// Whether an href points at another document rather than a fragment, a
/// script or a non-web scheme.
fn is_navigable(href: &str) -> bool {
    let href = href.trim().to_ascii_lowercase();
    !(href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:"))
}

fn anchors(page: &dyn PageQuery) -> Vec<&PageElement> {
    page.find_all("a", &[("href", AttrMatch::Present)])
}

/// Every http(s) link of the page, resolved against `base`, fragment
/// removed, in document order without duplicates.
pub fn discover_links(page: &dyn PageQuery, base: &Url) -> Vec<DiscoveredLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for a in anchors(page) {
        let Some(href) = a.attr("href").filter(|h| is_navigable(h)) else {
            continue;
        };
        let Ok(mut url) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        if !seen.insert(url.to_string()) {
            continue;
        }
        links.push(DiscoveredLink {
            kind: classify_link(&url, base),
            nofollow: a
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("nofollow"))),
            url,
        });
    }
    links
}

pub struct LinksAnalyzer;

static CHECKS: &[Check] = &[
    Check { id: "LINKS_REACHABLE", run: check_broken },
    Check { id: "LINKS_INTERNAL", run: check_internal },
    Check { id: "LINKS_ANCHOR_TEXT", run: check_anchor_text },
    Check { id: "LINKS_CRAWLABLE", run: check_crawlable },
];

impl Analyzer for LinksAnalyzer {
    fn category(&self) -> Category {
        Category::Links
    }

    fn checks(&self) -> &'static [Check] {
        CHECKS
    }
}

fn check_broken(input: &AnalysisInput<'_>) -> CheckOutcome {
    let checks = &input.aux.link_checks;
    if checks.is_empty() {
        return CheckOutcome::not_applicable();
    }
    let broken: Vec<String> = checks
        .iter()
        .filter_map(|c| match &c.status {
            LinkStatus::Broken { status: Some(code), .. } => Some(format!("{} ({})", c.url, code)),
            LinkStatus::Broken { reason, .. } => Some(format!("{} ({})", c.url, reason)),
            _ => None,
        })
        .collect();
    let known = checks
        .iter()
        .filter(|c| !matches!(c.status, LinkStatus::Unknown { .. }))
        .count();
    if known == 0 {
        return CheckOutcome::unknown(format!(
            "None of the {} sampled links could be checked in time",
            checks.len()
        ));
    }
    if broken.is_empty() {
        return CheckOutcome::pass(format!("All {} checked links are reachable", known));
    }

    let mut listed = broken.iter().take(MAX_LISTED_BROKEN).cloned().collect::<Vec<_>>().join(", ");
    if broken.len() > MAX_LISTED_BROKEN {
        listed.push_str(&format!(" and {} more", broken.len() - MAX_LISTED_BROKEN));
    }
    CheckOutcome::partial(
        "LINKS_BROKEN",
        broken.len() as f64 / known as f64,
        format!("{} of {} checked links are broken: {}", broken.len(), known, listed),
    )
}

fn check_internal(input: &AnalysisInput<'_>) -> CheckOutcome {
    let links = discover_links(input.page, &input.resource.final_url);
    let internal = links.iter().filter(|l| l.kind == LinkKind::Internal).count();
    let external = links.len() - internal;
    let nofollow = links.iter().filter(|l| l.nofollow).count();
    if internal == 0 {
        CheckOutcome::fail(
            "LINKS_NO_INTERNAL",
            format!("No internal links found ({} external)", external),
        )
    } else {
        CheckOutcome::pass(format!(
            "{} internal and {} external links ({} nofollow)",
            internal, external, nofollow
        ))
    }
}

fn check_anchor_text(input: &AnalysisInput<'_>) -> CheckOutcome {
    let navigable: Vec<&PageElement> = anchors(input.page)
        .into_iter()
        .filter(|a| a.attr("href").is_some_and(is_navigable))
        .collect();
    if navigable.is_empty() {
        return CheckOutcome::not_applicable();
    }
    let poor = navigable
        .iter()
        .filter(|a| {
            let text = a.clean_text().to_lowercase();
            let labelled = a.attr("aria-label").is_some_and(|l| !l.trim().is_empty())
                || a.attr("title").is_some_and(|t| !t.trim().is_empty());
            (text.is_empty() && !labelled) || GENERIC_ANCHORS.contains(&text.as_str())
        })
        .count();
    if poor == 0 {
        CheckOutcome::pass("Links use descriptive anchor text")
    } else {
        CheckOutcome::partial(
            "LINKS_GENERIC_ANCHOR_TEXT",
            poor as f64 / navigable.len() as f64,
            format!("{} of {} links have empty or generic anchor text", poor, navigable.len()),
        )
    }
}

fn check_crawlable(input: &AnalysisInput<'_>) -> CheckOutcome {
    let all = input.page.find_all("a", &[]);
    if all.is_empty() {
        return CheckOutcome::not_applicable();
    }
    let uncrawlable = all
        .iter()
        .filter(|a| match a.attr("href") {
            None => false,
            Some(href) => {
                let href = href.trim().to_ascii_lowercase();
                href.is_empty() || href.starts_with("javascript:")
            }
        })
        .count();
    if uncrawlable == 0 {
        CheckOutcome::pass("All links have crawlable href targets")
    } else {
        CheckOutcome::partial(
            "LINKS_UNCRAWLABLE",
            uncrawlable as f64 / all.len() as f64,
            format!("{} of {} links use empty or javascript: hrefs", uncrawlable, all.len()),
        )
    }
}
