// src/core/analyzers/speed.rs

//! Speed: how long the page took, how heavy it is, and what blocks rendering.

use crate::core::analyzers::{AnalysisInput, Analyzer, Check, CheckOutcome};
use crate::core::models::Category;
use crate::core::page::AttrMatch;

const FAST_RESPONSE_MS: u64 = 1_000;
const SLOW_RESPONSE_MS: u64 = 2_000;
const LARGE_PAGE_BYTES: usize = 1024 * 1024;
const HEAVY_PAGE_BYTES: usize = 3 * 1024 * 1024;
const MAX_RESOURCES: usize = 20;
const MAX_BLOCKING_SCRIPTS: usize = 4;

pub struct SpeedAnalyzer;

static CHECKS: &[Check] = &[
    Check { id: "SPEED_RESPONSE_TIME", run: check_response_time },
    Check { id: "SPEED_PAGE_SIZE", run: check_page_size },
    Check { id: "SPEED_RESOURCE_COUNT", run: check_resource_count },
    Check { id: "SPEED_RENDER_BLOCKING", run: check_render_blocking },
];

impl Analyzer for SpeedAnalyzer {
    fn category(&self) -> Category {
        Category::Speed
    }

    fn checks(&self) -> &'static [Check] {
        CHECKS
    }
}

fn check_response_time(input: &AnalysisInput<'_>) -> CheckOutcome {
    let ms = input.resource.elapsed_ms;
    let secs = ms as f64 / 1000.0;
    if ms <= FAST_RESPONSE_MS {
        CheckOutcome::pass(format!("Fast response time: {:.2}s", secs))
    } else if ms <= SLOW_RESPONSE_MS {
        CheckOutcome::partial("SPEED_RESPONSE_MODERATE", 0.5, format!("Moderate response time: {:.2}s", secs))
    } else {
        CheckOutcome::fail("SPEED_RESPONSE_SLOW", format!("Slow response time: {:.2}s", secs))
    }
}

fn check_page_size(input: &AnalysisInput<'_>) -> CheckOutcome {
    let bytes = input.resource.byte_size;
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if bytes > HEAVY_PAGE_BYTES {
        CheckOutcome::fail("SPEED_PAGE_HEAVY", format!("Page size is large: {:.2}MB", mb))
    } else if bytes > LARGE_PAGE_BYTES {
        CheckOutcome::partial("SPEED_PAGE_LARGE", 0.5, format!("Page size is above 1MB: {:.2}MB", mb))
    } else {
        CheckOutcome::pass(format!("Page size: {:.1}KB", bytes as f64 / 1024.0))
    }
}

fn check_resource_count(input: &AnalysisInput<'_>) -> CheckOutcome {
    let scripts = input.page.find_all("script", &[("src", AttrMatch::Present)]).len();
    let styles = input
        .page
        .find_all("link", &[("rel", AttrMatch::HasToken("stylesheet")), ("href", AttrMatch::Present)])
        .len();
    let total = scripts + styles;
    if total <= MAX_RESOURCES {
        CheckOutcome::pass(format!("{} external scripts and {} stylesheets", scripts, styles))
    } else {
        CheckOutcome::partial(
            "SPEED_TOO_MANY_RESOURCES",
            (total - MAX_RESOURCES) as f64 / MAX_RESOURCES as f64,
            format!(
                "Page loads {} external resources ({} scripts, {} stylesheets)",
                total, scripts, styles
            ),
        )
    }
}

fn check_render_blocking(input: &AnalysisInput<'_>) -> CheckOutcome {
    let blocking = input
        .page
        .find_all("script", &[("src", AttrMatch::Present)])
        .into_iter()
        .filter(|s| s.in_head)
        .filter(|s| s.attr("async").is_none() && s.attr("defer").is_none())
        .filter(|s| !s.attr("type").is_some_and(|t| t.trim().eq_ignore_ascii_case("module")))
        .count();
    if blocking == 0 {
        CheckOutcome::pass("No render-blocking scripts in the document head")
    } else {
        CheckOutcome::partial(
            "SPEED_RENDER_BLOCKING_SCRIPTS",
            blocking as f64 / MAX_BLOCKING_SCRIPTS as f64,
            format!("{} render-blocking scripts in <head> without async or defer", blocking),
        )
    }
}
