// src/core/analyzers/content.rs

//! Content Quality: headings, amount of text, images and keyword usage.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::analyzers::{AnalysisInput, Analyzer, Check, CheckOutcome};
use crate::core::models::Category;
use crate::core::page::AttrMatch;

const MIN_WORDS: usize = 300;
const KEYWORD_MIN_LEN: usize = 4;
const TOP_KEYWORDS: usize = 5;
const STUFFING_DENSITY: f64 = 5.0;
const STUFFING_MIN_WORDS: usize = 100;
const LEGACY_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

pub struct ContentAnalyzer;

static CHECKS: &[Check] = &[
    Check { id: "CONTENT_H1", run: check_h1 },
    Check { id: "CONTENT_HEADING_ORDER", run: check_heading_order },
    Check { id: "CONTENT_WORD_COUNT", run: check_word_count },
    Check { id: "CONTENT_IMAGE_ALT", run: check_image_alt },
    Check { id: "CONTENT_IMAGE_FORMAT", run: check_image_format },
    Check { id: "CONTENT_KEYWORD_DENSITY", run: check_keyword_density },
];

impl Analyzer for ContentAnalyzer {
    fn category(&self) -> Category {
        Category::Content
    }

    fn checks(&self) -> &'static [Check] {
        CHECKS
    }
}

/// Lowercased word tokens of `text`.
pub fn words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A keyword and its share of all words, in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordDensity {
    pub word: String,
    pub count: usize,
    pub density: f64,
}

/// The most frequent words longer than three characters. Ties are broken
/// alphabetically so the ranking is stable.
pub fn top_keywords(words: &[String], limit: usize) -> Vec<KeywordDensity> {
    if words.is_empty() {
        return Vec::new();
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for w in words.iter().filter(|w| w.chars().count() >= KEYWORD_MIN_LEN) {
        *counts.entry(w.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(word, count)| KeywordDensity {
            word: word.to_string(),
            count,
            density: count as f64 / words.len() as f64 * 100.0,
        })
        .collect()
}

fn heading_levels(input: &AnalysisInput<'_>) -> Vec<u8> {
    input
        .page
        .find_all("*", &[])
        .into_iter()
        .filter_map(|el| match el.tag.as_str() {
            "h1" => Some(1),
            "h2" => Some(2),
            "h3" => Some(3),
            "h4" => Some(4),
            "h5" => Some(5),
            "h6" => Some(6),
            _ => None,
        })
        .collect()
}

fn check_h1(input: &AnalysisInput<'_>) -> CheckOutcome {
    match input.page.count("h1") {
        0 => CheckOutcome::fail("CONTENT_H1_MISSING", "Missing H1 heading tag"),
        1 => CheckOutcome::pass("Page has exactly one H1 heading"),
        n => CheckOutcome::partial(
            "CONTENT_H1_MULTIPLE",
            0.5,
            format!("Multiple H1 tags found ({}); use a single H1 per page", n),
        ),
    }
}

fn check_heading_order(input: &AnalysisInput<'_>) -> CheckOutcome {
    let levels = heading_levels(input);
    if levels.is_empty() {
        return CheckOutcome::not_applicable();
    }
    let skips: Vec<String> = levels
        .windows(2)
        .filter(|pair| pair[1] > pair[0] + 1)
        .map(|pair| format!("H{} -> H{}", pair[0], pair[1]))
        .collect();
    if skips.is_empty() {
        CheckOutcome::pass(format!("Heading structure is sequential ({} headings)", levels.len()))
    } else {
        CheckOutcome::fail(
            "CONTENT_HEADING_SKIPPED",
            format!("Heading levels are skipped: {}", skips.join(", ")),
        )
    }
}

fn check_word_count(input: &AnalysisInput<'_>) -> CheckOutcome {
    let count = words(input.page.visible_text()).len();
    if count >= MIN_WORDS {
        CheckOutcome::pass(format!("Page has {} words of content", count))
    } else {
        CheckOutcome::partial(
            "CONTENT_THIN",
            1.0 - count as f64 / MIN_WORDS as f64,
            format!("Thin content: only {} words (recommended: at least {})", count, MIN_WORDS),
        )
    }
}

fn check_image_alt(input: &AnalysisInput<'_>) -> CheckOutcome {
    let images = input.page.find_all("img", &[]);
    if images.is_empty() {
        return CheckOutcome::not_applicable();
    }
    let missing = images.iter().filter(|img| img.attr("alt").is_none()).count();
    if missing == 0 {
        CheckOutcome::pass(format!("All {} images have alt text", images.len()))
    } else {
        CheckOutcome::partial(
            "CONTENT_IMAGES_MISSING_ALT",
            missing as f64 / images.len() as f64,
            format!("{} of {} images are missing alt text", missing, images.len()),
        )
    }
}

fn extension(src: &str) -> Option<String> {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

fn check_image_format(input: &AnalysisInput<'_>) -> CheckOutcome {
    let sources: Vec<&str> = input
        .page
        .find_all("img", &[("src", AttrMatch::Present)])
        .into_iter()
        .filter_map(|img| img.attr("src"))
        .filter(|src| !src.trim().starts_with("data:"))
        .collect();
    if sources.is_empty() {
        return CheckOutcome::not_applicable();
    }
    let legacy = sources
        .iter()
        .filter(|src| extension(src).is_some_and(|ext| LEGACY_IMAGE_EXTENSIONS.contains(&ext.as_str())))
        .count();
    if legacy == 0 {
        CheckOutcome::pass("Images use modern formats")
    } else {
        CheckOutcome::partial(
            "CONTENT_IMAGES_UNOPTIMIZED",
            legacy as f64 / sources.len() as f64,
            format!("{} of {} images use legacy formats (PNG/JPEG/GIF/BMP)", legacy, sources.len()),
        )
    }
}

fn check_keyword_density(input: &AnalysisInput<'_>) -> CheckOutcome {
    let words = words(input.page.visible_text());
    let keywords = top_keywords(&words, TOP_KEYWORDS);
    let Some(top) = keywords.first() else {
        return CheckOutcome::not_applicable();
    };
    let summary = keywords
        .iter()
        .map(|k| format!("{} ({:.1}%)", k.word, k.density))
        .collect::<Vec<_>>()
        .join(", ");

    if words.len() >= STUFFING_MIN_WORDS && top.density > STUFFING_DENSITY {
        CheckOutcome::fail(
            "CONTENT_KEYWORD_STUFFING",
            format!(
                "Keyword \"{}\" makes up {:.1}% of the text; top keywords: {}",
                top.word, top.density, summary
            ),
        )
    } else {
        CheckOutcome::pass(format!("Top keywords: {}", summary))
    }
}
