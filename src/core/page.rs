// src/core/page.rs

//! The typed query interface analyzers use to inspect HTML.
//!
//! `scraper` is only touched here. A document is walked once into an owned
//! `ParsedPage` that is `Send + Sync`, so one parse can be shared by every
//! analyzer of an audit.

use std::collections::BTreeMap;

use scraper::{Html, Node, Selector};
use tracing::debug;

/// Tags whose text content is kept. Text of other elements is not needed by
/// any check and would be quadratic to collect for deeply nested markup.
const TEXT_TAGS: &[&str] = &["title", "h1", "h2", "h3", "h4", "h5", "h6", "a", "script"];

/// Elements whose text is never visible to a reader.
const HIDDEN_TEXT_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// One element of the document with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    /// Concatenated descendant text, kept only for `TEXT_TAGS`.
    pub text: String,
    pub in_head: bool,
}

impl PageElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Text with runs of whitespace collapsed to single spaces.
    pub fn clean_text(&self) -> String {
        clean_text(&self.text)
    }
}

/// How an attribute must look for an element to match a query.
#[derive(Debug, Clone, Copy)]
pub enum AttrMatch<'a> {
    Present,
    /// Case-insensitive equality.
    Equals(&'a str),
    /// Case-insensitive prefix.
    Prefix(&'a str),
    /// Whitespace-separated token list containing the value, like `rel`.
    HasToken(&'a str),
}

impl AttrMatch<'_> {
    fn matches(&self, value: &str) -> bool {
        match self {
            AttrMatch::Present => true,
            AttrMatch::Equals(expected) => value.trim().eq_ignore_ascii_case(expected),
            AttrMatch::Prefix(prefix) => value
                .trim()
                .to_ascii_lowercase()
                .starts_with(&prefix.to_ascii_lowercase()),
            AttrMatch::HasToken(token) => value
                .split_ascii_whitespace()
                .any(|t| t.eq_ignore_ascii_case(token)),
        }
    }
}

/// Queryable view of a page. Analyzers depend on this, not on a parser type.
pub trait PageQuery: Send + Sync {
    /// Elements named `tag` (or any element for `"*"`) whose attributes satisfy
    /// every constraint, in document order.
    fn find_all(&self, tag: &str, attrs: &[(&str, AttrMatch<'_>)]) -> Vec<&PageElement>;

    /// Text a reader would see, whitespace-collapsed.
    fn visible_text(&self) -> &str;

    fn find_first(&self, tag: &str, attrs: &[(&str, AttrMatch<'_>)]) -> Option<&PageElement> {
        self.find_all(tag, attrs).into_iter().next()
    }

    fn count(&self, tag: &str) -> usize {
        self.find_all(tag, &[]).len()
    }
}

/// An HTML document flattened into elements in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    elements: Vec<PageElement>,
    visible_text: String,
}

impl ParsedPage {
    /// Parses `html`. Never fails: malformed markup is repaired by the
    /// HTML5 tree builder the same way a browser would.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut elements = Vec::new();

        // `*` is a valid selector; parse cannot fail.
        if let Ok(all) = Selector::parse("*") {
            for el in document.select(&all) {
                let value = el.value();
                let tag = value.name().to_string();
                let text = if TEXT_TAGS.contains(&tag.as_str()) {
                    el.text().collect::<String>()
                } else {
                    String::new()
                };
                let in_head = el.ancestors().any(|node| {
                    node.value()
                        .as_element()
                        .is_some_and(|parent| parent.name() == "head")
                });
                elements.push(PageElement {
                    attrs: value
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    tag,
                    text,
                    in_head,
                });
            }
        }

        let mut raw_text = String::new();
        for node in document.root_element().descendants() {
            if let Node::Text(text) = node.value() {
                let hidden = node.ancestors().any(|parent| {
                    parent
                        .value()
                        .as_element()
                        .is_some_and(|e| HIDDEN_TEXT_TAGS.contains(&e.name()))
                });
                if !hidden {
                    raw_text.push_str(text);
                    raw_text.push(' ');
                }
            }
        }

        debug!(elements = elements.len(), "Parsed HTML document.");
        Self {
            elements,
            visible_text: clean_text(&raw_text),
        }
    }
}

impl PageQuery for ParsedPage {
    fn find_all(&self, tag: &str, attrs: &[(&str, AttrMatch<'_>)]) -> Vec<&PageElement> {
        self.elements
            .iter()
            .filter(|el| tag == "*" || el.tag.eq_ignore_ascii_case(tag))
            .filter(|el| {
                attrs.iter().all(|(name, matcher)| {
                    el.attr(&name.to_ascii_lowercase())
                        .is_some_and(|value| matcher.matches(value))
                })
            })
            .collect()
    }

    fn visible_text(&self) -> &str {
        &self.visible_text
    }
}

/// Collapses whitespace runs and trims.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <title>  Rust   audits </title>
  <meta name="Description" content="A page">
  <meta property="og:title" content="T">
  <meta property="og:image" content="i.png">
  <link rel="stylesheet canonical" href="/c">
  <script src="/head.js"></script>
  <style>body { color: red }</style>
</head>
<body>
  <h1>Hello</h1>
  <p>Visible <b>words</b> here</p>
  <script>var hidden = "not text";</script>
  <a href="/x">Go</a>
</body>
</html>"#;

    #[test]
    fn test_find_all_by_tag_and_attribute() {
        let page = ParsedPage::parse(PAGE);
        assert_eq!(page.find_all("meta", &[("property", AttrMatch::Prefix("og:"))]).len(), 2);
        assert!(page.find_first("meta", &[("name", AttrMatch::Equals("description"))]).is_some());
        assert!(page.find_first("link", &[("rel", AttrMatch::HasToken("canonical"))]).is_some());
        assert!(page.find_first("link", &[("rel", AttrMatch::Equals("canonical"))]).is_none());
    }

    #[test]
    fn test_text_is_collected_for_text_tags() {
        let page = ParsedPage::parse(PAGE);
        let title = page.find_first("title", &[]).unwrap();
        assert_eq!(title.clean_text(), "Rust audits");
        assert_eq!(page.find_first("a", &[]).unwrap().text, "Go");
    }

    #[test]
    fn test_head_membership() {
        let page = ParsedPage::parse(PAGE);
        let scripts = page.find_all("script", &[]);
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].in_head);
        assert!(!scripts[1].in_head);
    }

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let page = ParsedPage::parse(PAGE);
        let text = page.visible_text();
        assert!(text.contains("Visible words here"));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color"));
        assert!(!text.contains("Rust audits"));
    }

    #[test]
    fn test_garbage_input_still_parses() {
        let page = ParsedPage::parse("<<<>>> not really <html");
        assert_eq!(page.count("title"), 0);
        assert!(page.count("*") >= 1);
    }
}
