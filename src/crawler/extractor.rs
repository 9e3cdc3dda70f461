//! Readable-text extraction
//!
//! [`Extractor`] is the seam for a readability implementation. The crate
//! ships [`ReadableTextExtractor`], a main-content heuristic built on
//! `scraper` that is good enough for article-style pages.

use crate::crawler::parser::extract_title;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Readable content of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: Option<String>,
    pub text_content: String,
}

/// Turns page markup into readable text
pub trait Extractor: Send + Sync {
    /// Returns `None` if the page has no readable content
    fn parse(&self, markup: &str, base_url: &Url) -> Option<Article>;
}

/// Candidate content roots, most specific first
const CONTENT_ROOTS: &[&str] = &["article", "main", "[role=main]", "body"];

/// Elements whose text is never part of the readable content
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside", "form",
];

/// Main-content heuristic
///
/// Picks the first of `article`, `main`, `[role=main]` and `body` that holds
/// any text, and collects its text while skipping scripts, styles,
/// navigation, headers, footers, asides and forms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadableTextExtractor;

impl Extractor for ReadableTextExtractor {
    fn parse(&self, markup: &str, _base_url: &Url) -> Option<Article> {
        let document = Html::parse_document(markup);

        for root in CONTENT_ROOTS {
            let Ok(selector) = Selector::parse(root) else {
                continue;
            };
            let Some(element) = document.select(&selector).next() else {
                continue;
            };

            let text = readable_text(element);
            if !text.is_empty() {
                return Some(Article {
                    title: extract_title(&document),
                    text_content: text,
                });
            }
        }

        None
    }
}

/// Collects the visible text below `root`, whitespace collapsed
fn readable_text(root: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();

    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != root.id())
            .filter_map(|ancestor| ancestor.value().as_element())
            .any(|element| SKIPPED_ELEMENTS.contains(&element.name()));

        if !hidden {
            pieces.push(&**text);
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

/// Replaces every run of whitespace with a single space and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
