//! Structured view of a fetched HTML page
//!
//! The pipeline never walks the DOM itself. It sees a page only through
//! [`PageDocument`]:
//! - the `<title>` text
//! - the ordered `(href, anchor text)` pairs
//! - the meta description
//! - the first paragraph
//! - the visible text
//!
//! `scraper::Html` is not `Send`, so everything is copied out eagerly and the
//! parsed tree is dropped before the caller awaits again.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

// Safety: the selector strings are compile-time constants with valid CSS syntax.
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

static META_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="description"], meta[name="Description"]"#).unwrap()
});

static PARAGRAPH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Elements whose text never reaches the reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// An outbound link in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Raw `href` attribute, unresolved
    pub href: String,
    /// Visible anchor text, whitespace collapsed
    pub text: String,
}

impl PageLink {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
        }
    }
}

/// Owned, `Send` snapshot of the parts of a page the extractors use
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDocument {
    pub title: Option<String>,
    pub links: Vec<PageLink>,
    pub meta_description: Option<String>,
    pub first_paragraph: Option<String>,
    /// Visible text with whitespace collapsed to single spaces
    pub text: String,
}

impl PageDocument {
    /// Parse an HTML document
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let title = document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|t| !t.is_empty());

        let links = document
            .select(&ANCHOR_SELECTOR)
            .filter_map(|el| {
                let href = el.value().attr("href")?.trim();
                if href.is_empty() {
                    return None;
                }
                Some(PageLink::new(href, element_text(&el)))
            })
            .collect();

        let meta_description = document
            .select(&META_DESCRIPTION_SELECTOR)
            .filter_map(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .find(|c| !c.is_empty());

        let first_paragraph = document
            .select(&PARAGRAPH_SELECTOR)
            .next()
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty());

        let text = match document.select(&BODY_SELECTOR).next() {
            Some(body) => visible_text(body),
            None => visible_text(document.root_element()),
        };

        Self {
            title,
            links,
            meta_description,
            first_paragraph,
            text,
        }
    }
}

fn element_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of `root` and its descendants, skipping scripts, styles and the like
fn visible_text(root: ElementRef) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// Collapse runs of whitespace to a single space and trim the ends
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
