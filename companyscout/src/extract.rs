//! Field extractors
//!
//! Every extractor is a pure function of page content. Where a field has more
//! than one way of being found, the ways are listed as an ordered rule table
//! and the first rule that yields a value wins.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ClassificationConfig, RegionConfig};
use crate::document::{collapse_whitespace, PageDocument};
use crate::record::ExtractedFields;

// Safety: compile-time constant patterns.
static FOUNDING_KEYWORD_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:founded|established)[^0-9]{0,40}?([0-9]{4})").unwrap());

static LOOSE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)[0-9]{2}\b").unwrap());

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// A named way of deriving a value from `I`
pub struct Rule<I: ?Sized + 'static> {
    pub name: &'static str,
    pub apply: fn(&I) -> Option<String>,
}

/// Established year, most specific rule first.
///
/// `loose-year` takes the first 19xx/20xx token anywhere on the page. It also
/// picks up copyright years and similar numbers; that recall/precision trade
/// is deliberate and kept.
pub const ESTABLISHED_YEAR_RULES: &[Rule<str>] = &[
    Rule {
        name: "founding-keyword",
        apply: founding_keyword_year,
    },
    Rule {
        name: "loose-year",
        apply: first_plausible_year,
    },
];

/// Website description, most specific rule first
pub const DESCRIPTION_RULES: &[Rule<PageDocument>] = &[
    Rule {
        name: "meta-description",
        apply: meta_description,
    },
    Rule {
        name: "first-paragraph",
        apply: first_paragraph,
    },
];

/// Run `rules` in order and return the first value along with the rule that produced it
pub fn apply_rules<I: ?Sized + 'static>(rules: &[Rule<I>], input: &I) -> Option<(&'static str, String)> {
    rules
        .iter()
        .find_map(|rule| (rule.apply)(input).map(|value| (rule.name, value)))
}

fn founding_keyword_year(text: &str) -> Option<String> {
    FOUNDING_KEYWORD_YEAR
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn first_plausible_year(text: &str) -> Option<String> {
    LOOSE_YEAR.find(text).map(|m| m.as_str().to_string())
}

fn meta_description(doc: &PageDocument) -> Option<String> {
    doc.meta_description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

fn first_paragraph(doc: &PageDocument) -> Option<String> {
    doc.first_paragraph
        .as_deref()
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
}

/// Founding year, e.g. "1999" from "Acme was Founded in 1999"
pub fn extract_established_year(text: &str) -> Option<String> {
    apply_rules(ESTABLISHED_YEAR_RULES, text).map(|(_, year)| year)
}

/// Meta description, else the first paragraph
pub fn extract_description(doc: &PageDocument) -> Option<String> {
    apply_rules(DESCRIPTION_RULES, doc).map(|(_, description)| description)
}

/// Split text into sentences after `.`, `!` or `?` followed by whitespace
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        // keep the punctuation with its sentence
        let end = m.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Matches sentences that mention a region by name or abbreviation
#[derive(Debug, Clone)]
pub struct RegionMatcher {
    name: String,
    abbreviation: Option<Regex>,
}

impl RegionMatcher {
    pub fn new(name: &str, abbreviation: Option<&str>) -> Self {
        let abbreviation = abbreviation
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .and_then(|a| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(a))).ok());
        Self {
            name: name.trim().to_lowercase(),
            abbreviation,
        }
    }

    pub fn from_config(config: &RegionConfig) -> Self {
        Self::new(&config.name, config.abbreviation.as_deref())
    }

    /// Name as a case-insensitive substring, abbreviation as a case-insensitive whole word
    pub fn matches(&self, sentence: &str) -> bool {
        sentence.to_lowercase().contains(&self.name)
            || self
                .abbreviation
                .as_ref()
                .map(|re| re.is_match(sentence))
                .unwrap_or(false)
    }
}

/// Every sentence mentioning the region, in order, joined by single spaces
pub fn extract_region_mentions(text: &str, region: &RegionMatcher) -> Option<String> {
    let matching: Vec<&str> = split_sentences(text)
        .into_iter()
        .filter(|s| region.matches(s))
        .collect();
    if matching.is_empty() {
        None
    } else {
        Some(matching.join(" "))
    }
}

/// A supply-chain role and its lowercase keywords
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRule {
    pub role: String,
    pub keywords: Vec<String>,
}

/// Ordered role table; earlier roles win when several match
#[derive(Debug, Clone)]
pub struct Classifier {
    roles: Vec<RoleRule>,
}

impl Classifier {
    pub fn new(roles: Vec<RoleRule>) -> Self {
        let roles = roles
            .into_iter()
            .map(|r| RoleRule {
                role: r.role,
                keywords: r
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        Self { roles }
    }

    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self::new(
            config
                .roles
                .iter()
                .map(|r| RoleRule {
                    role: r.role.clone(),
                    keywords: r.keywords.clone(),
                })
                .collect(),
        )
    }

    /// First role, in declared order, with any keyword contained in `text`
    pub fn classify(&self, text: &str) -> Option<String> {
        let text = text.to_lowercase();
        self.roles
            .iter()
            .find(|r| r.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|r| r.role.clone())
    }
}

/// All four extractors, configured once and shared by every worker
#[derive(Debug, Clone)]
pub struct FieldExtractors {
    region: RegionMatcher,
    classifier: Classifier,
}

impl FieldExtractors {
    pub fn new(region: RegionMatcher, classifier: Classifier) -> Self {
        Self { region, classifier }
    }

    pub fn from_config(region: &RegionConfig, classification: &ClassificationConfig) -> Self {
        Self::new(
            RegionMatcher::from_config(region),
            Classifier::from_config(classification),
        )
    }

    /// Run every extractor over one page
    pub fn extract_all(&self, doc: &PageDocument) -> ExtractedFields {
        ExtractedFields {
            established: extract_established_year(&doc.text),
            region_mentions: extract_region_mentions(&doc.text, &self.region),
            website_description: extract_description(doc),
            classification: self.classify_page(doc),
        }
    }

    /// The meta description is not part of the visible text but often names the business best
    fn classify_page(&self, doc: &PageDocument) -> Option<String> {
        match doc.meta_description.as_deref() {
            Some(meta) => self.classifier.classify(&format!("{} {}", meta, doc.text)),
            None => self.classifier.classify(&doc.text),
        }
    }
}
