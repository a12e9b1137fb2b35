//! Link scoring: which outbound link most likely leads to company background
//!
//! A link becomes a [`LinkCandidate`] when a keyword appears in its resolved
//! URL path (score 0) or, failing that, in its anchor text (score 1). The best
//! candidate is the lowest `(score, depth)`; document order breaks ties.

use tracing::debug;
use url::Url;

use crate::document::PageLink;
use crate::url_utils::{name_tokens, path_depth, same_document};

/// Keywords for the narrower about/history fallback
const ABOUT_KEYWORD: &str = "about";
const HISTORY_KEYWORD: &str = "history";

/// Anchor-text words that still describe a page about the site's own company
const GENERIC_ABOUT_WORDS: &[&str] = &[
    "about", "us", "our", "the", "company", "who", "we", "are", "more", "learn", "corporate",
    "firm", "story", "overview", "info", "information", "me", "&", "and",
];

/// A link that qualified for following
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    /// Absolute target URL
    pub url: Url,
    /// 0 = keyword in the URL path, 1 = keyword only in the anchor text
    pub score: u8,
    /// Number of `/` in the URL path
    pub depth: usize,
    /// Keyword that qualified the link
    pub keyword: String,
}

impl LinkCandidate {
    fn rank(&self) -> (u8, usize) {
        (self.score, self.depth)
    }
}

/// Ranks outbound links against a keyword set
#[derive(Debug, Clone)]
pub struct InfoPageLocator {
    keywords: Vec<String>,
}

impl InfoPageLocator {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// All qualifying links in document order
    pub fn candidates(&self, base_url: &Url, links: &[PageLink]) -> Vec<LinkCandidate> {
        links
            .iter()
            .filter_map(|link| {
                let target = resolve_link(base_url, &link.href)?;
                let (score, keyword) = match_keywords(&self.keywords, &target, &link.text)?;
                Some(LinkCandidate {
                    depth: path_depth(&target),
                    url: target,
                    score,
                    keyword: keyword.to_string(),
                })
            })
            .collect()
    }

    /// Pick the link most likely to lead to company background information
    pub fn locate_info_page(&self, base_url: &Url, links: &[PageLink]) -> Option<Url> {
        let best = best_candidate(self.candidates(base_url, links))?;
        debug!(
            "Info page for {}: {} (keyword '{}', score {}, depth {})",
            base_url, best.url, best.keyword, best.score, best.depth
        );
        Some(best.url)
    }

    /// Pick an "about" or "history" link that belongs to the site's own company.
    ///
    /// "history" links qualify like any other keyword match. An "about" anchor
    /// must otherwise read as generic filler or name the company itself, so
    /// footer links such as "About OtherBrand" are ignored. An "about" link
    /// whose anchor does not say "about" qualifies when the anchor text or the
    /// URL path carries one of the company's name tokens.
    pub fn locate_about_or_history_link(
        &self,
        base_url: &Url,
        links: &[PageLink],
        company_name: Option<&str>,
    ) -> Option<Url> {
        let best = self
            .about_or_history_candidates(base_url, links, company_name)
            .into_iter()
            .next()?;
        debug!(
            "About/history page for {}: {} (keyword '{}', score {}, depth {})",
            base_url, best.url, best.keyword, best.score, best.depth
        );
        Some(best.url)
    }

    /// Every qualifying about/history link, best first; document order breaks ties
    pub fn about_or_history_candidates(
        &self,
        base_url: &Url,
        links: &[PageLink],
        company_name: Option<&str>,
    ) -> Vec<LinkCandidate> {
        let own_tokens = company_name.map(name_tokens).unwrap_or_default();

        let mut candidates: Vec<LinkCandidate> = links
            .iter()
            .filter_map(|link| {
                let target = resolve_link(base_url, &link.href)?;
                let path = target.path().to_lowercase();
                let text = link.text.to_lowercase();
                let (score, keyword) = [ABOUT_KEYWORD, HISTORY_KEYWORD]
                    .into_iter()
                    .filter_map(|k| {
                        let score = keyword_score(k, &path, &text)?;
                        if k == ABOUT_KEYWORD && !is_own_about_link(&text, &path, &own_tokens) {
                            debug!("Skipping about link {} ('{}'): not about this company", target, link.text);
                            return None;
                        }
                        Some((score, k))
                    })
                    .min_by_key(|(score, _)| *score)?;
                Some(LinkCandidate {
                    depth: path_depth(&target),
                    url: target,
                    score,
                    keyword: keyword.to_string(),
                })
            })
            .collect();

        // Stable, so equal ranks keep document order
        candidates.sort_by_key(LinkCandidate::rank);
        candidates
    }
}

/// Lowest `(score, depth)`, earliest in document order on ties
fn best_candidate<I>(candidates: I) -> Option<LinkCandidate>
where
    I: IntoIterator<Item = LinkCandidate>,
{
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if current.rank() <= candidate.rank() => Some(current),
        _ => Some(candidate),
    })
}

/// Resolve `href` against `base_url`, keeping only http(s) links to other documents
fn resolve_link(base_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let target = base_url.join(href).ok()?;
    if !matches!(target.scheme(), "http" | "https") {
        return None;
    }
    if same_document(&target, base_url) {
        return None;
    }
    Some(target)
}

/// Score a link against `keywords`: any path match first, then anchor text
fn match_keywords<'k>(keywords: &'k [String], target: &Url, text: &str) -> Option<(u8, &'k str)> {
    let path = target.path().to_lowercase();
    let text = text.to_lowercase();
    keywords
        .iter()
        .filter_map(|k| keyword_score(k, &path, &text).map(|score| (score, k.as_str())))
        .min_by_key(|(score, _)| *score)
}

/// 0 when `keyword` is in the lowercased path, 1 when only in the lowercased anchor text
fn keyword_score(keyword: &str, path: &str, text: &str) -> Option<u8> {
    if path.contains(keyword) {
        Some(0)
    } else if !text.is_empty() && (text.contains(keyword) || text.contains(&keyword.replace('-', " "))) {
        Some(1)
    } else {
        None
    }
}

/// Does an "about" link describe the site's own company?
///
/// With "about" in the anchor, the rest of the anchor decides. Without it,
/// a company-name token in the anchor text or the path is required.
fn is_own_about_link(anchor_text: &str, path: &str, own_tokens: &[String]) -> bool {
    let text = anchor_text.to_lowercase();

    if !text.contains(ABOUT_KEYWORD) {
        return names_company(&words(&text), own_tokens) || names_company(&words(path), own_tokens);
    }

    let remaining: Vec<&str> = words(&text)
        .into_iter()
        .filter(|w| !GENERIC_ABOUT_WORDS.contains(w))
        .collect();

    remaining.is_empty() || names_company(&remaining, own_tokens)
}

fn words(s: &str) -> Vec<&str> {
    s.split(|c: char| !c.is_alphanumeric() && c != '&')
        .filter(|w| !w.is_empty())
        .collect()
}

fn names_company(words: &[&str], own_tokens: &[String]) -> bool {
    words.iter().any(|w| own_tokens.iter().any(|t| t.as_str() == *w))
}
