//! URL and name helpers shared by the loader and the link locator

use url::Url;

/// Corporate suffixes that say nothing about which company a link belongs to
const NAME_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "corp", "corporation", "co", "company", "ltd", "limited",
    "llc", "plc", "lp", "llp", "gmbh", "ag", "sa", "nv", "bv", "holdings", "group", "the",
];

/// Prefix `https://` to URLs that carry no scheme.
///
/// `example.org` becomes `https://example.org`; `http://example.org` is left alone.
pub fn ensure_scheme(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lower = trimmed.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", trimmed)
    }
}

/// Number of `/` separators in the URL path (`/about` = 1, `/company/about` = 2)
pub fn path_depth(url: &Url) -> usize {
    url.path().matches('/').count()
}

/// True when both URLs address the same document, ignoring fragments and a trailing slash
pub fn same_document(a: &Url, b: &Url) -> bool {
    fn key(url: &Url) -> String {
        let mut u = url.clone();
        u.set_fragment(None);
        let s = u.to_string();
        s.trim_end_matches('/').to_string()
    }
    key(a) == key(b)
}

/// Significant lowercase tokens of a company name.
///
/// `"Acme Semiconductor, Inc."` yields `["acme", "semiconductor"]`.
pub fn name_tokens(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= 2 && !NAME_SUFFIXES.contains(&t.as_str()))
        .collect()
}
