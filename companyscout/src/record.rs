use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::url_utils::ensure_scheme;

/// A seed row that cannot be processed. The loader skips it; the batch carries on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MalformedInput {
    #[error("row {row}: URL is empty")]
    EmptyUrl { row: usize },

    #[error("row {row}: URL '{url}' cannot be parsed: {reason}")]
    UnparseableUrl { row: usize, url: String, reason: String },
}

/// The derived fields the pipeline fills in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Established,
    RegionMentions,
    WebsiteDescription,
    Classification,
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordField::Established => "established",
            RecordField::RegionMentions => "region_mentions",
            RecordField::WebsiteDescription => "website_description",
            RecordField::Classification => "classification",
        };
        write!(f, "{}", name)
    }
}

/// Values produced by one extraction pass over one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub established: Option<String>,
    pub region_mentions: Option<String>,
    pub website_description: Option<String>,
    pub classification: Option<String>,
}

/// One company as read from the seed file, enriched in place by the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompanyRecord {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub location: Option<String>,
    pub location_type: Option<String>,
    pub sales: Option<String>,
    pub sic: Option<String>,
    /// Always carries a scheme
    pub url: String,
    pub phone: Option<String>,
    /// Description supplied with the seed row
    pub description: Option<String>,

    pub established: Option<String>,
    pub region_mentions: Option<String>,
    pub website_description: Option<String>,
    pub classification: Option<String>,
}

impl CompanyRecord {
    /// Create a record for `raw_url`, normalizing a missing scheme to `https://`.
    ///
    /// `row` is only used to label the error.
    pub fn from_url(raw_url: &str, row: usize) -> Result<Self, MalformedInput> {
        let url = normalize_seed_url(raw_url, row)?;
        Ok(Self {
            url,
            ..Default::default()
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        self.name = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        self
    }

    pub fn get(&self, field: RecordField) -> Option<&str> {
        match field {
            RecordField::Established => self.established.as_deref(),
            RecordField::RegionMentions => self.region_mentions.as_deref(),
            RecordField::WebsiteDescription => self.website_description.as_deref(),
            RecordField::Classification => self.classification.as_deref(),
        }
    }

    /// Copy every extracted value whose field is still absent.
    ///
    /// Fields that already hold a value are never touched. Returns the fields
    /// this call filled, in declaration order.
    pub fn fill_missing(&mut self, fields: ExtractedFields) -> Vec<RecordField> {
        let mut filled = Vec::new();
        if fill_slot(&mut self.established, fields.established) {
            filled.push(RecordField::Established);
        }
        if fill_slot(&mut self.region_mentions, fields.region_mentions) {
            filled.push(RecordField::RegionMentions);
        }
        if fill_slot(&mut self.website_description, fields.website_description) {
            filled.push(RecordField::WebsiteDescription);
        }
        if fill_slot(&mut self.classification, fields.classification) {
            filled.push(RecordField::Classification);
        }
        filled
    }

    /// True while any of the background fields the about/history fallback
    /// looks for is still absent. Classification alone does not trigger it.
    pub fn needs_background(&self) -> bool {
        self.established.is_none()
            || self.region_mentions.is_none()
            || self.website_description.is_none()
    }

    /// Number of derived fields holding a value
    pub fn derived_count(&self) -> usize {
        [
            &self.established,
            &self.region_mentions,
            &self.website_description,
            &self.classification,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }
}

fn fill_slot(slot: &mut Option<String>, value: Option<String>) -> bool {
    match (slot.is_none(), value) {
        (true, Some(v)) if !v.trim().is_empty() => {
            *slot = Some(v);
            true
        }
        _ => false,
    }
}

/// Normalize a seed URL: trim, add `https://` when no scheme is present, and
/// make sure the result parses as an absolute http(s) URL.
pub fn normalize_seed_url(raw: &str, row: usize) -> Result<String, MalformedInput> {
    let candidate = ensure_scheme(raw);
    if candidate.is_empty() {
        return Err(MalformedInput::EmptyUrl { row });
    }

    match Url::parse(&candidate) {
        Ok(parsed) if parsed.host_str().map(|h| !h.is_empty()).unwrap_or(false) => Ok(candidate),
        Ok(_) => Err(MalformedInput::UnparseableUrl {
            row,
            url: raw.trim().to_string(),
            reason: "URL has no host".to_string(),
        }),
        Err(e) => Err(MalformedInput::UnparseableUrl {
            row,
            url: raw.trim().to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_is_added_to_bare_domain() {
        let record = CompanyRecord::from_url("example.org", 1).unwrap();
        assert_eq!(record.url, "https://example.org");
    }

    #[test]
    fn test_empty_url_is_malformed() {
        assert_eq!(
            CompanyRecord::from_url("   ", 4).unwrap_err(),
            MalformedInput::EmptyUrl { row: 4 }
        );
    }

    #[test]
    fn test_unparseable_url_is_malformed() {
        let err = CompanyRecord::from_url("http://exa mple.com", 2).unwrap_err();
        assert!(matches!(err, MalformedInput::UnparseableUrl { row: 2, .. }));
    }

    #[test]
    fn test_fill_missing_never_overwrites() {
        let mut record = CompanyRecord::from_url("example.com", 1).unwrap();
        record.established = Some("1999".to_string());

        let filled = record.fill_missing(ExtractedFields {
            established: Some("2005".to_string()),
            classification: Some("Foundry".to_string()),
            ..Default::default()
        });

        assert_eq!(filled, vec![RecordField::Classification]);
        assert_eq!(record.established.as_deref(), Some("1999"));
        assert_eq!(record.classification.as_deref(), Some("Foundry"));
    }

    #[test]
    fn test_fill_missing_is_idempotent() {
        let mut record = CompanyRecord::from_url("example.com", 1).unwrap();
        let fields = ExtractedFields {
            established: Some("1987".to_string()),
            region_mentions: Some("We build in Arizona.".to_string()),
            website_description: None,
            classification: Some("EDA".to_string()),
        };

        record.fill_missing(fields.clone());
        let snapshot = record.clone();
        let second = record.fill_missing(fields);

        assert!(second.is_empty());
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_blank_values_do_not_fill() {
        let mut record = CompanyRecord::default();
        let filled = record.fill_missing(ExtractedFields {
            website_description: Some("   ".to_string()),
            ..Default::default()
        });
        assert!(filled.is_empty());
        assert!(record.website_description.is_none());
    }

    #[test]
    fn test_needs_background_ignores_classification() {
        let mut record = CompanyRecord::default();
        record.established = Some("2001".to_string());
        record.region_mentions = Some("Arizona.".to_string());
        record.website_description = Some("Chips.".to_string());
        assert!(!record.needs_background());
        assert_eq!(record.derived_count(), 3);

        record.website_description = None;
        assert!(record.needs_background());
    }

    #[test]
    fn test_with_name_trims_and_drops_blank() {
        let record = CompanyRecord::default().with_name("  Acme  ");
        assert_eq!(record.name.as_deref(), Some("Acme"));
        let record = CompanyRecord::default().with_name("");
        assert!(record.name.is_none());
    }
}
