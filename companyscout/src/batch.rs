//! Seed-file loading and run summaries
//!
//! Supports:
//! - CSV files with a header row naming the company columns
//! - CSV files with one URL per line and no header
//! - JSON files holding an array of URL strings or company objects, or an
//!   object with a "companies" array
//!
//! Rows whose URL is empty or unparseable are reported as skips; they never
//! abort the load.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::orchestrator::Stage;
use crate::record::{CompanyRecord, MalformedInput};
use crate::runner::{CompanyOutcome, CompanyStatus};

/// Seed columns the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    Ticker,
    Location,
    LocationType,
    Sales,
    Sic,
    Url,
    Phone,
    Description,
}

impl Column {
    /// Match a header case-insensitively, ignoring spaces, dashes and underscores
    fn from_header(header: &str) -> Option<Self> {
        let key: String = header
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        match key.as_str() {
            "companyname" | "name" | "company" => Some(Self::Name),
            "ticker" | "symbol" => Some(Self::Ticker),
            "location" => Some(Self::Location),
            "locationtype" => Some(Self::LocationType),
            "sales" | "revenue" => Some(Self::Sales),
            "sic" | "siccode" => Some(Self::Sic),
            "url" | "website" | "websiteurl" | "homepage" => Some(Self::Url),
            "phonenumber" | "phone" => Some(Self::Phone),
            "description" => Some(Self::Description),
            _ => None,
        }
    }
}

/// Raw column values for one seed row, before URL normalization
#[derive(Debug, Default)]
struct SeedRow {
    name: Option<String>,
    ticker: Option<String>,
    location: Option<String>,
    location_type: Option<String>,
    sales: Option<String>,
    sic: Option<String>,
    url: String,
    phone: Option<String>,
    description: Option<String>,
}

impl SeedRow {
    fn set(&mut self, column: Column, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let slot = match column {
            Column::Url => {
                self.url = value.to_string();
                return;
            }
            Column::Name => &mut self.name,
            Column::Ticker => &mut self.ticker,
            Column::Location => &mut self.location,
            Column::LocationType => &mut self.location_type,
            Column::Sales => &mut self.sales,
            Column::Sic => &mut self.sic,
            Column::Phone => &mut self.phone,
            Column::Description => &mut self.description,
        };
        *slot = Some(value.to_string());
    }

    fn into_record(self, row: usize) -> Result<CompanyRecord, MalformedInput> {
        let mut record = CompanyRecord::from_url(&self.url, row)?;
        record.name = self.name;
        record.ticker = self.ticker;
        record.location = self.location;
        record.location_type = self.location_type;
        record.sales = self.sales;
        record.sic = self.sic;
        record.phone = self.phone;
        record.description = self.description;
        Ok(record)
    }
}

/// Records read from a seed file plus the rows that had to be skipped
#[derive(Debug, Default)]
pub struct LoadedCompanies {
    pub records: Vec<CompanyRecord>,
    pub skipped: Vec<MalformedInput>,
}

impl LoadedCompanies {
    fn push(&mut self, row: SeedRow, row_number: usize) {
        match row.into_record(row_number) {
            Ok(record) => self.records.push(record),
            Err(e) => self.skipped.push(e),
        }
    }
}

/// Input format for seed files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("csv") => Some(Self::Csv),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Load companies from a file (format from extension)
pub fn parse_company_file(path: &Path) -> Result<LoadedCompanies> {
    let format = InputFormat::from_path(path).with_context(|| {
        format!(
            "Cannot determine input format from file extension. Expected .csv or .json: {}",
            path.display()
        )
    })?;

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    match format {
        InputFormat::Csv => parse_csv_companies(&content),
        InputFormat::Json => parse_json_companies(&content),
    }
}

/// Parse companies from CSV content.
///
/// A first row naming a URL column is treated as a header. Otherwise every
/// row is one URL (first field); `#` lines are comments. Skips are labelled
/// with the row's line number in the file.
pub fn parse_csv_companies(content: &str) -> Result<LoadedCompanies> {
    let mut loaded = LoadedCompanies::default();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(content.as_bytes());

    let mut rows = reader.records();
    let Some(first) = rows.next() else {
        return Ok(loaded);
    };
    let first = first.context("Failed to parse CSV record")?;

    let header: Vec<Option<Column>> = first.iter().map(Column::from_header).collect();
    let has_header = header.contains(&Some(Column::Url));

    let mut push_row = |record: &csv::StringRecord, fallback_line: usize| {
        if record.iter().all(|field| field.is_empty()) {
            return;
        }
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);

        let mut row = SeedRow::default();
        if has_header {
            for (column, value) in header.iter().zip(record.iter()) {
                if let Some(column) = column {
                    row.set(*column, value);
                }
            }
        } else {
            let url = record.get(0).unwrap_or_default();
            if url.is_empty() {
                return;
            }
            row.set(Column::Url, url);
        }
        loaded.push(row, line);
    };

    if !has_header {
        push_row(&first, 1);
    }
    for (index, result) in rows.enumerate() {
        let record = result.context("Failed to parse CSV record")?;
        push_row(&record, index + 2);
    }

    Ok(loaded)
}

/// Parse companies from JSON content.
///
/// Supports three shapes:
/// 1. Array of URL strings: `["example.com", "acme.test"]`
/// 2. Array of objects: `[{"Company Name": "Acme", "URL": "acme.test"}]`
/// 3. Object with a "companies" array of either of the above
pub fn parse_json_companies(content: &str) -> Result<LoadedCompanies> {
    let value: serde_json::Value = serde_json::from_str(content).context("Failed to parse JSON content")?;

    match &value {
        serde_json::Value::Array(items) => Ok(parse_json_array(items)),
        serde_json::Value::Object(obj) => match obj.get("companies") {
            Some(serde_json::Value::Array(items)) => Ok(parse_json_array(items)),
            Some(_) => bail!("'companies' field must be an array"),
            None => bail!("JSON object must have a 'companies' array field"),
        },
        _ => bail!("JSON must be an array of companies or an object with a 'companies' field"),
    }
}

fn parse_json_array(items: &[serde_json::Value]) -> LoadedCompanies {
    let mut loaded = LoadedCompanies::default();

    for (index, item) in items.iter().enumerate() {
        let mut row = SeedRow::default();
        match item {
            serde_json::Value::String(url) => row.set(Column::Url, url),
            serde_json::Value::Object(obj) => {
                for (key, value) in obj {
                    let Some(column) = Column::from_header(key) else {
                        continue;
                    };
                    match value {
                        serde_json::Value::String(s) => row.set(column, s),
                        serde_json::Value::Number(n) => row.set(column, &n.to_string()),
                        _ => {}
                    }
                }
            }
            // Not a company entry at all
            _ => continue,
        }
        loaded.push(row, index + 1);
    }

    loaded
}

/// Per-company line of the run summary
#[derive(Debug, Clone, Serialize)]
pub struct CompanyResult {
    pub name: Option<String>,
    pub url: String,
    pub status: CompanyStatus,
    /// Last stage reached
    pub stage: Option<Stage>,
    pub fetches: usize,
    pub fields_filled: usize,
    pub failures: Vec<String>,
}

impl CompanyResult {
    pub fn from_outcome(outcome: &CompanyOutcome) -> Self {
        Self {
            name: outcome.record.name.clone(),
            url: outcome.record.url.clone(),
            status: outcome.status,
            stage: outcome.trace.stage,
            fetches: outcome.trace.fetches,
            fields_filled: outcome.record.derived_count(),
            failures: outcome
                .trace
                .failures
                .iter()
                .map(|(stage, failure)| format!("{}: {}", stage, failure))
                .collect(),
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_companies: usize,
    pub completed: usize,
    pub timed_out: usize,
    pub rows_skipped: usize,
    pub skipped: Vec<String>,
    pub total_fetches: usize,
    pub established_found: usize,
    pub region_mentions_found: usize,
    pub website_description_found: usize,
    pub classification_found: usize,
    pub company_results: Vec<CompanyResult>,
    pub total_duration_secs: f64,
    pub started_at: String,
    pub completed_at: String,
}

/// Create an empty run summary stamped with the start time
pub fn new_run_summary() -> RunSummary {
    RunSummary {
        total_companies: 0,
        completed: 0,
        timed_out: 0,
        rows_skipped: 0,
        skipped: Vec::new(),
        total_fetches: 0,
        established_found: 0,
        region_mentions_found: 0,
        website_description_found: 0,
        classification_found: 0,
        company_results: Vec::new(),
        total_duration_secs: 0.0,
        started_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        completed_at: String::new(),
    }
}

/// Fill the summary from the run's outcomes and skipped rows and stamp the end time
pub fn finalize_run_summary(summary: &mut RunSummary, outcomes: &[CompanyOutcome], skipped: &[MalformedInput]) {
    summary.completed_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    summary.company_results = outcomes.iter().map(CompanyResult::from_outcome).collect();
    summary.skipped = skipped.iter().map(|s| s.to_string()).collect();
    summary.rows_skipped = skipped.len();
    summary.total_companies = outcomes.len();
    summary.completed = outcomes.iter().filter(|o| !o.timed_out()).count();
    summary.timed_out = outcomes.iter().filter(|o| o.timed_out()).count();
    summary.total_fetches = outcomes.iter().map(|o| o.trace.fetches).sum();

    let count = |f: fn(&CompanyRecord) -> bool| outcomes.iter().filter(|o| f(&o.record)).count();
    summary.established_found = count(|r| r.established.is_some());
    summary.region_mentions_found = count(|r| r.region_mentions.is_some());
    summary.website_description_found = count(|r| r.website_description.is_some());
    summary.classification_found = count(|r| r.classification.is_some());
}

/// Export run summary to a JSON file
pub fn export_run_summary(summary: &RunSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write run summary to: {}", output_path.display()))?;

    Ok(())
}
