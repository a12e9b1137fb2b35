use anyhow::{Context, Result};
use chrono::Utc;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use tracing::{debug, info};

use crate::record::CompanyRecord;

/// Output columns, in order
pub const CSV_HEADERS: [&str; 13] = [
    "Company Name",
    "Ticker",
    "Location",
    "Location Type",
    "Sales",
    "SIC",
    "URL",
    "Phone Number",
    "Description",
    "Established",
    "Region Mentions",
    "Website Description",
    "Classification",
];

fn cell(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn csv_row(record: &CompanyRecord) -> [&str; 13] {
    [
        cell(&record.name),
        cell(&record.ticker),
        cell(&record.location),
        cell(&record.location_type),
        cell(&record.sales),
        cell(&record.sic),
        record.url.as_str(),
        cell(&record.phone),
        cell(&record.description),
        cell(&record.established),
        cell(&record.region_mentions),
        cell(&record.website_description),
        cell(&record.classification),
    ]
}

/// Write records as CSV; absent fields become empty cells
pub fn export_csv(records: &[CompanyRecord], output_path: &str) -> Result<()> {
    debug!("Exporting {} companies to CSV: {}", records.len(), output_path);

    let file = File::create(output_path).with_context(|| format!("Failed to create {}", output_path))?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(CSV_HEADERS)?;
    for record in records {
        wtr.write_record(csv_row(record))?;
    }

    wtr.flush()?;
    info!("Exported {} companies to CSV: {}", records.len(), output_path);

    Ok(())
}

/// Write records as pretty JSON with a summary block
pub fn export_json(records: &[CompanyRecord], output_path: &str) -> Result<()> {
    debug!("Exporting {} companies to JSON: {}", records.len(), output_path);

    let json_output = JsonExport {
        summary: ExportSummary::from_records(records),
        companies: records,
    };
    let json_string = serde_json::to_string_pretty(&json_output)?;

    let mut file = File::create(output_path).with_context(|| format!("Failed to create {}", output_path))?;
    file.write_all(json_string.as_bytes())?;

    info!("Exported {} companies to JSON: {}", records.len(), output_path);

    Ok(())
}

#[derive(Serialize)]
struct JsonExport<'a> {
    summary: ExportSummary,
    companies: &'a [CompanyRecord],
}

#[derive(Debug, Serialize, PartialEq)]
struct ExportSummary {
    total_companies: usize,
    with_established: usize,
    with_region_mentions: usize,
    with_website_description: usize,
    with_classification: usize,
    generated_at: String,
}

impl ExportSummary {
    fn from_records(records: &[CompanyRecord]) -> Self {
        let count = |f: fn(&CompanyRecord) -> bool| records.iter().filter(|r| f(r)).count();
        Self {
            total_companies: records.len(),
            with_established: count(|r| r.established.is_some()),
            with_region_mentions: count(|r| r.region_mentions.is_some()),
            with_website_description: count(|r| r.website_description.is_some()),
            with_classification: count(|r| r.classification.is_some()),
            generated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// Print a per-classification breakdown of the results
pub fn print_results_summary(records: &[CompanyRecord]) {
    if records.is_empty() {
        println!("No companies profiled.");
        return;
    }

    let mut by_role: Vec<(&str, usize)> = Vec::new();
    for record in records {
        let role = record.classification.as_deref().unwrap_or("Unclassified");
        match by_role.iter_mut().find(|(r, _)| *r == role) {
            Some((_, n)) => *n += 1,
            None => by_role.push((role, 1)),
        }
    }

    println!("\n=== Results ===");
    println!("Companies: {}", records.len());
    println!(
        "Fully profiled: {}",
        records.iter().filter(|r| r.derived_count() == 4).count()
    );
    for (role, count) in by_role {
        println!("  {}: {}", role, count);
    }
    println!("===============\n");
}
