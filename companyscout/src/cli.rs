use clap::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{AppConfig, BackoffStrategy, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "companyscout")]
#[command(about = "Enrich a list of company websites with founding year, region mentions, description and supply-chain role")]
#[command(version)]
pub struct Cli {
    /// CSV or JSON file listing the companies to profile
    #[arg(value_name = "INPUT", required_unless_present = "init")]
    pub input: Option<PathBuf>,

    /// Create default configuration file at ./config/companyscout.toml
    #[arg(long)]
    pub init: bool,

    /// Output file (defaults to company_profiles.<format> next to the input)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format: 'csv' (default) or 'json'
    #[arg(short = 'f', long, default_value = "csv")]
    pub output_format: String,

    /// Configuration file (defaults to ./config/companyscout.toml, then built-in defaults)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v for per-company detail, -vv for per-page debug output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Number of companies processed concurrently (overrides config)
    #[arg(short = 'j', long, value_name = "N")]
    pub parallel_jobs: Option<usize>,

    /// Maximum attempts per page fetch (overrides config)
    #[arg(long, value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Backoff strategy for retries: "linear" or "exponential" (overrides config)
    #[arg(long, value_name = "STRATEGY")]
    pub backoff_strategy: Option<String>,

    /// Per-request timeout in seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Wall-clock cap for the whole run in seconds, 0 for none (overrides config)
    #[arg(long, value_name = "SECS")]
    pub global_timeout: Option<u64>,

    /// Region whose mentions are collected (overrides config)
    #[arg(long, value_name = "NAME")]
    pub region: Option<String>,

    /// Region abbreviation matched as a whole word (overrides config)
    #[arg(long, value_name = "ABBR")]
    pub region_abbrev: Option<String>,

    /// User-Agent header sent with every request (overrides config)
    #[arg(long, value_name = "UA")]
    pub user_agent: Option<String>,

    /// Export execution logs to a file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if !self.init {
            match &self.input {
                None => return Err("An input file is required".to_string()),
                Some(p) if p.as_os_str().is_empty() => return Err("Input path cannot be empty".to_string()),
                _ => {}
            }
        }

        if !["csv", "json"].contains(&self.output_format.as_str()) {
            return Err("Output format must be 'csv' or 'json'".to_string());
        }

        if let Some(jobs) = self.parallel_jobs {
            if jobs == 0 {
                return Err("Parallel jobs must be greater than 0".to_string());
            }
            if jobs > 100 {
                return Err("Parallel jobs cannot exceed 100".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(jobs) = self.parallel_jobs {
            config.analysis.concurrency = jobs;
        }
        if let Some(retries) = self.max_retries {
            config.retry.max_retries = retries;
        }
        if let Some(strategy) = &self.backoff_strategy {
            config.retry.backoff_strategy = BackoffStrategy::from_str(strategy)?;
        }
        if let Some(secs) = self.timeout {
            config.http.request_timeout_secs = secs;
        }
        if let Some(secs) = self.global_timeout {
            config.analysis.global_timeout_secs = secs;
        }
        if let Some(region) = &self.region {
            config.region.name = region.clone();
            // A new region name invalidates the configured abbreviation
            config.region.abbreviation = None;
        }
        if let Some(abbrev) = &self.region_abbrev {
            config.region.abbreviation = Some(abbrev.clone()).filter(|a| !a.trim().is_empty());
        }
        if let Some(ua) = &self.user_agent {
            config.http.user_agent = ua.clone();
        }
        config.validate()
    }

    /// Where results are written
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let file_name = format!("company_profiles.{}", self.output_format);
        match self.input.as_deref().and_then(Path::parent) {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(file_name),
            _ => PathBuf::from(file_name),
        }
    }
}
