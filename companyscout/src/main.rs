use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use companyscout::batch::{self, export_run_summary, finalize_run_summary, new_run_summary};
use companyscout::cli::Cli;
use companyscout::config::{self, AppConfig, ConfigError};
use companyscout::export;
use companyscout::logger::{RunLogger, VerbosityLevel};
use companyscout::{CompanyRecord, CompanyRunner, HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| verbosity.tracing_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.init {
        let path = AppConfig::create_default_config().context("Failed to create configuration file")?;
        println!("Created default configuration file at: {}", path.display());
        println!("Edit this file to customize settings, then run companyscout again.");
        return Ok(());
    }

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    let mut app_config = load_config(&cli)?;
    cli.apply_overrides(&mut app_config).context("Invalid command-line override")?;

    let logger = match &cli.log_file {
        Some(path) => RunLogger::with_log_file(verbosity, path),
        None => RunLogger::new(verbosity),
    };

    let input = cli.input.as_deref().context("An input file is required")?;
    let loaded = batch::parse_company_file(input)?;
    for skipped in &loaded.skipped {
        logger.log_skipped_row(&skipped.to_string());
    }
    logger.record_skipped_rows(loaded.skipped.len());
    logger.log_run_start(
        &input.display().to_string(),
        loaded.records.len(),
        app_config.analysis.concurrency,
    );

    let mut summary = new_run_summary();
    let transport = HttpTransport::new(&app_config.http).context("Failed to build HTTP client")?;
    let runner = CompanyRunner::from_config(transport, &app_config).with_logger(logger.clone());
    let outcomes = runner.run(loaded.records).await;

    let records: Vec<CompanyRecord> = outcomes.iter().map(|o| o.record.clone()).collect();
    let output_path = cli.output_path();
    let output = output_path.to_string_lossy();
    logger.log_export_start(&cli.output_format);
    match cli.output_format.as_str() {
        "json" => export::export_json(&records, &output)?,
        _ => export::export_csv(&records, &output)?,
    }
    logger.log_export_success(&output);

    finalize_run_summary(&mut summary, &outcomes, &loaded.skipped);
    if let Some(summary_path) = &cli.summary {
        export_run_summary(&summary, summary_path)?;
        logger.info(&format!("Run summary written to {}", summary_path.display()));
    }

    if logger.is_log_export_enabled() {
        if let Err(e) = logger.export_logs() {
            logger.error(&format!("Failed to export logs: {}", e));
        }
    }

    if verbosity >= VerbosityLevel::Detailed {
        export::print_results_summary(&records);
    }
    logger.print_final_summary();

    Ok(())
}

/// `--config` must exist; the default location falls back to the built-in template
fn load_config(cli: &Cli) -> Result<AppConfig> {
    if let Some(path) = &cli.config {
        return AppConfig::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    match AppConfig::load() {
        Ok(cfg) => Ok(cfg),
        Err(ConfigError::FileNotFound(path)) => {
            tracing::debug!("No configuration at {}; using built-in defaults", path.display());
            AppConfig::embedded_default().context("Built-in configuration is invalid")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load configuration from {}", config::CONFIG_PATH)),
    }
}
