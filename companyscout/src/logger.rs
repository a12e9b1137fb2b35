use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::RwLock;

use crate::orchestrator::EnrichmentTrace;
use crate::record::RecordField;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Progress bar and final summary only
    Summary = 1,  // Per-run milestones (default)
    Detailed = 2, // Per-company outcomes and skipped rows
    Debug = 3,    // Everything, including per-page detail
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Default `tracing` filter directive matching this level
    pub fn tracing_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Silent => "error",
            VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "companyscout=info,warn",
            VerbosityLevel::Debug => "companyscout=debug,info",
        }
    }
}

/// Console/progress logger for one run.
///
/// Cheap to clone; clones share the progress bar, counters and log buffer.
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    metadata: Arc<Mutex<RunMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<PathBuf>,
}

/// Counters shown in the final summary
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunMetadata {
    pub companies_total: usize,
    pub companies_processed: usize,
    pub companies_timed_out: usize,
    pub rows_skipped: usize,
    pub fetches: usize,
    pub fetch_failures: usize,
    pub established_filled: usize,
    pub region_filled: usize,
    pub description_filled: usize,
    pub classification_filled: usize,
    pub output_file: Option<String>,
    started: Option<Instant>,
    finished: Option<Instant>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: Some(log_file_path.into()),
            ..Self::new(verbosity)
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    /// Always shown
    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let msg = format!("[{}] {}: {}", timestamp, level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Route through the progress bar so it stays pinned at the bottom
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub async fn start_progress(&self, total: u64) {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Starting...");

        *self.progress_bar.write().await = Some(pb);

        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.companies_total = total as usize;
            metadata.started = Some(Instant::now());
        }
    }

    pub async fn update_progress(&self, message: &str) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_message(message.to_string());
        }
    }

    pub async fn advance_progress(&self, steps: u64) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.inc(steps);
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        if let Some(pb) = self.progress_bar.write().await.take() {
            pb.finish_and_clear();
        }
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.finished = Some(Instant::now());
        }
        self.info(final_message);
    }

    /// Fold one company's trace into the run counters
    pub fn record_company(&self, trace: &EnrichmentTrace, timed_out: bool) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.companies_processed += 1;
            if timed_out {
                metadata.companies_timed_out += 1;
            }
            metadata.fetches += trace.fetches;
            metadata.fetch_failures += trace.failures.len();
            for (field, _) in &trace.filled {
                match field {
                    RecordField::Established => metadata.established_filled += 1,
                    RecordField::RegionMentions => metadata.region_filled += 1,
                    RecordField::WebsiteDescription => metadata.description_filled += 1,
                    RecordField::Classification => metadata.classification_filled += 1,
                }
            }
        }
    }

    pub fn record_skipped_rows(&self, count: usize) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.rows_skipped += count;
        }
    }

    pub fn record_output_file(&self, path: &str) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.output_file = Some(path.to_string());
        }
    }

    /// Snapshot of the counters
    pub fn metadata(&self) -> RunMetadata {
        self.metadata.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Print the end-of-run summary to stdout, regardless of verbosity
    pub fn print_final_summary(&self) {
        let metadata = self.metadata();

        println!("\n=== RUN SUMMARY ===");
        if let (Some(start), Some(end)) = (metadata.started, metadata.finished) {
            println!("Duration: {:.2}s", end.duration_since(start).as_secs_f64());
        }
        println!(
            "Companies Processed: {}/{}",
            metadata.companies_processed, metadata.companies_total
        );
        if metadata.companies_timed_out > 0 {
            println!("Timed Out: {}", metadata.companies_timed_out);
        }
        if metadata.rows_skipped > 0 {
            println!("Rows Skipped: {}", metadata.rows_skipped);
        }
        println!("Pages Fetched: {} ({} failed)", metadata.fetches, metadata.fetch_failures);
        println!("Established Found: {}", metadata.established_filled);
        println!("Region Mentions Found: {}", metadata.region_filled);
        println!("Descriptions Found: {}", metadata.description_filled);
        println!("Classifications Found: {}", metadata.classification_filled);
        if let Some(output) = &metadata.output_file {
            println!("Results Exported: {}", output);
        }
        println!("===================\n");
        let _ = io::stdout().flush();
    }

    pub fn log_run_start(&self, input: &str, companies: usize, concurrency: usize) {
        self.info(&format!(
            "Profiling {} companies from {} ({} concurrent)",
            companies, input, concurrency
        ));
    }

    pub fn log_skipped_row(&self, reason: &str) {
        self.warn(&format!("Skipping row: {}", reason));
    }

    pub fn log_company_complete(&self, url: &str, trace: &EnrichmentTrace) {
        self.debug(&format!(
            "{}: {} fetches, {} fields filled, {} failures",
            url,
            trace.fetches,
            trace.filled.len(),
            trace.failures.len()
        ));
    }

    pub fn log_company_timed_out(&self, url: &str) {
        self.warn(&format!("{}: global timeout reached, keeping partial results", url));
    }

    pub fn log_export_start(&self, format: &str) {
        self.info(&format!("Exporting results in {} format", format));
    }

    pub fn log_export_success(&self, path: &str) {
        self.record_output_file(path);
        self.info(&format!("Export completed: {}", path));
    }

    /// Write every buffered message to the log file, if one was configured
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(log_file_path) = &self.log_file_path else {
            return Ok(());
        };
        if let Some(parent) = Path::new(log_file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;

        if let Ok(buffer) = self.log_buffer.lock() {
            for entry in buffer.iter() {
                writeln!(file, "{}", entry)?;
            }
        }
        file.flush()
    }

    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }

    pub fn log_count(&self) -> usize {
        self.log_buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::Stage;

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(VerbosityLevel::from_verbose_count(0), VerbosityLevel::Summary);
        assert_eq!(VerbosityLevel::from_verbose_count(1), VerbosityLevel::Detailed);
        assert_eq!(VerbosityLevel::from_verbose_count(5), VerbosityLevel::Debug);
    }

    #[test]
    fn test_record_company_counts_fields() {
        let logger = RunLogger::new(VerbosityLevel::Silent);
        let trace = EnrichmentTrace {
            stage: Some(Stage::Done),
            fetches: 2,
            visited: vec![],
            failures: vec![(Stage::InfoFetched, "HTTP_ERROR".into())],
            filled: vec![
                (RecordField::Established, Stage::SeedFetched),
                (RecordField::Classification, Stage::SeedFetched),
            ],
        };
        logger.record_company(&trace, false);
        logger.record_company(&EnrichmentTrace::default(), true);

        let metadata = logger.metadata();
        assert_eq!(metadata.companies_processed, 2);
        assert_eq!(metadata.companies_timed_out, 1);
        assert_eq!(metadata.fetches, 2);
        assert_eq!(metadata.fetch_failures, 1);
        assert_eq!(metadata.established_filled, 1);
        assert_eq!(metadata.classification_filled, 1);
        assert_eq!(metadata.region_filled, 0);
    }

    #[test]
    fn test_log_file_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let logger = RunLogger::with_log_file(VerbosityLevel::Debug, &path);

        logger.info("first");
        logger.debug("second");
        assert_eq!(logger.log_count(), 2);

        logger.export_logs().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("INFO: first"));
        assert!(content.contains("DEBUG: second"));
    }

    #[test]
    fn test_messages_below_verbosity_are_not_buffered() {
        let dir = tempfile::tempdir().unwrap();
        let logger = RunLogger::with_log_file(VerbosityLevel::Summary, dir.path().join("run.log"));
        logger.debug("hidden");
        logger.warn("hidden too");
        logger.error("shown");
        assert_eq!(logger.log_count(), 1);
    }
}
