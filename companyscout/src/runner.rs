//! Bounded-concurrency driver over a batch of companies
//!
//! Each company is enriched by its own orchestrator future; at most
//! `concurrency` of them are in flight at once. The optional global timeout is
//! a single deadline shared by every company. Results are gathered by one
//! consumer loop and returned in input order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::fetcher::Transport;
use crate::logger::{RunLogger, VerbosityLevel};
use crate::orchestrator::{CompanyProfiler, EnrichmentTrace};
use crate::record::CompanyRecord;

/// How a company's processing ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    /// The orchestrator reached `Done`
    Completed,
    /// The global deadline passed first; fields filled so far are kept
    TimedOut,
}

/// Final state of one company
#[derive(Debug, Clone)]
pub struct CompanyOutcome {
    pub record: CompanyRecord,
    pub trace: EnrichmentTrace,
    pub status: CompanyStatus,
}

impl CompanyOutcome {
    pub fn timed_out(&self) -> bool {
        self.status == CompanyStatus::TimedOut
    }
}

pub struct CompanyRunner<T> {
    profiler: Arc<CompanyProfiler<T>>,
    concurrency: usize,
    global_timeout: Option<Duration>,
    logger: RunLogger,
}

impl<T: Transport> CompanyRunner<T> {
    pub fn new(profiler: CompanyProfiler<T>, concurrency: usize) -> Self {
        Self {
            profiler: Arc::new(profiler),
            concurrency: concurrency.max(1),
            global_timeout: None,
            logger: RunLogger::new(VerbosityLevel::Silent),
        }
    }

    pub fn from_config(transport: T, config: &AppConfig) -> Self {
        Self::new(CompanyProfiler::from_config(transport, config), config.analysis.concurrency)
            .with_global_timeout(config.analysis.global_timeout())
    }

    pub fn with_global_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.global_timeout = timeout;
        self
    }

    pub fn with_logger(mut self, logger: RunLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn profiler(&self) -> &CompanyProfiler<T> {
        &self.profiler
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Enrich every record. Never fails; per-company problems show up in the
    /// outcome's trace and status.
    pub async fn run(&self, records: Vec<CompanyRecord>) -> Vec<CompanyOutcome> {
        let total = records.len();
        let deadline = self.global_timeout.map(|t| Instant::now() + t);
        let profiler = self.profiler.as_ref();

        info!(
            "Profiling {} companies (concurrency: {}, global timeout: {:?})",
            total, self.concurrency, self.global_timeout
        );
        self.logger.start_progress(total as u64).await;

        let mut in_flight = stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| async move { (index, profile_company(profiler, record, deadline).await) })
            .buffer_unordered(self.concurrency);

        let mut outcomes: Vec<(usize, CompanyOutcome)> = Vec::with_capacity(total);
        while let Some((index, outcome)) = in_flight.next().await {
            self.logger.record_company(&outcome.trace, outcome.timed_out());
            if outcome.timed_out() {
                self.logger.log_company_timed_out(&outcome.record.url);
            } else {
                self.logger.log_company_complete(&outcome.record.url, &outcome.trace);
            }
            self.logger.update_progress(&outcome.record.url).await;
            self.logger.advance_progress(1).await;
            outcomes.push((index, outcome));
        }

        let timed_out = outcomes.iter().filter(|(_, o)| o.timed_out()).count();
        if timed_out > 0 {
            warn!("Global timeout reached: {} of {} companies incomplete", timed_out, total);
        }
        self.logger
            .finish_progress(&format!("Profiled {} companies ({} timed out)", total, timed_out))
            .await;

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

/// Enrich one company, abandoning it at `deadline`.
///
/// The record and trace live here rather than inside the orchestrator future,
/// so dropping that future on timeout keeps the partial results.
async fn profile_company<T: Transport>(
    profiler: &CompanyProfiler<T>,
    mut record: CompanyRecord,
    deadline: Option<Instant>,
) -> CompanyOutcome {
    let mut trace = EnrichmentTrace::default();

    let status = match deadline {
        None => {
            profiler.enrich_into(&mut record, &mut trace).await;
            CompanyStatus::Completed
        }
        // timeout_at polls the future once before checking the deadline
        Some(deadline) if Instant::now() >= deadline => {
            debug!("{} not started before the global deadline", record.url);
            CompanyStatus::TimedOut
        }
        Some(deadline) => {
            let finished = tokio::time::timeout_at(deadline, profiler.enrich_into(&mut record, &mut trace))
                .await
                .is_ok();
            if finished {
                CompanyStatus::Completed
            } else {
                debug!("{} abandoned at the global deadline ({} fetches issued)", record.url, trace.fetches);
                CompanyStatus::TimedOut
            }
        }
    };

    CompanyOutcome { record, trace, status }
}
