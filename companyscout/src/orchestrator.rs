//! Fallback orchestration across the seed, info and about/history pages
//!
//! Per company the orchestrator walks
//! `SeedFetched -> InfoFetched -> AboutFetched -> Done`, issuing at most three
//! fetches. Each fetched page goes through every extractor and the results
//! are merged with fill-if-missing, so the first page that yields a field
//! owns it.

use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::config::AppConfig;
use crate::document::PageDocument;
use crate::extract::FieldExtractors;
use crate::fetcher::{FetchFailure, PageFetcher, Transport};
use crate::locator::InfoPageLocator;
use crate::record::{CompanyRecord, RecordField};
use crate::url_utils::same_document;

/// Upper bound on pages fetched for one company
pub const MAX_FETCHES_PER_COMPANY: usize = 3;

/// Where a company's processing currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SeedFetched,
    InfoFetched,
    AboutFetched,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::SeedFetched => "seed",
            Stage::InfoFetched => "info",
            Stage::AboutFetched => "about",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// What happened while one company was processed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentTrace {
    /// Last stage reached; `None` until the first page is fetched
    pub stage: Option<Stage>,
    /// Fetches issued (retries inside one fetch count once)
    pub fetches: usize,
    /// Successfully fetched pages with their effective URLs
    pub visited: Vec<(Stage, String)>,
    /// Failed fetches with the failure code and message
    pub failures: Vec<(Stage, String)>,
    /// Which stage filled each derived field
    pub filled: Vec<(RecordField, Stage)>,
}

impl EnrichmentTrace {
    fn advance(&mut self, stage: Stage) {
        self.stage = Some(stage);
    }

    /// Stage that filled `field`, if any
    pub fn filled_by(&self, field: RecordField) -> Option<Stage> {
        self.filled.iter().find(|(f, _)| *f == field).map(|(_, s)| *s)
    }

    pub fn is_done(&self) -> bool {
        self.stage == Some(Stage::Done)
    }
}

/// A fetched and parsed page
#[derive(Debug, Clone)]
struct LoadedPage {
    url: Url,
    document: PageDocument,
}

/// Runs the fetch/extract/locate chain for one company at a time
pub struct CompanyProfiler<T> {
    fetcher: PageFetcher<T>,
    locator: InfoPageLocator,
    extractors: FieldExtractors,
}

impl<T: Transport> CompanyProfiler<T> {
    pub fn new(fetcher: PageFetcher<T>, locator: InfoPageLocator, extractors: FieldExtractors) -> Self {
        Self {
            fetcher,
            locator,
            extractors,
        }
    }

    /// Build every component from configuration around `transport`
    pub fn from_config(transport: T, config: &AppConfig) -> Self {
        Self::new(
            PageFetcher::new(transport, config.retry.clone()),
            InfoPageLocator::new(&config.keywords.info_page),
            FieldExtractors::from_config(&config.region, &config.classification),
        )
    }

    pub fn fetcher(&self) -> &PageFetcher<T> {
        &self.fetcher
    }

    /// Fill `record`'s derived fields from its seed page and up to two linked pages.
    ///
    /// Never fails: fetch failures end the chain early and leave fields absent.
    pub async fn enrich(&self, record: &mut CompanyRecord) -> EnrichmentTrace {
        let mut trace = EnrichmentTrace::default();
        self.enrich_into(record, &mut trace).await;
        trace
    }

    /// Same as [`enrich`](Self::enrich), recording into a caller-owned trace.
    ///
    /// Values land in `record` and `trace` as soon as each page is processed,
    /// so a caller that drops this future keeps everything found so far.
    pub async fn enrich_into(&self, record: &mut CompanyRecord, trace: &mut EnrichmentTrace) {
        // Stage 1: seed
        let seed_url = record.url.clone();
        let Some(seed) = self.load(&seed_url, Stage::SeedFetched, trace).await else {
            info!("Seed page unavailable for {}; no fields extracted", seed_url);
            trace.advance(Stage::Done);
            return;
        };

        if record.name.is_none() {
            record.name = seed.document.title.clone();
        }
        self.extract_into(record, &seed, Stage::SeedFetched, trace);

        let mut fetched: Vec<Url> = vec![seed.url.clone()];
        let mut current = seed;

        // Stage 2: info page
        if let Some(info_url) = self.locator.locate_info_page(&current.url, &current.document.links) {
            if let Some(info) = self.load(info_url.as_str(), Stage::InfoFetched, trace).await {
                self.extract_into(record, &info, Stage::InfoFetched, trace);
                fetched.push(info.url.clone());
                current = info;
            }
        } else {
            debug!("No info page link on {}", current.url);
        }

        // Stage 3: about/history fallback
        if record.needs_background() && trace.fetches < MAX_FETCHES_PER_COMPANY {
            let candidates = self.locator.about_or_history_candidates(
                &current.url,
                &current.document.links,
                record.name.as_deref(),
            );
            let next = candidates.into_iter().find(|candidate| {
                let seen = fetched.iter().any(|f| same_document(f, &candidate.url));
                if seen {
                    debug!("About/history link {} was already fetched", candidate.url);
                }
                !seen
            });
            match next {
                Some(candidate) => {
                    debug!(
                        "About/history page for {}: {} (keyword '{}', score {}, depth {})",
                        current.url, candidate.url, candidate.keyword, candidate.score, candidate.depth
                    );
                    if let Some(about) = self.load(candidate.url.as_str(), Stage::AboutFetched, trace).await {
                        self.extract_into(record, &about, Stage::AboutFetched, trace);
                    }
                }
                None => debug!("No unfetched about/history link on {}", current.url),
            }
        }

        trace.advance(Stage::Done);
    }

    /// Fetch and parse one page, recording the attempt in `trace`
    async fn load(&self, url: &str, stage: Stage, trace: &mut EnrichmentTrace) -> Option<LoadedPage> {
        trace.fetches += 1;
        match self.fetcher.fetch(url).await {
            Ok(page) => {
                let document = PageDocument::parse(&page.body);
                trace.visited.push((stage, page.url.to_string()));
                trace.advance(stage);
                Some(LoadedPage {
                    url: page.url,
                    document,
                })
            }
            Err(failure) => {
                record_failure(trace, stage, url, &failure);
                None
            }
        }
    }

    /// Run every extractor on `document` and fill whatever `record` still lacks.
    ///
    /// Returns the fields this pass filled; a second pass over the same page fills nothing.
    pub fn apply_page(&self, record: &mut CompanyRecord, document: &PageDocument) -> Vec<RecordField> {
        record.fill_missing(self.extractors.extract_all(document))
    }

    fn extract_into(&self, record: &mut CompanyRecord, page: &LoadedPage, stage: Stage, trace: &mut EnrichmentTrace) {
        let filled = self.apply_page(record, &page.document);
        if !filled.is_empty() {
            debug!(
                "{} page {} filled {}",
                stage,
                page.url,
                filled.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(", ")
            );
        }
        trace.filled.extend(filled.into_iter().map(|f| (f, stage)));
    }
}

fn record_failure(trace: &mut EnrichmentTrace, stage: Stage, url: &str, failure: &FetchFailure) {
    info!("{} page {} not fetched: {} ({})", stage, url, failure.code(), failure);
    trace
        .failures
        .push((stage, format!("{}: {}", failure.code(), failure)));
}
