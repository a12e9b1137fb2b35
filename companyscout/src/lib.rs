//! Company background discovery.
//!
//! Starting from each company's seed website, the pipeline fetches the home
//! page, follows the most promising "about"-style link and, when facts are
//! still missing, one narrower about/history link. Four extractors fill the
//! founding year, region mentions, a short description and a supply-chain
//! role; the first page that yields a field owns it.

pub mod batch;
pub mod cli;
pub mod config;
pub mod document;
pub mod export;
pub mod extract;
pub mod fetcher;
pub mod locator;
pub mod logger;
pub mod orchestrator;
pub mod record;
pub mod runner;
pub mod url_utils;

pub use config::AppConfig;
pub use fetcher::{FetchFailure, HttpTransport, PageFetcher, Transport};
pub use orchestrator::{CompanyProfiler, EnrichmentTrace, Stage};
pub use record::{CompanyRecord, MalformedInput, RecordField};
pub use runner::{CompanyOutcome, CompanyRunner, CompanyStatus};
