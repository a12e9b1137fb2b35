//! Page fetching with bounded retries and backoff
//!
//! [`PageFetcher`] owns nothing but immutable configuration and a
//! [`Transport`], so a single fetcher can serve every worker in the pool.

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::{HttpConfig, RetryConfig};

/// Maximum number of redirects followed before a response is returned as-is
const MAX_REDIRECTS: usize = 5;

/// What a transport hands back for a single request
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// URL after redirects
    pub final_url: Url,
    /// Decoded body; empty for non-2xx responses
    pub body: String,
}

/// Failure of a single request, before any retry decision
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl TransportError {
    fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connect(_))
    }
}

/// One HTTP GET. Implemented over reqwest in production and by scripted stubs in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawResponse, TransportError>;
}

/// Why a page could not be fetched
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP error status {status}")]
    HttpError { status: u16 },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("gave up after {attempts} attempts (last: {last})")]
    MaxRetriesExceeded { attempts: u32, last: Box<FetchFailure> },
}

impl FetchFailure {
    /// Stable upper-case code used in logs and run summaries
    pub fn code(&self) -> &'static str {
        match self {
            FetchFailure::Timeout => "TIMEOUT",
            FetchFailure::HttpError { .. } => "HTTP_ERROR",
            FetchFailure::NetworkError(_) => "NETWORK_ERROR",
            FetchFailure::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
        }
    }
}

impl From<TransportError> for FetchFailure {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => FetchFailure::Timeout,
            other => FetchFailure::NetworkError(other.to_string()),
        }
    }
}

/// A successfully fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Effective URL after redirects; relative links resolve against this
    pub url: Url,
    pub status: u16,
    pub body: String,
}

pub type FetchResult = Result<FetchedPage, FetchFailure>;

/// Retrying page fetcher
#[derive(Debug, Clone)]
pub struct PageFetcher<T> {
    transport: T,
    retry: RetryConfig,
}

impl<T: Transport> PageFetcher<T> {
    pub fn new(transport: T, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch `url`, retrying transient failures.
    ///
    /// Malformed URLs and non-retryable HTTP statuses fail on the spot. When
    /// every attempt fails transiently the result is
    /// [`FetchFailure::MaxRetriesExceeded`] carrying the last cause.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let parsed = parse_fetchable(url)?;
        let max_attempts = self.retry.max_retries.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!("GET {} (attempt {}/{})", parsed, attempt, max_attempts);

            let failure = match self.transport.get(&parsed).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    if response.final_url != parsed {
                        debug!("{} redirected to {}", parsed, response.final_url);
                    }
                    return Ok(FetchedPage {
                        url: response.final_url,
                        status: response.status,
                        body: response.body,
                    });
                }
                Ok(response) if self.retry.is_retryable_status(response.status) => {
                    FetchFailure::HttpError { status: response.status }
                }
                Ok(response) => {
                    debug!("{} returned non-retryable status {}", parsed, response.status);
                    return Err(FetchFailure::HttpError { status: response.status });
                }
                Err(e) if e.is_transient() => FetchFailure::from(e),
                Err(e) => {
                    debug!("{} failed permanently: {}", parsed, e);
                    return Err(FetchFailure::from(e));
                }
            };

            if attempt >= max_attempts {
                warn!("Giving up on {} after {} attempts: {}", parsed, attempt, failure);
                return Err(FetchFailure::MaxRetriesExceeded {
                    attempts: attempt,
                    last: Box::new(failure),
                });
            }

            let delay = self.retry.calculate_backoff_delay(attempt);
            debug!(
                "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                attempt, max_attempts, parsed, failure, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Parse an absolute http(s) URL or fail with `NetworkError`
fn parse_fetchable(url: &str) -> Result<Url, FetchFailure> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| FetchFailure::NetworkError(format!("malformed URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchFailure::NetworkError(format!(
            "unsupported URL scheme '{}' in '{}'",
            other, url
        ))),
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout().min(Duration::from_secs(10)))
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let body = if response.status().is_success() {
            read_response_body_capped(response, self.max_body_bytes).await?
        } else {
            String::new()
        };

        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect(e.to_string())
    }
}

/// Stream the body, refusing anything larger than `max_bytes`.
///
/// A truncated body would look like a complete page to the extractors, so an
/// oversized response is an error rather than a prefix.
async fn read_response_body_capped(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<String, TransportError> {
    use futures::StreamExt;

    if let Some(length) = response.content_length() {
        if length as usize > max_bytes {
            return Err(TransportError::BodyTooLarge { limit: max_bytes });
        }
    }

    let encoding = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let mut body = Vec::with_capacity(max_bytes.min(256 * 1024));
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify_reqwest_error)?;
        if body.len() + chunk.len() > max_bytes {
            return Err(TransportError::BodyTooLarge { limit: max_bytes });
        }
        body.extend_from_slice(&chunk);
    }

    // A byte-order mark overrides the declared charset
    let (text, used, had_errors) = encoding.decode(&body);
    if had_errors {
        debug!("Body contained bytes invalid for {}; replaced", used.name());
    }
    Ok(text.into_owned())
}

/// `charset` parameter of a Content-Type value, unquoted
fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}
