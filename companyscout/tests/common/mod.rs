#![allow(dead_code)]

pub mod fixtures;
pub mod scripted;
pub mod wiremock_helpers;

use companyscout::config::{BackoffStrategy, HttpConfig, RetryConfig};

/// Three attempts with short exponential backoff
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        backoff_strategy: BackoffStrategy::Exponential,
        backoff_base_delay_ms: 10,
        backoff_max_delay_ms: 100,
        retryable_statuses: vec![408, 429, 500, 502, 503, 504],
    }
}

pub fn http_config(timeout_secs: u64) -> HttpConfig {
    HttpConfig {
        user_agent: "companyscout-tests/0.1".to_string(),
        request_timeout_secs: timeout_secs,
        max_body_bytes: 64 * 1024,
    }
}
