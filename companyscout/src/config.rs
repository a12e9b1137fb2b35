//! Configuration management for companyscout
//!
//! Configuration is loaded from `./config/companyscout.toml`. The template that
//! ships with the binary is the only place defaults exist; when no file is
//! present the embedded template is used as-is.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/companyscout.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/companyscout.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub analysis: AnalysisConfig,
    pub region: RegionConfig,
    pub keywords: KeywordConfig,
    pub classification: ClassificationConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Backoff strategy between fetch attempts
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// base, 2*base, 3*base, ...
    Linear,
    /// base, 2*base, 4*base, ...
    Exponential,
}

impl std::str::FromStr for BackoffStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(BackoffStrategy::Linear),
            "exponential" => Ok(BackoffStrategy::Exponential),
            other => Err(ConfigError::InvalidValue {
                field: "retry.backoff_strategy".to_string(),
                reason: format!("unknown strategy '{}' (expected 'linear' or 'exponential')", other),
            }),
        }
    }
}

/// Retry ceiling and backoff for the page fetcher
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per page, including the first
    pub max_retries: u32,
    pub backoff_strategy: BackoffStrategy,
    pub backoff_base_delay_ms: u64,
    pub backoff_max_delay_ms: u64,
    /// HTTP statuses that count as transient failures
    pub retryable_statuses: Vec<u16>,
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.backoff_base_delay_ms;
        let delay_ms = match self.backoff_strategy {
            BackoffStrategy::Linear => base.saturating_mul(attempt as u64),
            BackoffStrategy::Exponential => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                base.saturating_mul(factor)
            }
        };
        Duration::from_millis(delay_ms.min(self.backoff_max_delay_ms))
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_strategy: BackoffStrategy::Exponential,
            backoff_base_delay_ms: 1000,
            backoff_max_delay_ms: 30_000,
            retryable_statuses: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub concurrency: usize,
    /// 0 disables the cap
    pub global_timeout_secs: u64,
}

impl AnalysisConfig {
    pub fn global_timeout(&self) -> Option<Duration> {
        if self.global_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.global_timeout_secs))
        }
    }
}

/// Region whose mentions are collected from company pages
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

/// Link keywords used to locate informational pages
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordConfig {
    pub info_page: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationConfig {
    pub roles: Vec<RoleKeywords>,
}

/// One supply-chain role and the keywords that identify it
#[derive(Debug, Clone, Deserialize)]
pub struct RoleKeywords {
    pub role: String,
    pub keywords: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded default configuration
    pub fn embedded_default() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.max_body_bytes".to_string(),
            });
        }

        if self.retry.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_retries".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.retry.backoff_max_delay_ms < self.retry.backoff_base_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff_max_delay_ms".to_string(),
                reason: "must not be smaller than retry.backoff_base_delay_ms".to_string(),
            });
        }
        for status in &self.retry.retryable_statuses {
            if !(100..=599).contains(status) {
                return Err(ConfigError::InvalidValue {
                    field: "retry.retryable_statuses".to_string(),
                    reason: format!("{} is not an HTTP status code", status),
                });
            }
        }

        if self.analysis.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.region.name.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "region.name".to_string(),
            });
        }

        if self.keywords.info_page.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::EmptyRequired {
                field: "keywords.info_page".to_string(),
            });
        }

        for (i, role) in self.classification.roles.iter().enumerate() {
            if role.role.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: format!("classification.roles[{}].role", i),
                });
            }
            if role.keywords.is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: format!("classification.roles[{}].keywords", i),
                });
            }
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::create_default_config_at(Path::new(CONFIG_PATH))
    }

    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}
