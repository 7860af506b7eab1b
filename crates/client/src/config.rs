//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `MAPREVIEWS_API_URL` - Backend base URL (default: `http://localhost:8000/v1`)
//! - `MAPREVIEWS_CREDENTIAL_DIR` - Directory holding the persisted credential
//!   (default: `$HOME/.mapreviews`)
//! - `MAPREVIEWS_SEARCH_DEBOUNCE_MS` - Address search countdown (default: 300)
//! - `MAPREVIEWS_SEARCH_MIN_CHARS` - Shortest query that fires a search (default: 2)
//! - `MAPREVIEWS_SEARCH_LIMIT` - Suggestions requested per search (default: 5)
//! - `MAPREVIEWS_FETCH_ORDERING` - `completion` or `latest` (default: `completion`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::sync::FetchOrdering;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/v1";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, including the `/v1` prefix
    pub api_url: Url,
    /// Directory of the persisted credential file
    pub credential_dir: PathBuf,
    /// Address search tuning
    pub search: SearchConfig,
    /// How overlapping collection fetches are reconciled
    pub fetch_ordering: FetchOrdering,
}

/// Debounced address search configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a search fires
    pub debounce: Duration,
    /// Queries shorter than this (in characters) never fire
    pub min_chars: usize,
    /// Maximum number of suggestions requested
    pub limit: u8,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            min_chars: 2,
            limit: 5,
        }
    }
}

impl ClientConfig {
    /// Build a configuration for `api_url` with every other setting at its
    /// default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL cannot be used as a
    /// base for endpoint paths.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url("MAPREVIEWS_API_URL", api_url)?,
            credential_dir: default_credential_dir(None),
            search: SearchConfig::default(),
            fetch_ordering: FetchOrdering::default(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(
            "MAPREVIEWS_API_URL",
            &lookup("MAPREVIEWS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;

        let credential_dir = lookup("MAPREVIEWS_CREDENTIAL_DIR")
            .map_or_else(|| default_credential_dir(lookup("HOME")), PathBuf::from);

        let defaults = SearchConfig::default();
        let debounce_ms = parse_or_default::<u64>(
            "MAPREVIEWS_SEARCH_DEBOUNCE_MS",
            lookup("MAPREVIEWS_SEARCH_DEBOUNCE_MS"),
            u64::try_from(defaults.debounce.as_millis()).unwrap_or(300),
        )?;
        let min_chars = parse_or_default(
            "MAPREVIEWS_SEARCH_MIN_CHARS",
            lookup("MAPREVIEWS_SEARCH_MIN_CHARS"),
            defaults.min_chars,
        )?;
        let limit = parse_or_default(
            "MAPREVIEWS_SEARCH_LIMIT",
            lookup("MAPREVIEWS_SEARCH_LIMIT"),
            defaults.limit,
        )?;
        if limit == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MAPREVIEWS_SEARCH_LIMIT".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let fetch_ordering = match lookup("MAPREVIEWS_FETCH_ORDERING") {
            Some(value) => value.parse().map_err(|e: String| {
                ConfigError::InvalidEnvVar("MAPREVIEWS_FETCH_ORDERING".to_string(), e)
            })?,
            None => FetchOrdering::default(),
        };

        Ok(Self {
            api_url,
            credential_dir,
            search: SearchConfig {
                debounce: Duration::from_millis(debounce_ms),
                min_chars,
                limit,
            },
            fetch_ordering,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and validate the backend base URL.
fn parse_api_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "URL cannot be used as a base".to_string(),
        ));
    }

    Ok(url)
}

/// Parse an optional value, falling back to `default` when unset.
fn parse_or_default<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// `$HOME/.mapreviews`, or a relative `.mapreviews` when no home is known.
fn default_credential_dir(home: Option<String>) -> PathBuf {
    home.map_or_else(|| PathBuf::from(".mapreviews"), |home| {
        PathBuf::from(home).join(".mapreviews")
    })
}
