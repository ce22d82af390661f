//! Settings read from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::IndexingError;
use blockstore_search_pipeline::writer::{
    DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF,
};
use blockstore_search_pipeline::{Backoff, IndexerConfig, QueryConfig, RetryPolicy};
use blockstore_search_repository::IndexConfig;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default submit timeout per bulk attempt, in milliseconds.
const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 30_000;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub opensearch_url: String,
    /// Prepended to every index name.
    pub index_prefix: String,
    pub index: IndexConfig,
    pub indexer: IndexerConfig,
    pub retry: RetryPolicy,
    pub query: QueryConfig,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            index_prefix: String::new(),
            index: IndexConfig::default(),
            indexer: IndexerConfig::default(),
            retry: RetryPolicy::default(),
            query: QueryConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_PREFIX`: Prefix for every index name (default: none)
    /// - `INDEX_SHARDS` / `INDEX_REPLICAS`: Settings for newly created indexes (default: 1 / 1)
    /// - `BATCH_SIZE`: Documents per bulk request (default: 100)
    /// - `RETRY_MAX_ATTEMPTS`: Attempts per batch, including the first (default: 3)
    /// - `RETRY_BACKOFF_MODE`: `constant` or `exponential` (default: constant)
    /// - `RETRY_BACKOFF_MS`: Delay between attempts, or the first delay when exponential (default: 2000)
    /// - `RETRY_MAX_BACKOFF_MS`: Upper bound for exponential delays (default: 30000)
    /// - `SUBMIT_TIMEOUT_MS`: Limit for one bulk attempt, 0 disables it (default: 30000)
    /// - `SEARCH_PAGE_SIZE` / `SUGGEST_PAGE_SIZE` / `FACET_SIZE`: Read path bounds (default: 20 / 8 / 10)
    /// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let opensearch_url = get("OPENSEARCH_URL").unwrap_or(defaults.opensearch_url);
        let index_prefix = get("INDEX_PREFIX").unwrap_or_default();

        let index = IndexConfig::new(
            parse_nonzero(&get, "INDEX_SHARDS")?.unwrap_or(defaults.index.number_of_shards),
            parse(&get, "INDEX_REPLICAS")?.unwrap_or(defaults.index.number_of_replicas),
        );

        let batch_size =
            parse_nonzero(&get, "BATCH_SIZE")?.unwrap_or(defaults.indexer.batch_size);

        let max_attempts =
            parse_nonzero(&get, "RETRY_MAX_ATTEMPTS")?.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let backoff_delay = parse(&get, "RETRY_BACKOFF_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BACKOFF);
        let max_backoff = parse(&get, "RETRY_MAX_BACKOFF_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MAX_BACKOFF);
        let backoff = match get("RETRY_BACKOFF_MODE").as_deref() {
            None | Some("constant") => Backoff::Constant(backoff_delay),
            Some("exponential") => Backoff::Exponential {
                initial: backoff_delay,
                max: max_backoff,
            },
            Some(other) => {
                return Err(IndexingError::config(format!(
                    "RETRY_BACKOFF_MODE must be 'constant' or 'exponential', got '{}'",
                    other
                )))
            }
        };
        let mut retry = RetryPolicy::new(max_attempts, backoff);
        let timeout_ms = parse(&get, "SUBMIT_TIMEOUT_MS")?.unwrap_or(DEFAULT_SUBMIT_TIMEOUT_MS);
        if timeout_ms > 0 {
            retry = retry.with_attempt_timeout(Duration::from_millis(timeout_ms));
        }

        let query = QueryConfig {
            search_page_size: parse_nonzero(&get, "SEARCH_PAGE_SIZE")?
                .unwrap_or(defaults.query.search_page_size),
            suggest_page_size: parse_nonzero(&get, "SUGGEST_PAGE_SIZE")?
                .unwrap_or(defaults.query.suggest_page_size),
            facet_size: parse_nonzero(&get, "FACET_SIZE")?.unwrap_or(defaults.query.facet_size),
        };

        let log_format = match get("LOG_FORMAT").map(|v| v.to_lowercase()).as_deref() {
            None | Some("pretty") | Some("text") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(IndexingError::config(format!(
                    "LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            opensearch_url,
            index_prefix,
            index,
            indexer: IndexerConfig { batch_size },
            retry,
            query,
            log_format,
        })
    }
}

fn parse<T, G>(get: &G, key: &str) -> Result<Option<T>, IndexingError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                IndexingError::config(format!("Invalid value '{}' for {}: {}", raw, key, e))
            })
        })
        .transpose()
}

/// Like [`parse`], for counts and sizes that must be at least 1.
fn parse_nonzero<T, G>(get: &G, key: &str) -> Result<Option<T>, IndexingError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match parse::<T, G>(get, key)? {
        Some(value) if value == T::default() => Err(IndexingError::config(format!(
            "{} must be at least 1",
            key
        ))),
        value => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, IndexingError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.opensearch_url, "http://localhost:9200");
        assert_eq!(settings.indexer.batch_size, 100);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.backoff, Backoff::Constant(Duration::from_secs(2)));
        assert_eq!(settings.retry.attempt_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.query, QueryConfig::default());
        assert_eq!(settings.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("OPENSEARCH_URL", "http://search:9200"),
            ("INDEX_PREFIX", "mainnet-"),
            ("BATCH_SIZE", "250"),
            ("RETRY_MAX_ATTEMPTS", "5"),
            ("RETRY_BACKOFF_MODE", "exponential"),
            ("RETRY_BACKOFF_MS", "500"),
            ("RETRY_MAX_BACKOFF_MS", "8000"),
            ("SUBMIT_TIMEOUT_MS", "0"),
            ("SEARCH_PAGE_SIZE", "50"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(settings.opensearch_url, "http://search:9200");
        assert_eq!(settings.index_prefix, "mainnet-");
        assert_eq!(settings.indexer.batch_size, 250);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(
            settings.retry.backoff,
            Backoff::Exponential {
                initial: Duration::from_millis(500),
                max: Duration::from_secs(8),
            }
        );
        assert_eq!(settings.retry.attempt_timeout, None);
        assert_eq!(settings.query.search_page_size, 50);
        assert_eq!(settings.query.suggest_page_size, 8);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let settings = settings(&[("BATCH_SIZE", "  "), ("OPENSEARCH_URL", "")]).unwrap();
        assert_eq!(settings.indexer.batch_size, 100);
        assert_eq!(settings.opensearch_url, "http://localhost:9200");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            settings(&[("BATCH_SIZE", "many")]),
            Err(IndexingError::ConfigError(msg)) if msg.contains("BATCH_SIZE")
        ));
        for key in [
            "BATCH_SIZE",
            "RETRY_MAX_ATTEMPTS",
            "INDEX_SHARDS",
            "SEARCH_PAGE_SIZE",
            "SUGGEST_PAGE_SIZE",
            "FACET_SIZE",
        ] {
            assert!(
                matches!(
                    settings(&[(key, "0")]),
                    Err(IndexingError::ConfigError(ref msg)) if msg.contains(key)
                ),
                "{} accepted 0",
                key
            );
        }
        assert!(settings(&[("RETRY_BACKOFF_MODE", "linear")]).is_err());
        assert!(settings(&[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_zero_replicas_allowed() {
        let settings = settings(&[("INDEX_REPLICAS", "0"), ("INDEX_SHARDS", "2")]).unwrap();
        assert_eq!(settings.index, IndexConfig::new(2, 0));
    }
}
