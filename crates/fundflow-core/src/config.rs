//! Ingestion configuration.
//!
//! [`IngestConfig::default`] is the production policy: four entities in flight,
//! three attempts with 4s/8s backoff and the Alpha Vantage free-tier quota of
//! five requests per minute. [`IngestConfig::from_env`] overlays environment
//! variables; CLI flags are applied on top by the binary.

use std::time::Duration;

use crate::aggregator::DEFAULT_CONCURRENCY;
use crate::retry::RetryPolicy;
use crate::ConfigError;

pub const CONCURRENCY_ENV: &str = "FUNDFLOW_CONCURRENCY";
pub const REQUEST_TIMEOUT_ENV: &str = "FUNDFLOW_REQUEST_TIMEOUT_MS";
pub const RUN_DEADLINE_ENV: &str = "FUNDFLOW_RUN_DEADLINE_SECS";
pub const RATE_LIMIT_ENV: &str = "FUNDFLOW_RATE_LIMIT_PER_MINUTE";
pub const API_KEY_ENV: &str = "FUNDFLOW_ALPHAVANTAGE_API_KEY";
pub const API_KEY_FALLBACK_ENV: &str = "ALPHAVANTAGE_API_KEY";
pub const BASE_URL_ENV: &str = "FUNDFLOW_ALPHAVANTAGE_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Token-bucket quota in front of the external API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub quota_limit: u32,
    pub quota_window: Duration,
}

impl RateLimit {
    pub const fn per_minute(quota_limit: u32) -> Self {
        Self {
            quota_limit,
            quota_window: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(5)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub request_timeout_ms: u64,
    /// Cancel the run after this long; `None` runs to completion.
    pub run_deadline: Option<Duration>,
    pub rate_limit: RateLimit,
    pub alphavantage_api_key: Option<String>,
    pub alphavantage_base_url: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            run_deadline: None,
            rate_limit: RateLimit::default(),
            alphavantage_api_key: None,
            alphavantage_base_url: String::from(DEFAULT_BASE_URL),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(CONCURRENCY_ENV) {
            config.concurrency = parse_positive(CONCURRENCY_ENV, &value)?;
        }
        if let Some(value) = lookup(REQUEST_TIMEOUT_ENV) {
            config.request_timeout_ms = parse_positive(REQUEST_TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = lookup(RUN_DEADLINE_ENV) {
            let seconds: u64 = parse_positive(RUN_DEADLINE_ENV, &value)?;
            config.run_deadline = Some(Duration::from_secs(seconds));
        }
        if let Some(value) = lookup(RATE_LIMIT_ENV) {
            config.rate_limit = RateLimit::per_minute(parse_positive(RATE_LIMIT_ENV, &value)?);
        }

        config.alphavantage_api_key = lookup(API_KEY_ENV)
            .or_else(|| lookup(API_KEY_FALLBACK_ENV))
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty());

        if let Some(value) = lookup(BASE_URL_ENV) {
            let trimmed = value.trim().trim_end_matches('/');
            if trimmed.is_empty() {
                return Err(ConfigError::Empty { name: BASE_URL_ENV });
            }
            config.alphavantage_base_url = trimmed.to_owned();
        }

        Ok(config)
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.alphavantage_api_key
            .as_deref()
            .ok_or(ConfigError::Missing { name: API_KEY_ENV })
    }
}

fn parse_positive<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let not_positive = || ConfigError::NotPositive {
        name,
        value: value.to_owned(),
    };
    let parsed = value.trim().parse::<T>().map_err(|_| not_positive())?;
    if parsed <= T::default() {
        return Err(not_positive());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_free_tier_policy() {
        let config = IngestConfig::from_lookup(lookup_from(&[])).expect("defaults");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.rate_limit, RateLimit::per_minute(5));
        assert_eq!(config.run_deadline, None);
        assert_eq!(config.alphavantage_base_url, DEFAULT_BASE_URL);
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn overlays_environment_values() {
        let config = IngestConfig::from_lookup(lookup_from(&[
            (CONCURRENCY_ENV, "8"),
            (RUN_DEADLINE_ENV, "300"),
            (RATE_LIMIT_ENV, "75"),
            (API_KEY_FALLBACK_ENV, "fallback-key"),
            (BASE_URL_ENV, "http://127.0.0.1:9000/"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.run_deadline, Some(Duration::from_secs(300)));
        assert_eq!(config.rate_limit.quota_limit, 75);
        assert_eq!(config.require_api_key(), Ok("fallback-key"));
        assert_eq!(config.alphavantage_base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn primary_api_key_wins_over_fallback() {
        let config = IngestConfig::from_lookup(lookup_from(&[
            (API_KEY_ENV, "primary"),
            (API_KEY_FALLBACK_ENV, "fallback"),
        ]))
        .expect("valid");
        assert_eq!(config.require_api_key(), Ok("primary"));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert_eq!(
            IngestConfig::from_lookup(lookup_from(&[(CONCURRENCY_ENV, "0")])),
            Err(ConfigError::NotPositive {
                name: CONCURRENCY_ENV,
                value: String::from("0"),
            })
        );
        assert!(IngestConfig::from_lookup(lookup_from(&[(REQUEST_TIMEOUT_ENV, "soon")])).is_err());
    }
}
