//! Configuration: lookup tuning and environment settings.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::budget::DEFAULT_CREDIT_LIMIT;
use crate::error::{ConfigError, ConfigResult};
use crate::types::source::Source;

/// Default Firecrawl API endpoint.
pub const DEFAULT_FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Tuning of the lookup flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Credits one request may spend. Default: 10.
    pub max_credits: u32,

    /// Populated-field fraction at or above which no backup search runs.
    ///
    /// Default: 0.25.
    pub quality_threshold: f64,

    /// Lifetime of both cache layers' entries. Default: 24h.
    pub cache_ttl_secs: u64,

    /// Results requested per search call. Default: 3.
    pub search_limit: usize,

    /// Validated URLs extracted per source. Default: 1.
    pub max_urls_per_source: usize,

    /// Sources in priority order; the first is primary. Default: zillow, redfin.
    pub sources: Vec<Source>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_credits: DEFAULT_CREDIT_LIMIT,
            quality_threshold: 0.25,
            cache_ttl_secs: 24 * 60 * 60,
            search_limit: 3,
            max_urls_per_source: 1,
            sources: Source::ALL.to_vec(),
        }
    }
}

impl LookupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_credits(mut self, credits: u32) -> Self {
        self.max_credits = credits;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn with_max_urls_per_source(mut self, max: usize) -> Self {
        self.max_urls_per_source = max;
        self
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(ConfigError::Invalid {
                name: "quality_threshold",
                reason: format!("{} is outside 0.0..=1.0", self.quality_threshold),
            });
        }
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid {
                name: "sources",
                reason: "at least one source is required".into(),
            });
        }
        for (i, source) in self.sources.iter().enumerate() {
            if self.sources[..i].contains(source) {
                return Err(ConfigError::Invalid {
                    name: "sources",
                    reason: format!("{} listed twice", source),
                });
            }
        }
        if self.search_limit == 0 || self.max_urls_per_source == 0 {
            return Err(ConfigError::Invalid {
                name: "search_limit",
                reason: "search limit and URLs per source must be at least 1".into(),
            });
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "cache_ttl_secs",
                reason: "TTL must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Process settings loaded from the environment.
pub struct Settings {
    pub firecrawl_api_key: SecretString,
    pub firecrawl_api_url: String,
    pub lookup: LookupConfig,

    /// Wall-clock ceiling for one request. Default: 120s.
    pub request_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("firecrawl_api_key", &"[REDACTED]")
            .field("firecrawl_api_url", &self.firecrawl_api_url)
            .field("lookup", &self.lookup)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Settings {
    /// Load settings from environment variables, reading `.env` if present.
    pub fn from_env() -> ConfigResult<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load settings from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let api_key = get("FIRECRAWL_API_KEY").ok_or(ConfigError::Missing("FIRECRAWL_API_KEY"))?;
        let defaults = LookupConfig::default();

        let lookup = LookupConfig {
            max_credits: parse_or(get("HOME_INFO_MAX_CREDITS"), "HOME_INFO_MAX_CREDITS", defaults.max_credits)?,
            quality_threshold: parse_or(
                get("HOME_INFO_QUALITY_THRESHOLD"),
                "HOME_INFO_QUALITY_THRESHOLD",
                defaults.quality_threshold,
            )?,
            cache_ttl_secs: parse_or::<u64>(
                get("HOME_INFO_CACHE_TTL_HOURS"),
                "HOME_INFO_CACHE_TTL_HOURS",
                defaults.cache_ttl_secs / 3600,
            )?
            .saturating_mul(3600),
            ..defaults
        };
        lookup.validate()?;

        let timeout_secs = parse_or(
            get("HOME_INFO_REQUEST_TIMEOUT_SECS"),
            "HOME_INFO_REQUEST_TIMEOUT_SECS",
            120u64,
        )?;

        Ok(Self {
            firecrawl_api_key: SecretString::new(api_key.into_boxed_str()),
            firecrawl_api_url: get("FIRECRAWL_API_URL")
                .unwrap_or_else(|| DEFAULT_FIRECRAWL_API_URL.to_string()),
            lookup,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
