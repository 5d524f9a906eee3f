//! Typed errors for the home-info library.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Per-source failures
//! that the orchestrator absorbs are values (`SourceFailure`), not errors;
//! only request-level problems surface as `LookupError`.

use thiserror::Error;

/// Request-level errors. These stop a request before any credit is spent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The address cannot be normalized into a cache key.
    #[error("malformed address: {reason}")]
    MalformedAddress { reason: String },

    /// The request failed boundary validation.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl LookupError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedAddress {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

/// Errors reported by a listing search/extract client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Provider throttled the call (HTTP 429).
    #[error("rate limited by {provider}")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Network failure, timeout, or provider-side 5xx.
    #[error("transient failure calling {provider}: {message}")]
    Transient { provider: String, message: String },

    /// Provider refused the request (4xx other than 429).
    #[error("{provider} rejected request ({status}): {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    /// Response body could not be interpreted.
    #[error("invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// The client could not be constructed.
    #[error("{provider} client setup failed: {message}")]
    Setup { provider: String, message: String },
}

impl ClientError {
    /// True when the provider throttled the call.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// True for failures that may succeed against another source or later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }

    /// False when the provider refuses our credentials or account, which
    /// makes every other source behind the same provider fail too.
    pub fn is_retryable_elsewhere(&self) -> bool {
        !matches!(
            self,
            Self::Rejected {
                status: 401 | 402 | 403,
                ..
            } | Self::Setup { .. }
        )
    }
}

/// Configuration errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is not set
    #[error("{0} must be set")]
    Missing(&'static str),

    /// Environment variable is set but unusable
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Result type alias for lookup operations.
pub type Result<T> = std::result::Result<T, LookupError>;

/// Result type alias for client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
