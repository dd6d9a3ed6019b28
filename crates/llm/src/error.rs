//! Error types for the LLM client.

use thiserror::Error;

use crate::provider::ProviderKind;

/// Substrings that mark a failure as transient.
const RETRYABLE_MARKERS: &[&str] = &["rate limit", "timeout", "network", "503", "429"];

/// How the client should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No usable provider credential. Fatal before any call is made.
    Configuration,
    /// Rate limit, timeout, network or overload. Retried with backoff.
    Retryable,
    /// Anything else (auth, malformed request). Propagates immediately.
    NonRetryable,
}

/// Errors raised by providers and the client.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("{provider} request timeout: {reason}")]
    Timeout {
        provider: ProviderKind,
        reason: String,
    },

    #[error("{provider} network error: {reason}")]
    Network {
        provider: ProviderKind,
        reason: String,
    },

    #[error("{provider} returned an invalid response: {reason}")]
    InvalidResponse {
        provider: ProviderKind,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Result alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

impl LlmError {
    /// Build a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Map a transport failure onto a timeout or network error.
    pub fn transport(provider: ProviderKind, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider,
                reason: err.to_string(),
            }
        } else {
            Self::Network {
                provider,
                reason: err.to_string(),
            }
        }
    }

    /// Classify this error for the retry loop.
    ///
    /// Everything except configuration errors is classified by the
    /// lower-cased display text (rate limit, timeout, network, 503, 429).
    /// Other 5xx statuses such as 500 and 502 carry none of these markers
    /// and are not retried.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Configuration { .. } => ErrorClass::Configuration,
            _ if is_retryable_message(&self.to_string()) => ErrorClass::Retryable,
            _ => ErrorClass::NonRetryable,
        }
    }

    /// Whether the retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// Check an error message for a transient-failure marker.
pub fn is_retryable_message(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}
