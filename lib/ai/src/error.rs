//! Error types for the AI crate.
//!
//! `LlmError` is returned by backends and by the `Completion` capability.
//! Callers that surface it wrap it in a rootcause `Report` or, for task
//! handlers, turn it into a task failure message.

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider is unavailable.
    ProviderUnavailable { provider: String, reason: String },
    /// Request failed.
    RequestFailed { reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    /// Maps a transport error from reqwest.
    pub(crate) fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::ResponseParseFailed {
                reason: e.to_string(),
            }
        } else {
            Self::RequestFailed {
                reason: e.to_string(),
            }
        }
    }

    /// Maps a non-success HTTP status and its body.
    pub(crate) fn from_status(
        status: reqwest::StatusCode,
        retry_after_secs: Option<u64>,
        body: &str,
    ) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited { retry_after_secs },
            401 | 403 => Self::InvalidConfig {
                reason: format!("API key rejected ({status})"),
            },
            _ => Self::RequestFailed {
                reason: format!("API error ({status}): {body}"),
            },
        }
    }
}
