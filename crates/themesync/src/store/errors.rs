use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Which rate limit a failed request ran into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitKind {
    /// The hourly quota is exhausted; `reset_at` is when it refills (if known).
    Primary { reset_at: Option<DateTime<Utc>> },
    /// Abuse-prevention throttling triggered by request bursts.
    Secondary { retry_after: Option<Duration> },
}

impl fmt::Display for RateLimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary {
                reset_at: Some(reset_at),
            } => write!(f, "primary, resets at {reset_at}"),
            Self::Primary { reset_at: None } => write!(f, "primary"),
            Self::Secondary {
                retry_after: Some(after),
            } => write!(f, "secondary, retry after {}s", after.as_secs()),
            Self::Secondary { retry_after: None } => write!(f, "secondary"),
        }
    }
}

/// Errors that can occur when talking to an object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Ref, commit, tree or blob does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Request rejected by a primary or secondary rate limit.
    #[error("Rate limited ({kind}): {message}")]
    RateLimited {
        kind: RateLimitKind,
        message: String,
    },

    /// Merge conflict or rejected ref update.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Any other non-success API response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Response body could not be decoded.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Unexpected/internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StoreError {
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Conflict-class failures: explicit conflicts, HTTP 409/422, or any
    /// message mentioning a conflict.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Api { status, message } => {
                matches!(status, 409 | 422) || mentions_conflict(message)
            }
            Self::Internal { message } => mentions_conflict(message),
            _ => false,
        }
    }

    /// Returns the rate limit classification, or `None` for errors that must
    /// not be retried.
    #[inline]
    pub fn rate_limit_kind(&self) -> Option<&RateLimitKind> {
        match self {
            Self::RateLimited { kind, .. } => Some(kind),
            _ => None,
        }
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        self.rate_limit_kind().is_some()
    }
}

fn mentions_conflict(message: &str) -> bool {
    message.to_ascii_lowercase().contains("conflict")
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include multi-line API payloads.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
