use std::time::Duration;

use thiserror::Error;

use crate::http::HttpError;
use crate::store::{RateLimitKind, StoreError};

/// Errors that can occur while collecting or publishing a theme.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Reading the theme files from the repository failed.
    #[error("Repository error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Theme not found: {id}")]
    NotFound { id: u64 },

    /// The theme store throttled the request.
    #[error("Theme store rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        /// Wait requested by the `Retry-After` header.
        retry_after: Option<Duration>,
    },

    #[error("Theme store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode theme store response: {0}")]
    Decode(String),

    #[error("Invalid file {path}: {message}")]
    InvalidFile { path: String, message: String },
}

impl ThemeError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ThemeError::NotFound { .. })
    }

    /// How a throttled request should be retried; `None` for other errors.
    #[must_use]
    pub fn rate_limit_kind(&self) -> Option<RateLimitKind> {
        match self {
            ThemeError::RateLimited { retry_after, .. } => Some(RateLimitKind::Secondary {
                retry_after: *retry_after,
            }),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ThemeError>;
