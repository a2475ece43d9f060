//! GitHub API error types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::http::{HttpError, HttpResponse};
use crate::store::{RateLimitKind, StoreError};

/// Errors that can occur when interacting with GitHub outside the git data
/// API: app authentication and octocrab calls.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("GitHub App authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Unexpected response ({status}): {message}")]
    Response { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<jsonwebtoken::errors::Error> for GitHubError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        GitHubError::Auth(e.to_string())
    }
}

impl From<GitHubError> for StoreError {
    fn from(e: GitHubError) -> Self {
        match e {
            GitHubError::Http(e) => StoreError::network(e.to_string()),
            GitHubError::Response { status, message } => StoreError::api(status, message),
            GitHubError::Decode(message) => StoreError::decode(message),
            other => StoreError::internal(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// The `message` field of a GitHub error body, or the raw body.
pub(crate) fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string())
}

fn is_secondary_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("secondary rate limit") || lower.contains("abuse")
}

/// Map a non-success response to a [`StoreError`].
///
/// - 403/429 mentioning a secondary limit, or carrying `retry-after` while
///   quota remains: secondary rate limit
/// - 403/429 with `x-ratelimit-remaining: 0`: primary rate limit, reset
///   time from `x-ratelimit-reset`
/// - any other 429: secondary rate limit
/// - 404: not found, 409: conflict, everything else: API error
pub fn classify_response(response: &HttpResponse, resource: &str) -> StoreError {
    let status = response.status;
    let message = error_message(&response.body);

    if matches!(status, 403 | 429) {
        let remaining = response
            .header("x-ratelimit-remaining")
            .and_then(|v| v.trim().parse::<u64>().ok());
        let retry_after = response
            .header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let secondary = is_secondary_message(&message)
            || (retry_after.is_some() && remaining != Some(0));

        let kind = if secondary {
            Some(RateLimitKind::Secondary { retry_after })
        } else if remaining == Some(0) {
            let reset_at = response
                .header("x-ratelimit-reset")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
            Some(RateLimitKind::Primary { reset_at })
        } else if status == 429 {
            Some(RateLimitKind::Secondary { retry_after })
        } else {
            None
        };

        if let Some(kind) = kind {
            return StoreError::RateLimited { kind, message };
        }
    }

    match status {
        404 => StoreError::not_found(resource),
        409 => StoreError::conflict(message),
        _ => StoreError::api(status, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&str, &str)], message: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            body: serde_json::to_vec(&serde_json::json!({ "message": message })).unwrap(),
        }
    }

    #[test]
    fn exhausted_quota_is_primary_with_reset() {
        let err = classify_response(
            &response(
                403,
                &[
                    ("x-ratelimit-remaining", "0"),
                    ("x-ratelimit-reset", "1700000000"),
                ],
                "API rate limit exceeded for installation",
            ),
            "ref",
        );

        let Some(RateLimitKind::Primary {
            reset_at: Some(reset_at),
        }) = err.rate_limit_kind()
        else {
            panic!("expected primary rate limit, got {err:?}");
        };
        assert_eq!(reset_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn secondary_limit_is_detected_from_message() {
        let err = classify_response(
            &response(
                403,
                &[("x-ratelimit-remaining", "4000")],
                "You have exceeded a secondary rate limit. Please wait a few minutes.",
            ),
            "blob",
        );
        assert_eq!(
            err.rate_limit_kind(),
            Some(&RateLimitKind::Secondary { retry_after: None })
        );
    }

    #[test]
    fn retry_after_with_quota_left_is_secondary() {
        let err = classify_response(
            &response(
                403,
                &[("retry-after", "30"), ("x-ratelimit-remaining", "12")],
                "Forbidden",
            ),
            "tree",
        );
        assert_eq!(
            err.rate_limit_kind(),
            Some(&RateLimitKind::Secondary {
                retry_after: Some(Duration::from_secs(30))
            })
        );
    }

    #[test]
    fn plain_forbidden_is_not_rate_limited() {
        let err = classify_response(
            &response(403, &[], "Resource not accessible by integration"),
            "ref",
        );
        assert!(!err.is_rate_limited());
        assert!(matches!(err, StoreError::Api { status: 403, .. }));
    }

    #[test]
    fn status_mapping() {
        let missing = classify_response(&response(404, &[], "Not Found"), "ref heads/staging");
        assert!(missing.is_not_found());
        let conflict = classify_response(&response(409, &[], "Merge conflict"), "merge");
        assert!(conflict.is_conflict());

        let err = classify_response(&response(422, &[], "Update is not a fast forward"), "ref");
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "API error (422): Update is not a fast forward");
    }

    #[test]
    fn non_json_body_is_used_verbatim() {
        assert_eq!(error_message(b"  Bad Gateway \n"), "Bad Gateway");
    }
}
