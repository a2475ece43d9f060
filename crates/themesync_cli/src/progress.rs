//! Progress reporting for sync operations.
//!
//! Library progress events are rendered as structured tracing lines, both
//! for the webhook server and for one-shot commands.

use themesync::sync::{ProgressCallback, SyncProgress};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter {
    repository: String,
}

impl LoggingReporter {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn into_callback(self) -> ProgressCallback {
        Box::new(move |event| self.handle(event))
    }

    pub fn handle(&self, event: SyncProgress) {
        let repository = self.repository.as_str();
        match event {
            SyncProgress::ReadingSnapshot { repository: repo, branch } => {
                tracing::debug!(repository = %repo, branch = %branch, "Reading branch snapshot");
            }

            SyncProgress::PlanReady {
                source,
                destination,
                added,
                updated,
                deleted,
                pending_blobs,
            } => {
                tracing::info!(
                    repository,
                    source = %source,
                    destination = %destination,
                    added,
                    updated,
                    deleted,
                    pending_blobs,
                    "Planned sync"
                );
            }

            SyncProgress::UploadingBlobs { count } => {
                tracing::info!(repository, count, "Uploading blobs");
            }

            SyncProgress::BlobUploaded { path, sha } => {
                tracing::debug!(repository, path = %path, sha = %sha, "Uploaded blob");
            }

            SyncProgress::Committed { destination, sha } => {
                tracing::info!(repository, destination = %destination, sha = %sha, "Published commit");
            }

            SyncProgress::NoChanges {
                source,
                destination,
            } => {
                tracing::info!(
                    repository,
                    source = %source,
                    destination = %destination,
                    "Already in sync"
                );
            }

            SyncProgress::FallbackMerge { destination, error } => {
                tracing::warn!(
                    repository,
                    destination = %destination,
                    error = %error,
                    "Publish conflicted, merged instead"
                );
            }

            SyncProgress::Degraded {
                destination,
                error,
                fallback_error,
            } => {
                tracing::error!(
                    repository,
                    destination = %destination,
                    error = %error,
                    fallback_error = %fallback_error,
                    "Sync left destination unchanged"
                );
            }

            SyncProgress::Rebased {
                branch,
                onto,
                sha,
                commits,
            } => {
                tracing::info!(repository, branch = %branch, onto = %onto, sha = %sha, commits, "Rebased");
            }

            SyncProgress::RebaseSkipped { branch, reason } => {
                tracing::debug!(repository, branch = %branch, reason = %reason, "Rebase skipped");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(repository, message = %message, "Warning");
            }

            _ => {}
        }
    }
}
