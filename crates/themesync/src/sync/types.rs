//! Shared sync types and constants.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::batch::BatchConfig;
use crate::scope::SyncScope;

/// Maximum backoff delay in milliseconds when rate limited.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum retries for a single rate-limited request.
pub const MAX_RETRIES: usize = 5;

/// Pause before the first attempt of every store call.
pub const REQUEST_SPACING_MS: u64 = 100;

/// GitHub asks clients to wait at least a minute after a secondary limit.
pub const SECONDARY_RATE_LIMIT_FLOOR_SECS: u64 = 60;

/// Default number of blob uploads per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default pause between batches in milliseconds.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1_000;

/// Default pause between items of one batch in milliseconds.
pub const DEFAULT_ITEM_DELAY_MS: u64 = 100;

/// Marker carried by every commit the synchronizer creates.
pub const DEFAULT_COMMIT_MARKER: &str = "[themesync]";

/// Options for one [`sync_branch`](super::sync_branch) invocation.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Paths of the source that are published.
    pub scope: SyncScope,
    /// Scope used when scanning the destination for deletions.
    ///
    /// `None` uses `scope`, so both directions are filtered the same way.
    pub delete_scope: Option<SyncScope>,
    /// Delete in-scope destination paths missing from the source.
    pub allow_deletes: bool,
    /// Source and destination share one object database (same repository),
    /// so no blob ever needs copying.
    pub shared_objects: bool,
    /// Pacing of blob uploads.
    pub batch: BatchConfig,
    /// Prefix for created commit messages.
    pub commit_marker: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            scope: SyncScope::theme(),
            delete_scope: None,
            allow_deletes: false,
            shared_objects: false,
            batch: BatchConfig::default(),
            commit_marker: DEFAULT_COMMIT_MARKER.to_string(),
        }
    }
}

impl SyncOptions {
    /// The scope deletions are evaluated against.
    #[must_use]
    pub fn deletion_scope(&self) -> &SyncScope {
        self.delete_scope.as_ref().unwrap_or(&self.scope)
    }
}

/// How a sync run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// A new commit was published on the destination.
    Committed,
    /// Destination already matched the source.
    NoOp,
    /// Publishing hit a conflict and the store merged the branches instead.
    FallbackMerged,
    /// Publishing and the merge fallback both failed; nothing was changed.
    Degraded,
}

/// Result of a sync operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub source: String,
    pub destination: String,
    /// Paths newly created on the destination.
    pub added: usize,
    /// Paths whose blob changed.
    pub updated: usize,
    /// Paths removed from the destination.
    pub deleted: usize,
    /// Blobs uploaded to the destination store.
    pub blobs_transferred: usize,
    /// Commit the destination points at after the run, when it moved.
    pub commit_sha: Option<String>,
    pub status: SyncStatus,
}

impl SyncResult {
    pub(crate) fn noop(source: &str, destination: &str) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            added: 0,
            updated: 0,
            deleted: 0,
            blobs_transferred: 0,
            commit_sha: None,
            status: SyncStatus::NoOp,
        }
    }

    /// Whether the run changed nothing.
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.status == SyncStatus::NoOp
    }

    /// Total number of tree changes.
    #[inline]
    #[must_use]
    pub fn changes(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

/// How a branch is moved onto a newer base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebaseStrategy {
    /// One commit carrying the base's tree.
    #[default]
    Squash,
    /// Recreate each unique commit, oldest first, on top of the base.
    OrderedReplay,
}

impl RebaseStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RebaseStrategy::Squash => "squash",
            RebaseStrategy::OrderedReplay => "ordered-replay",
        }
    }
}

impl fmt::Display for RebaseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebaseStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squash" => Ok(RebaseStrategy::Squash),
            "ordered-replay" | "replay" => Ok(RebaseStrategy::OrderedReplay),
            other => Err(format!("unknown rebase strategy: {other}")),
        }
    }
}

/// Result of a rebase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RebaseOutcome {
    pub rebased: bool,
    /// New head of the rebased branch.
    pub new_sha: Option<String>,
}

impl RebaseOutcome {
    pub(crate) fn skipped() -> Self {
        Self::default()
    }

    pub(crate) fn moved_to(sha: String) -> Self {
        Self {
            rebased: true,
            new_sha: Some(sha),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_options_default() {
        let options = SyncOptions::default();

        assert_eq!(options.scope, SyncScope::theme());
        assert!(options.delete_scope.is_none());
        assert!(!options.allow_deletes);
        assert!(!options.shared_objects);
        assert_eq!(options.commit_marker, DEFAULT_COMMIT_MARKER);
    }

    #[test]
    fn deletion_scope_defaults_to_the_sync_scope() {
        let mut options = SyncOptions {
            scope: SyncScope::theme_without_json(),
            ..SyncOptions::default()
        };
        assert_eq!(options.deletion_scope(), &SyncScope::theme_without_json());

        options.delete_scope = Some(SyncScope::theme());
        assert_eq!(options.deletion_scope(), &SyncScope::theme());
    }

    #[test]
    fn test_noop_result() {
        let result = SyncResult::noop("production", "sgc-production");

        assert!(result.is_noop());
        assert_eq!(result.changes(), 0);
        assert!(result.commit_sha.is_none());
    }

    #[test]
    fn rebase_strategy_parses_from_config_and_cli() {
        assert_eq!("squash".parse(), Ok(RebaseStrategy::Squash));
        assert_eq!("ordered-replay".parse(), Ok(RebaseStrategy::OrderedReplay));
        assert!("merge".parse::<RebaseStrategy>().is_err());

        let strategy: RebaseStrategy = serde_json::from_str("\"ordered-replay\"").unwrap();
        assert_eq!(strategy, RebaseStrategy::OrderedReplay);
        assert_eq!(RebaseStrategy::default(), RebaseStrategy::Squash);
    }
}
