//! Branch synchronization.
//!
//! # Module Structure
//!
//! - [`types`] - Core types: `SyncOptions`, `SyncResult`, `RebaseStrategy`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - Tree diff and publish: `sync_branch()`, `plan_sync()`
//! - [`rebase`] - Branch rebase: `rebase_onto_latest()`
//!
//! # Example
//!
//! ```ignore
//! use themesync::sync::{RebaseStrategy, SyncOptions, rebase_onto_latest, sync_branch};
//! use themesync::scope::SyncScope;
//!
//! let options = SyncOptions {
//!     scope: SyncScope::theme_without_json(),
//!     allow_deletes: true,
//!     ..SyncOptions::default()
//! };
//! let result = sync_branch(&store, "production", &store, "sgc-production", &options, None).await?;
//! rebase_onto_latest(&store, "staging", "production", RebaseStrategy::Squash, "[themesync]", None).await?;
//! ```

pub mod engine;
mod progress;
pub mod rebase;
mod types;

// Re-export types
pub use types::{RebaseOutcome, RebaseStrategy, SyncOptions, SyncResult, SyncStatus};

// Re-export constants
pub use types::{
    DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE, DEFAULT_COMMIT_MARKER, DEFAULT_ITEM_DELAY_MS,
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES, REQUEST_SPACING_MS,
    SECONDARY_RATE_LIMIT_FLOOR_SECS,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};

// Re-export engine functions for convenience
pub use engine::{PendingBlob, SyncPlan, plan_sync, sync_branch};
pub use rebase::rebase_onto_latest;
