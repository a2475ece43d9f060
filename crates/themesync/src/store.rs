//! Object store abstraction.
//!
//! The synchronizer only ever talks to an [`ObjectStore`]: refs, commits,
//! trees and blobs of one repository. The GitHub git data API implements it
//! in [`crate::github`]; [`memory::MemoryStore`] implements it in memory.
//!
//! # Example
//!
//! ```ignore
//! use themesync::store::{Branch, ObjectStore};
//!
//! async fn head<S: ObjectStore>(store: &S) -> themesync::store::Result<String> {
//!     store.get_ref(Branch::Production.as_str()).await
//! }
//! ```

mod errors;
pub mod memory;
mod rate_limit;
mod types;

pub use errors::{RateLimitKind, Result, StoreError, short_error_message};
pub use rate_limit::{ApiRateLimiter, RateLimitedStore, rate_limits};
pub use types::{
    Blob, BlobEncoding, Branch, Commit, Comparison, EntryKind, MODE_FILE, MergeOutcome,
    ObjectStore, TreeEntry, TreeListing, TreeUpdate,
};
