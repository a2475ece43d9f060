//! Themesync - keeps a theme repository's branches and its theme store in sync.
//!
//! The library reacts to GitHub webhook events: canonical branches are
//! published to the branches the theme store's editor commits to, editor
//! changes flow back, staging is rebased onto production, and labeled pull
//! requests get preview themes.
//!
//! All git work happens through the [`store::ObjectStore`] trait with
//! tree-level operations only: no clone, no working copy.
//!
//! # Features
//!
//! - `github` - GitHub git data API store, App authentication, PR comments
//! - `shopify` - Shopify Admin REST API theme publisher
//!
//! # Example
//!
//! ```ignore
//! use themesync::store::memory::MemoryStore;
//! use themesync::sync::{SyncOptions, sync_branch};
//!
//! let store = MemoryStore::new("acme/theme");
//! let result = sync_branch(&store, "production", &store, "sgc-production", &SyncOptions::default(), None).await?;
//! println!("{} added, {} updated", result.added, result.updated);
//! ```

pub mod batch;
pub mod blob;
pub mod http;
pub mod retry;
pub mod scope;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod theme;
pub mod webhook;

#[cfg(feature = "github")]
pub mod github;

pub use batch::{BatchConfig, run_batched};
pub use scope::SyncScope;
pub use store::{Branch, ObjectStore, StoreError};
pub use sync::{RebaseStrategy, SyncOptions, SyncResult, SyncStatus};
