use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::Result;

/// Mode of a regular, non-executable file.
pub const MODE_FILE: &str = "100644";

/// The fixed branch taxonomy the synchronizer operates on.
///
/// Plain-named branches are canonical; the `sgc-*` branches mirror what the
/// theme store's own editor commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Branch {
    Production,
    Staging,
    SgcProduction,
    SgcStaging,
}

impl Branch {
    pub const ALL: [Branch; 4] = [
        Branch::Production,
        Branch::Staging,
        Branch::SgcProduction,
        Branch::SgcStaging,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Branch::Production => "production",
            Branch::Staging => "staging",
            Branch::SgcProduction => "sgc-production",
            Branch::SgcStaging => "sgc-staging",
        }
    }

    /// The branch on the other side of the store mirror.
    #[must_use]
    pub fn mirror(self) -> Branch {
        match self {
            Branch::Production => Branch::SgcProduction,
            Branch::Staging => Branch::SgcStaging,
            Branch::SgcProduction => Branch::Production,
            Branch::SgcStaging => Branch::Staging,
        }
    }

    #[must_use]
    pub fn is_store_mirror(self) -> bool {
        matches!(self, Branch::SgcProduction | Branch::SgcStaging)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Branch::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| format!("unknown branch: {s}"))
    }
}

/// A commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub tree_sha: String,
    pub parents: Vec<String>,
    pub message: String,
}

/// Kind of object a tree entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

/// One entry of a flattened recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    pub kind: EntryKind,
    pub sha: String,
}

impl TreeEntry {
    #[must_use]
    pub fn blob(path: impl Into<String>, mode: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: mode.into(),
            kind: EntryKind::Blob,
            sha: sha.into(),
        }
    }
}

/// Result of reading a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeListing {
    /// Sha of the tree object itself.
    pub sha: String,
    pub entries: Vec<TreeEntry>,
    /// Set when the store cut the recursive listing short.
    pub truncated: bool,
}

/// An entry submitted when creating a tree.
///
/// `sha: None` always means "delete this path".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeUpdate {
    pub path: String,
    pub mode: String,
    pub sha: Option<String>,
}

impl TreeUpdate {
    #[must_use]
    pub fn upsert(path: impl Into<String>, mode: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: mode.into(),
            sha: Some(sha.into()),
        }
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: MODE_FILE.to_string(),
            sha: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.sha.is_none()
    }
}

/// Content encoding reported by the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlobEncoding {
    Base64,
    #[serde(rename = "utf-8")]
    Utf8,
}

impl BlobEncoding {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BlobEncoding::Base64 => "base64",
            BlobEncoding::Utf8 => "utf-8",
        }
    }
}

/// A blob with its raw content as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub sha: String,
    pub content: String,
    pub encoding: BlobEncoding,
}

/// Commits unique to `head` relative to the merge base with `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub merge_base_sha: String,
    /// Oldest first.
    pub commits: Vec<Commit>,
}

/// Outcome of asking the store to merge one branch into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { sha: String },
    NothingToMerge,
    Conflict,
}

/// Content-addressable object store holding one repository.
///
/// This is the only surface the synchronizer talks to; implementations are
/// the GitHub git data API and an in-memory store.
///
/// # Implementation Notes
///
/// Implementors should:
/// - Return `StoreError::NotFound` for missing refs and objects
/// - Return `StoreError::RateLimited` with the right `RateLimitKind` so the
///   request executor can decide how long to wait
/// - Never force a ref update unless `force` is set
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable repository identifier, used in logs.
    fn repository(&self) -> &str;

    /// Resolve a branch name to its head commit sha.
    async fn get_ref(&self, branch: &str) -> Result<String>;

    async fn get_commit(&self, sha: &str) -> Result<Commit>;

    /// Read a tree. `sha` may be a tree or a commit sha.
    async fn get_tree(&self, sha: &str, recursive: bool) -> Result<TreeListing>;

    async fn get_blob(&self, sha: &str) -> Result<Blob>;

    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<String>;

    async fn create_tree(&self, base_tree: Option<&str>, entries: &[TreeUpdate]) -> Result<String>;

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String>;

    /// Move a branch. Without `force` only fast-forwards are accepted.
    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<()>;

    async fn compare(&self, base: &str, head: &str) -> Result<Comparison>;

    /// Merge `head` into `base`, letting the store compute the merge.
    async fn create_merge(&self, base: &str, head: &str, message: &str) -> Result<MergeOutcome>;
}
