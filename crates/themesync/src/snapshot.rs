//! Branch snapshots: the flattened blob listing at a branch head.

use std::collections::BTreeMap;

use crate::store::{EntryKind, ObjectStore, Result};

/// A blob at one path of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub sha: String,
    pub mode: String,
}

/// Every blob reachable from a branch head, keyed by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSnapshot {
    pub branch: String,
    pub commit_sha: String,
    pub tree_sha: String,
    pub entries: BTreeMap<String, SnapshotEntry>,
    /// The store cut the recursive listing short.
    pub truncated: bool,
}

impl BranchSnapshot {
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&SnapshotEntry> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn blob_shas(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.sha.as_str())
    }
}

/// Resolve `branch` and read its full recursive tree.
///
/// Only blob entries are kept. A missing branch is reported as
/// `StoreError::NotFound`, which callers may treat as a skip.
pub async fn read_branch_snapshot<S>(store: &S, branch: &str) -> Result<BranchSnapshot>
where
    S: ObjectStore + ?Sized,
{
    let commit_sha = store.get_ref(branch).await?;
    let listing = store.get_tree(&commit_sha, true).await?;

    if listing.truncated {
        tracing::warn!(
            repository = store.repository(),
            branch,
            "Recursive tree listing was truncated; snapshot is incomplete"
        );
    }

    let entries: BTreeMap<String, SnapshotEntry> = listing
        .entries
        .into_iter()
        .filter(|entry| entry.kind == EntryKind::Blob)
        .map(|entry| {
            (
                entry.path,
                SnapshotEntry {
                    sha: entry.sha,
                    mode: entry.mode,
                },
            )
        })
        .collect();

    tracing::debug!(
        repository = store.repository(),
        branch,
        commit = %commit_sha,
        blobs = entries.len(),
        "Read branch snapshot"
    );

    Ok(BranchSnapshot {
        branch: branch.to_string(),
        commit_sha,
        tree_sha: listing.sha,
        entries,
        truncated: listing.truncated,
    })
}

/// Like [`read_branch_snapshot`], but a missing branch yields `Ok(None)`.
pub async fn read_optional_snapshot<S>(store: &S, branch: &str) -> Result<Option<BranchSnapshot>>
where
    S: ObjectStore + ?Sized,
{
    match read_branch_snapshot(store, branch).await {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
