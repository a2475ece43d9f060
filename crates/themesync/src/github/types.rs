//! GitHub API data types.
//!
//! Only the fields the synchronizer reads are modelled; serde ignores the
//! rest of each payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Blob, BlobEncoding, Comparison, Commit, EntryKind, TreeEntry, TreeListing};

#[derive(Debug, Deserialize)]
pub(crate) struct ShaRef {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefResponse {
    pub object: ShaRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitCommitResponse {
    pub sha: String,
    pub tree: ShaRef,
    pub parents: Vec<ShaRef>,
    pub message: String,
}

impl From<GitCommitResponse> for Commit {
    fn from(c: GitCommitResponse) -> Self {
        Commit {
            sha: c.sha,
            tree_sha: c.tree.sha,
            parents: c.parents.into_iter().map(|p| p.sha).collect(),
            message: c.message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TreeItem {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TreeResponse {
    pub sha: String,
    pub tree: Vec<TreeItem>,
    #[serde(default)]
    pub truncated: bool,
}

impl From<TreeResponse> for TreeListing {
    fn from(t: TreeResponse) -> Self {
        TreeListing {
            sha: t.sha,
            entries: t
                .tree
                .into_iter()
                .map(|item| TreeEntry {
                    path: item.path,
                    mode: item.mode,
                    kind: item.kind,
                    sha: item.sha,
                })
                .collect(),
            truncated: t.truncated,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlobResponse {
    pub sha: String,
    pub content: String,
    pub encoding: BlobEncoding,
}

impl From<BlobResponse> for Blob {
    fn from(b: BlobResponse) -> Self {
        // Base64 content comes wrapped at 60 columns.
        let content = match b.encoding {
            BlobEncoding::Base64 => b.content.split_whitespace().collect(),
            BlobEncoding::Utf8 => b.content,
        };
        Blob {
            sha: b.sha,
            content,
            encoding: b.encoding,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitDetail {
    pub message: String,
    pub tree: ShaRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompareCommit {
    pub sha: String,
    pub commit: CommitDetail,
    #[serde(default)]
    pub parents: Vec<ShaRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompareResponse {
    pub merge_base_commit: ShaRef,
    /// Commits on this page, oldest first.
    #[serde(default)]
    pub commits: Vec<CompareCommit>,
    /// Commits in the whole comparison, across all pages.
    #[serde(default)]
    pub total_commits: usize,
}

impl From<CompareResponse> for Comparison {
    fn from(c: CompareResponse) -> Self {
        Comparison {
            merge_base_sha: c.merge_base_commit.sha,
            commits: c
                .commits
                .into_iter()
                .map(|item| Commit {
                    sha: item.sha,
                    tree_sha: item.commit.tree.sha,
                    parents: item.parents.into_iter().map(|p| p.sha).collect(),
                    message: item.commit.message,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateBlobRequest<'a> {
    pub content: &'a str,
    pub encoding: BlobEncoding,
}

/// Tree entry in a create-tree request. `sha: None` serializes as `null`,
/// which deletes the path.
#[derive(Debug, Serialize)]
pub(crate) struct CreateTreeItem<'a> {
    pub path: &'a str,
    pub mode: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTreeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_tree: Option<&'a str>,
    pub tree: Vec<CreateTreeItem<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateCommitRequest<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateRefRequest<'a> {
    pub sha: &'a str,
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct MergeRequest<'a> {
    pub base: &'a str,
    pub head: &'a str,
    pub commit_message: &'a str,
}

/// Installation access token issued to a GitHub App.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl InstallationToken {
    /// Whether the token expires within `margin`.
    #[must_use]
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        self.expires_at - Utc::now() <= margin
    }
}
