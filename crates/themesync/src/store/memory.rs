//! In-memory object store.
//!
//! Behaves like the GitHub git data API closely enough to run the
//! synchronizer end to end without a network: content-addressed blobs,
//! immutable trees and commits, fast-forward checks on ref updates and a
//! file-level three-way merge. Every call is counted per [`StoreOp`] and
//! failures can be injected, which is what the engine tests rely on.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use super::errors::{Result, StoreError};
use super::types::{
    Blob, BlobEncoding, Comparison, Commit, EntryKind, MODE_FILE, MergeOutcome, ObjectStore,
    TreeEntry, TreeListing, TreeUpdate,
};

/// Object store operations, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetRef,
    GetCommit,
    GetTree,
    GetBlob,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
    Compare,
    CreateMerge,
}

impl StoreOp {
    pub const ALL: [StoreOp; 10] = [
        StoreOp::GetRef,
        StoreOp::GetCommit,
        StoreOp::GetTree,
        StoreOp::GetBlob,
        StoreOp::CreateBlob,
        StoreOp::CreateTree,
        StoreOp::CreateCommit,
        StoreOp::UpdateRef,
        StoreOp::Compare,
        StoreOp::CreateMerge,
    ];

    /// Whether the operation writes to the store.
    #[must_use]
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            StoreOp::CreateBlob
                | StoreOp::CreateTree
                | StoreOp::CreateCommit
                | StoreOp::UpdateRef
                | StoreOp::CreateMerge
        )
    }
}

/// path -> (mode, blob sha)
type FileMap = BTreeMap<String, (String, String)>;

#[derive(Default)]
struct Inner {
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, FileMap>,
    commits: HashMap<String, Commit>,
    refs: HashMap<String, String>,
    calls: HashMap<StoreOp, usize>,
    failures: HashMap<StoreOp, VecDeque<StoreError>>,
    sequence: u64,
}

/// In-memory repository implementing [`ObjectStore`].
///
/// Clones share the same underlying repository.
#[derive(Clone)]
pub struct MemoryStore {
    name: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

fn object_id(kind: &str, data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b" ");
    hasher.update(data.len().to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(data);
    let digest = hex::encode(hasher.finalize());
    digest[..40].to_string()
}

fn tree_id(files: &FileMap) -> String {
    let mut data = Vec::new();
    for (path, (mode, sha)) in files {
        data.extend_from_slice(format!("{mode} {path}\0{sha}\n").as_bytes());
    }
    object_id("tree", &data)
}

/// The sha a UTF-8 blob with this content gets in a [`MemoryStore`].
#[must_use]
pub fn blob_sha(content: &str) -> String {
    object_id("blob", content.as_bytes())
}

impl Inner {
    fn resolve(&self, name: &str) -> Option<String> {
        if let Some(sha) = self.refs.get(name) {
            return Some(sha.clone());
        }
        self.commits.contains_key(name).then(|| name.to_string())
    }

    fn tree_of(&self, sha: &str) -> Option<(String, &FileMap)> {
        if let Some(files) = self.trees.get(sha) {
            return Some((sha.to_string(), files));
        }
        let commit = self.commits.get(sha)?;
        self.trees
            .get(&commit.tree_sha)
            .map(|files| (commit.tree_sha.clone(), files))
    }

    fn store_tree(&mut self, files: FileMap) -> String {
        let sha = tree_id(&files);
        self.trees.entry(sha.clone()).or_insert(files);
        sha
    }

    fn store_commit(&mut self, message: &str, tree: &str, parents: &[String]) -> String {
        self.sequence += 1;
        let data = format!(
            "tree {tree}\nparents {}\nseq {}\n\n{message}",
            parents.join(" "),
            self.sequence
        );
        let sha = object_id("commit", data.as_bytes());
        self.commits.insert(
            sha.clone(),
            Commit {
                sha: sha.clone(),
                tree_sha: tree.to_string(),
                parents: parents.to_vec(),
                message: message.to_string(),
            },
        );
        sha
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut queue = VecDeque::from([descendant.to_string()]);
        let mut seen = HashSet::new();
        while let Some(sha) = queue.pop_front() {
            if sha == ancestor {
                return true;
            }
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    fn ancestors(&self, sha: &str) -> HashSet<String> {
        let mut queue = VecDeque::from([sha.to_string()]);
        let mut seen = HashSet::new();
        while let Some(sha) = queue.pop_front() {
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    /// Merge base plus the commits reachable from `head` only, oldest first.
    fn unique_commits(&self, base: &str, head: &str) -> Option<(String, Vec<Commit>)> {
        let base_ancestors = self.ancestors(base);
        let mut merge_base = None;
        let mut unique = Vec::new();
        let mut queue = VecDeque::from([head.to_string()]);
        let mut seen = HashSet::new();

        while let Some(sha) = queue.pop_front() {
            if !seen.insert(sha.clone()) {
                continue;
            }
            if base_ancestors.contains(&sha) {
                merge_base.get_or_insert(sha);
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                queue.extend(commit.parents.iter().cloned());
                unique.push(commit.clone());
            }
        }

        unique.reverse();
        merge_base.map(|mb| (mb, unique))
    }
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call and return an injected failure, if any.
    fn begin(&self, op: StoreOp) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        *inner.calls.entry(op).or_default() += 1;
        if let Some(err) = inner.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            return Err(err);
        }
        Ok(inner)
    }

    /// Make the next call of `op` fail with `error`.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Number of times `op` has been called.
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Total number of write calls.
    #[must_use]
    pub fn mutation_calls(&self) -> usize {
        let inner = self.lock();
        StoreOp::ALL
            .iter()
            .filter(|op| op.is_mutation())
            .map(|op| inner.calls.get(op).copied().unwrap_or(0))
            .sum()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Store a UTF-8 blob without counting a call.
    pub fn put_blob(&self, content: &str) -> String {
        let sha = blob_sha(content);
        self.lock()
            .blobs
            .entry(sha.clone())
            .or_insert_with(|| content.as_bytes().to_vec());
        sha
    }

    /// Commit exactly `files` (path, content) as the new tree of `branch`.
    ///
    /// The branch is created when missing; otherwise its head becomes the
    /// parent of the new commit.
    pub fn commit_files(&self, branch: &str, files: &[(&str, &str)], message: &str) -> String {
        let mut map = FileMap::new();
        for (path, content) in files {
            let sha = self.put_blob(content);
            map.insert((*path).to_string(), (MODE_FILE.to_string(), sha));
        }
        self.commit_map(branch, map, message)
    }

    /// Apply `(path, Some(content))` upserts and `(path, None)` deletions on
    /// top of the current tree of `branch`.
    pub fn commit_changes(
        &self,
        branch: &str,
        changes: &[(&str, Option<&str>)],
        message: &str,
    ) -> String {
        let mut map = {
            let inner = self.lock();
            inner
                .refs
                .get(branch)
                .and_then(|head| inner.tree_of(head))
                .map(|(_, files)| files.clone())
                .unwrap_or_default()
        };
        for (path, content) in changes {
            match content {
                Some(content) => {
                    let sha = self.put_blob(content);
                    map.insert((*path).to_string(), (MODE_FILE.to_string(), sha));
                }
                None => {
                    map.remove(*path);
                }
            }
        }
        self.commit_map(branch, map, message)
    }

    fn commit_map(&self, branch: &str, map: FileMap, message: &str) -> String {
        let mut inner = self.lock();
        let tree = inner.store_tree(map);
        let parents: Vec<String> = inner.refs.get(branch).cloned().into_iter().collect();
        let sha = inner.store_commit(message, &tree, &parents);
        inner.refs.insert(branch.to_string(), sha.clone());
        sha
    }

    /// Point `branch` at an existing commit without counting a call.
    pub fn set_branch(&self, branch: &str, sha: &str) {
        self.lock().refs.insert(branch.to_string(), sha.to_string());
    }

    pub fn delete_branch(&self, branch: &str) {
        self.lock().refs.remove(branch);
    }

    #[must_use]
    pub fn branch_head(&self, branch: &str) -> Option<String> {
        self.lock().refs.get(branch).cloned()
    }

    #[must_use]
    pub fn commit(&self, sha: &str) -> Option<Commit> {
        self.lock().commits.get(sha).cloned()
    }

    /// Path -> UTF-8 content of the tree at the head of `branch`.
    #[must_use]
    pub fn branch_files(&self, branch: &str) -> BTreeMap<String, String> {
        let inner = self.lock();
        let Some((_, files)) = inner.refs.get(branch).and_then(|head| inner.tree_of(head)) else {
            return BTreeMap::new();
        };
        files
            .iter()
            .map(|(path, (_, sha))| {
                let content = inner
                    .blobs
                    .get(sha)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default();
                (path.clone(), content)
            })
            .collect()
    }

    /// Whether the store holds a blob with this sha.
    #[must_use]
    pub fn has_blob(&self, sha: &str) -> bool {
        self.lock().blobs.contains_key(sha)
    }
}

fn listing(files: &FileMap, recursive: bool) -> Vec<TreeEntry> {
    let mut dirs: BTreeMap<String, FileMap> = BTreeMap::new();
    let mut entries = Vec::new();

    for (path, (mode, sha)) in files {
        let segments: Vec<&str> = path.split('/').collect();
        for depth in 1..segments.len() {
            if !recursive && depth > 1 {
                break;
            }
            let dir = segments[..depth].join("/");
            let rest = segments[depth..].join("/");
            dirs.entry(dir)
                .or_default()
                .insert(rest, (mode.clone(), sha.clone()));
        }
        if recursive || segments.len() == 1 {
            entries.push(TreeEntry::blob(path.clone(), mode.clone(), sha.clone()));
        }
    }

    for (dir, contents) in dirs {
        entries.push(TreeEntry {
            path: dir,
            mode: "040000".to_string(),
            kind: EntryKind::Tree,
            sha: tree_id(&contents),
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn repository(&self) -> &str {
        &self.name
    }

    async fn get_ref(&self, branch: &str) -> Result<String> {
        let inner = self.begin(StoreOp::GetRef)?;
        inner
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("ref heads/{branch}")))
    }

    async fn get_commit(&self, sha: &str) -> Result<Commit> {
        let inner = self.begin(StoreOp::GetCommit)?;
        inner
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("commit {sha}")))
    }

    async fn get_tree(&self, sha: &str, recursive: bool) -> Result<TreeListing> {
        let inner = self.begin(StoreOp::GetTree)?;
        let (tree_sha, files) = inner
            .tree_of(sha)
            .ok_or_else(|| StoreError::not_found(format!("tree {sha}")))?;
        Ok(TreeListing {
            sha: tree_sha,
            entries: listing(files, recursive),
            truncated: false,
        })
    }

    async fn get_blob(&self, sha: &str) -> Result<Blob> {
        let inner = self.begin(StoreOp::GetBlob)?;
        let bytes = inner
            .blobs
            .get(sha)
            .ok_or_else(|| StoreError::not_found(format!("blob {sha}")))?;
        Ok(Blob {
            sha: sha.to_string(),
            content: STANDARD.encode(bytes),
            encoding: BlobEncoding::Base64,
        })
    }

    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<String> {
        let mut inner = self.begin(StoreOp::CreateBlob)?;
        let bytes = match encoding {
            BlobEncoding::Utf8 => content.as_bytes().to_vec(),
            BlobEncoding::Base64 => {
                let compact: String = content.split_whitespace().collect();
                STANDARD
                    .decode(compact)
                    .map_err(|e| StoreError::api(422, format!("invalid base64 content: {e}")))?
            }
        };
        let sha = object_id("blob", &bytes);
        inner.blobs.entry(sha.clone()).or_insert(bytes);
        Ok(sha)
    }

    async fn create_tree(&self, base_tree: Option<&str>, entries: &[TreeUpdate]) -> Result<String> {
        let mut inner = self.begin(StoreOp::CreateTree)?;
        let mut files = match base_tree {
            Some(base) => inner
                .trees
                .get(base)
                .cloned()
                .ok_or_else(|| StoreError::api(422, format!("Invalid base_tree: {base}")))?,
            None => FileMap::new(),
        };

        for entry in entries {
            match &entry.sha {
                Some(sha) => {
                    if !inner.blobs.contains_key(sha) {
                        return Err(StoreError::api(
                            422,
                            format!("Invalid tree info: blob {sha} does not exist"),
                        ));
                    }
                    files.insert(entry.path.clone(), (entry.mode.clone(), sha.clone()));
                }
                None => {
                    files.remove(&entry.path);
                }
            }
        }

        Ok(inner.store_tree(files))
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let mut inner = self.begin(StoreOp::CreateCommit)?;
        if !inner.trees.contains_key(tree) {
            return Err(StoreError::api(422, format!("Tree {tree} does not exist")));
        }
        if let Some(missing) = parents.iter().find(|p| !inner.commits.contains_key(*p)) {
            return Err(StoreError::api(
                422,
                format!("Parent {missing} does not exist"),
            ));
        }
        Ok(inner.store_commit(message, tree, parents))
    }

    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<()> {
        let mut inner = self.begin(StoreOp::UpdateRef)?;
        if !inner.commits.contains_key(sha) {
            return Err(StoreError::api(422, format!("Object {sha} does not exist")));
        }
        let current = inner
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("ref heads/{branch}")))?;
        if !force && !inner.is_ancestor(&current, sha) {
            return Err(StoreError::api(422, "Update is not a fast forward"));
        }
        inner.refs.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn compare(&self, base: &str, head: &str) -> Result<Comparison> {
        let inner = self.begin(StoreOp::Compare)?;
        let base_sha = inner
            .resolve(base)
            .ok_or_else(|| StoreError::not_found(format!("compare base {base}")))?;
        let head_sha = inner
            .resolve(head)
            .ok_or_else(|| StoreError::not_found(format!("compare head {head}")))?;
        let (merge_base_sha, commits) = inner
            .unique_commits(&base_sha, &head_sha)
            .ok_or_else(|| StoreError::not_found(format!("common ancestor of {base} and {head}")))?;
        Ok(Comparison {
            merge_base_sha,
            commits,
        })
    }

    async fn create_merge(&self, base: &str, head: &str, message: &str) -> Result<MergeOutcome> {
        let mut inner = self.begin(StoreOp::CreateMerge)?;
        let base_sha = inner
            .refs
            .get(base)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("ref heads/{base}")))?;
        let head_sha = inner
            .resolve(head)
            .ok_or_else(|| StoreError::not_found(format!("merge head {head}")))?;

        if inner.is_ancestor(&head_sha, &base_sha) {
            return Ok(MergeOutcome::NothingToMerge);
        }

        let (merge_base, _) = inner
            .unique_commits(&base_sha, &head_sha)
            .ok_or_else(|| StoreError::not_found(format!("common ancestor of {base} and {head}")))?;

        let empty = FileMap::new();
        let ancestor = inner.tree_of(&merge_base).map(|(_, f)| f).unwrap_or(&empty);
        let ours = inner.tree_of(&base_sha).map(|(_, f)| f).unwrap_or(&empty);
        let theirs = inner.tree_of(&head_sha).map(|(_, f)| f).unwrap_or(&empty);

        let paths: BTreeSet<&String> = ancestor
            .keys()
            .chain(ours.keys())
            .chain(theirs.keys())
            .collect();

        let mut merged = FileMap::new();
        for path in paths {
            let a = ancestor.get(path);
            let o = ours.get(path);
            let t = theirs.get(path);
            let pick = if o == t || t == a {
                o
            } else if o == a {
                t
            } else {
                return Ok(MergeOutcome::Conflict);
            };
            if let Some(entry) = pick {
                merged.insert(path.clone(), entry.clone());
            }
        }

        let tree = inner.store_tree(merged);
        let sha = inner.store_commit(message, &tree, &[base_sha, head_sha]);
        inner.refs.insert(base.to_string(), sha.clone());
        Ok(MergeOutcome::Merged { sha })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_content_yields_identical_blob_sha() {
        let store = MemoryStore::new("acme/theme");
        let utf8 = store
            .create_blob("hello", BlobEncoding::Utf8)
            .await
            .unwrap();
        let b64 = store
            .create_blob(&STANDARD.encode("hello"), BlobEncoding::Base64)
            .await
            .unwrap();
        assert_eq!(utf8, b64);
        assert_eq!(utf8, blob_sha("hello"));
    }

    #[tokio::test]
    async fn recursive_listing_includes_directories() {
        let store = MemoryStore::new("acme/theme");
        let head = store.commit_files(
            "production",
            &[("assets/js/a.js", "a"), ("README.md", "r")],
            "init",
        );

        let listing = store.get_tree(&head, true).await.unwrap();
        let kinds: Vec<(&str, EntryKind)> = listing
            .entries
            .iter()
            .map(|e| (e.path.as_str(), e.kind))
            .collect();
        assert!(kinds.contains(&("assets", EntryKind::Tree)));
        assert!(kinds.contains(&("assets/js", EntryKind::Tree)));
        assert!(kinds.contains(&("assets/js/a.js", EntryKind::Blob)));
        assert!(kinds.contains(&("README.md", EntryKind::Blob)));

        let shallow = store.get_tree(&head, false).await.unwrap();
        assert_eq!(shallow.entries.len(), 2);
    }

    #[tokio::test]
    async fn update_ref_rejects_non_fast_forward_unless_forced() {
        let store = MemoryStore::new("acme/theme");
        let first = store.commit_files("production", &[("a", "1")], "one");
        store.commit_files("production", &[("a", "2")], "two");

        let err = store
            .update_ref("production", &first, false)
            .await
            .expect_err("not a fast forward");
        assert!(err.is_conflict());

        store.update_ref("production", &first, true).await.unwrap();
        assert_eq!(store.branch_head("production"), Some(first));
    }

    #[tokio::test]
    async fn compare_returns_unique_commits_oldest_first() {
        let store = MemoryStore::new("acme/theme");
        let base = store.commit_files("production", &[("a", "1")], "base");
        store.set_branch("staging", &base);
        let c1 = store.commit_changes("staging", &[("b", Some("1"))], "first");
        let c2 = store.commit_changes("staging", &[("c", Some("1"))], "second");

        let cmp = store.compare("production", "staging").await.unwrap();
        assert_eq!(cmp.merge_base_sha, base);
        let shas: Vec<&str> = cmp.commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec![c1.as_str(), c2.as_str()]);
    }

    #[tokio::test]
    async fn merge_combines_disjoint_changes_and_detects_conflicts() {
        let store = MemoryStore::new("acme/theme");
        let base = store.commit_files("production", &[("a", "1"), ("b", "1")], "base");
        store.set_branch("sgc-production", &base);
        store.commit_changes("production", &[("a", Some("2"))], "ours");
        store.commit_changes("sgc-production", &[("b", Some("2"))], "theirs");

        let outcome = store
            .create_merge("production", "sgc-production", "merge")
            .await
            .unwrap();
        let MergeOutcome::Merged { sha } = outcome else {
            panic!("expected merge, got {outcome:?}");
        };
        assert_eq!(store.commit(&sha).unwrap().parents.len(), 2);
        let files = store.branch_files("production");
        assert_eq!(files["a"], "2");
        assert_eq!(files["b"], "2");

        store.commit_changes("production", &[("a", Some("3"))], "ours again");
        store.commit_changes("sgc-production", &[("a", Some("4"))], "theirs again");
        let outcome = store
            .create_merge("production", "sgc-production", "merge")
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Conflict);
    }

    #[tokio::test]
    async fn injected_failures_are_returned_once_and_counted() {
        let store = MemoryStore::new("acme/theme");
        store.commit_files("production", &[("a", "1")], "base");
        store.fail_next(StoreOp::GetRef, StoreError::network("reset by peer"));

        assert!(store.get_ref("production").await.is_err());
        assert!(store.get_ref("production").await.is_ok());
        assert_eq!(store.calls(StoreOp::GetRef), 2);
        assert_eq!(store.mutation_calls(), 0);
    }
}
