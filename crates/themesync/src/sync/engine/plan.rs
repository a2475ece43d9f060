use std::collections::{BTreeSet, HashSet};

use crate::snapshot::BranchSnapshot;
use crate::store::TreeUpdate;
use crate::sync::types::SyncOptions;

/// A source blob the destination store does not hold yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBlob {
    /// First path the blob was seen at, for logging.
    pub path: String,
    pub sha: String,
}

/// The tree changes that bring a destination in line with a source.
///
/// Upserts carry the source blob sha; the engine swaps in the
/// destination sha once pending blobs are copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub updates: Vec<TreeUpdate>,
    /// Distinct blobs to copy before the tree can be built.
    pub pending_blobs: Vec<PendingBlob>,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncPlan {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Diff two snapshots under `options`.
///
/// In-scope source paths whose sha differs from the destination become
/// upserts (an add when the destination lacks the path). With deletes
/// allowed, destination paths in the deletion scope that have no in-scope
/// source counterpart become deletions. Equality is sha equality only.
///
/// A truncated source listing never produces deletions: paths past the cut
/// would look deleted when they are only unlisted.
#[must_use]
pub fn plan_sync(
    source: &BranchSnapshot,
    destination: &BranchSnapshot,
    options: &SyncOptions,
) -> SyncPlan {
    let mut known: HashSet<&str> = destination.blob_shas().collect();
    if options.shared_objects {
        known.extend(source.blob_shas());
    }

    let mut plan = SyncPlan::default();
    let mut source_paths: BTreeSet<&str> = BTreeSet::new();
    let mut queued: HashSet<&str> = HashSet::new();

    for (path, entry) in &source.entries {
        if !options.scope.is_in_scope(path) {
            continue;
        }
        source_paths.insert(path.as_str());

        match destination.get(path) {
            Some(existing) if existing.sha == entry.sha => continue,
            Some(_) => plan.updated += 1,
            None => plan.added += 1,
        }

        if !known.contains(entry.sha.as_str()) && queued.insert(entry.sha.as_str()) {
            plan.pending_blobs.push(PendingBlob {
                path: path.clone(),
                sha: entry.sha.clone(),
            });
        }
        plan.updates.push(TreeUpdate::upsert(
            path.as_str(),
            entry.mode.as_str(),
            entry.sha.as_str(),
        ));
    }

    if options.allow_deletes && source.truncated {
        tracing::warn!(
            branch = %source.branch,
            "Source tree listing is truncated, skipping deletions"
        );
    } else if options.allow_deletes {
        let deletion_scope = options.deletion_scope();
        for path in destination.paths() {
            if deletion_scope.is_in_scope(path) && !source_paths.contains(path) {
                plan.deleted += 1;
                plan.updates.push(TreeUpdate::delete(path));
            }
        }
    }

    plan
}
