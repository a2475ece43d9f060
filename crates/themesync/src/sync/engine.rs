//! Tree diff and publish engine.
//!
//! Brings a destination branch in line with the in-scope files of a source
//! branch in a single linear commit:
//!
//! 1. read both snapshots
//! 2. diff them with [`plan_sync`]
//! 3. copy missing blobs through the batch scheduler
//! 4. create tree, commit and fast-forward the destination ref
//!
//! A conflict while writing falls back to a store-side merge; if that fails
//! too, the run ends [`SyncStatus::Degraded`] instead of returning an error.
//!
//! # Example
//!
//! ```ignore
//! use themesync::sync::{SyncOptions, sync_branch};
//!
//! let result = sync_branch(&store, "production", &store, "sgc-production", &options, None).await?;
//! println!("{} added, {} updated, {} deleted", result.added, result.updated, result.deleted);
//! ```

mod plan;
mod publish;

use std::collections::HashMap;

use crate::batch::run_batched;
use crate::blob::BlobTransfer;
use crate::snapshot::read_branch_snapshot;
use crate::store::{ObjectStore, Result};

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{SyncOptions, SyncResult, SyncStatus};

pub use plan::{PendingBlob, SyncPlan, plan_sync};
use publish::{PublishOutcome, publish};

/// Commit message for a publish commit.
fn commit_message(marker: &str, source: &str, destination: &str, plan: &SyncPlan) -> String {
    format!(
        "{marker} Sync {source} into {destination}\n\n{} added, {} updated, {} deleted",
        plan.added, plan.updated, plan.deleted
    )
}

/// Publish the in-scope files of `source_branch` onto `destination_branch`.
///
/// Both branches must exist; a missing one is returned as
/// `StoreError::NotFound`. Running this twice without changes to the
/// source yields a no-op the second time.
pub async fn sync_branch<S, D>(
    source: &S,
    source_branch: &str,
    destination: &D,
    destination_branch: &str,
    options: &SyncOptions,
    on_progress: Option<&ProgressCallback>,
) -> Result<SyncResult>
where
    S: ObjectStore + ?Sized,
    D: ObjectStore + ?Sized,
{
    emit(
        on_progress,
        SyncProgress::ReadingSnapshot {
            repository: source.repository().to_string(),
            branch: source_branch.to_string(),
        },
    );
    let source_snapshot = read_branch_snapshot(source, source_branch).await?;

    emit(
        on_progress,
        SyncProgress::ReadingSnapshot {
            repository: destination.repository().to_string(),
            branch: destination_branch.to_string(),
        },
    );
    let destination_snapshot = read_branch_snapshot(destination, destination_branch).await?;

    for snapshot in [&source_snapshot, &destination_snapshot] {
        if snapshot.truncated {
            emit(
                on_progress,
                SyncProgress::Warning {
                    message: format!(
                        "Tree listing of {} was truncated; files past the cut are not synced \
                         and no files are deleted",
                        snapshot.branch
                    ),
                },
            );
        }
    }

    let plan = plan_sync(&source_snapshot, &destination_snapshot, options);

    if plan.is_empty() {
        tracing::info!(
            source = source_branch,
            destination = destination_branch,
            "Branches already in sync"
        );
        emit(
            on_progress,
            SyncProgress::NoChanges {
                source: source_branch.to_string(),
                destination: destination_branch.to_string(),
            },
        );
        return Ok(SyncResult::noop(source_branch, destination_branch));
    }

    emit(
        on_progress,
        SyncProgress::PlanReady {
            source: source_branch.to_string(),
            destination: destination_branch.to_string(),
            added: plan.added,
            updated: plan.updated,
            deleted: plan.deleted,
            pending_blobs: plan.pending_blobs.len(),
        },
    );

    let known = destination_snapshot.blob_shas().map(str::to_string);
    let transfer = BlobTransfer::new(source, destination, known);
    let mut resolved: HashMap<String, String> = HashMap::new();

    if !plan.pending_blobs.is_empty() {
        emit(
            on_progress,
            SyncProgress::UploadingBlobs {
                count: plan.pending_blobs.len(),
            },
        );

        let transfer_ref = &transfer;
        let copied = run_batched(
            plan.pending_blobs.clone(),
            move |pending: PendingBlob| async move {
                let sha = transfer_ref.ensure_blob(&pending.sha, &pending.path).await?;
                emit(
                    on_progress,
                    SyncProgress::BlobUploaded {
                        path: pending.path,
                        sha: sha.clone(),
                    },
                );
                Ok::<_, crate::store::StoreError>((pending.sha, sha))
            },
            &options.batch,
        )
        .await?;
        resolved.extend(copied);
    }

    let updates: Vec<_> = plan
        .updates
        .iter()
        .cloned()
        .map(|mut update| {
            if let Some(sha) = update.sha.as_mut()
                && let Some(copied) = resolved.get(sha.as_str())
            {
                *sha = copied.clone();
            }
            update
        })
        .collect();

    let message = commit_message(
        &options.commit_marker,
        source_branch,
        destination_branch,
        &plan,
    );
    let merge_message = format!(
        "{} Merge {source_branch} into {destination_branch}",
        options.commit_marker
    );

    let outcome = publish(
        destination,
        &destination_snapshot,
        &source_snapshot.commit_sha,
        &updates,
        &message,
        &merge_message,
    )
    .await?;

    let mut result = SyncResult {
        source: source_branch.to_string(),
        destination: destination_branch.to_string(),
        added: plan.added,
        updated: plan.updated,
        deleted: plan.deleted,
        blobs_transferred: transfer.transfers(),
        commit_sha: None,
        status: SyncStatus::Committed,
    };

    match outcome {
        PublishOutcome::Committed { sha } => {
            tracing::info!(
                source = source_branch,
                destination = destination_branch,
                sha = %sha,
                added = plan.added,
                updated = plan.updated,
                deleted = plan.deleted,
                "Published sync commit"
            );
            emit(
                on_progress,
                SyncProgress::Committed {
                    destination: destination_branch.to_string(),
                    sha: sha.clone(),
                },
            );
            result.commit_sha = Some(sha);
        }
        PublishOutcome::Merged { sha, error } => {
            emit(
                on_progress,
                SyncProgress::FallbackMerge {
                    destination: destination_branch.to_string(),
                    error,
                },
            );
            result.commit_sha = sha;
            result.status = SyncStatus::FallbackMerged;
        }
        PublishOutcome::Degraded {
            error,
            fallback_error,
        } => {
            emit(
                on_progress,
                SyncProgress::Degraded {
                    destination: destination_branch.to_string(),
                    error: error.to_string(),
                    fallback_error,
                },
            );
            result.status = SyncStatus::Degraded;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::batch::BatchConfig;
    use crate::store::StoreError;
    use crate::store::memory::{MemoryStore, StoreOp};

    fn options() -> SyncOptions {
        SyncOptions {
            allow_deletes: true,
            batch: BatchConfig::immediate(),
            ..SyncOptions::default()
        }
    }

    #[tokio::test]
    async fn publishes_across_repositories() {
        let source = MemoryStore::new("acme/theme");
        let destination = MemoryStore::new("acme/theme-store");
        source.commit_files(
            "production",
            &[("assets/a.js", "a"), ("assets/b.js", "b"), ("README.md", "r")],
            "source",
        );
        destination.commit_files(
            "sgc-production",
            &[("assets/a.js", "a"), ("assets/c.js", "c")],
            "destination",
        );

        let result = sync_branch(
            &source,
            "production",
            &destination,
            "sgc-production",
            &options(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.status, SyncStatus::Committed);
        assert_eq!((result.added, result.updated, result.deleted), (1, 0, 1));
        assert_eq!(result.blobs_transferred, 1);
        let files = destination.branch_files("sgc-production");
        assert_eq!(
            files.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["assets/a.js", "assets/b.js"]
        );
        assert_eq!(files["assets/b.js"], "b");
    }

    #[tokio::test]
    async fn commit_message_carries_marker_and_counts() {
        let store = MemoryStore::new("acme/theme");
        store.commit_files("production", &[("assets/a.js", "a")], "init");
        store.commit_files("sgc-production", &[], "empty");

        let result = sync_branch(&store, "production", &store, "sgc-production", &options(), None)
            .await
            .unwrap();

        let commit = store.commit(&result.commit_sha.unwrap()).unwrap();
        assert!(commit.message.starts_with("[themesync] Sync production into sgc-production"));
        assert!(commit.message.contains("1 added, 0 updated, 0 deleted"));
    }

    #[tokio::test]
    async fn emits_progress_in_order() {
        let store = MemoryStore::new("acme/theme");
        let source = MemoryStore::new("acme/other");
        source.commit_files("staging", &[("snippets/a.liquid", "a")], "init");
        store.commit_files("sgc-staging", &[], "empty");

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            let name = format!("{event:?}");
            let name = name.split([' ', '{']).next().unwrap_or_default().to_string();
            events_capture.lock().unwrap().push(name);
        });

        sync_branch(&source, "staging", &store, "sgc-staging", &options(), Some(&callback))
            .await
            .unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "ReadingSnapshot",
                "ReadingSnapshot",
                "PlanReady",
                "UploadingBlobs",
                "BlobUploaded",
                "Committed"
            ]
        );
    }

    #[tokio::test]
    async fn missing_destination_is_not_found() {
        let store = MemoryStore::new("acme/theme");
        store.commit_files("production", &[("assets/a.js", "a")], "init");

        let err = sync_branch(&store, "production", &store, "sgc-production", &options(), None)
            .await
            .expect_err("destination missing");
        assert!(err.is_not_found());
        assert_eq!(store.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn blob_copy_failure_aborts_before_tree() {
        let source = MemoryStore::new("acme/theme");
        let destination = MemoryStore::new("acme/theme-store");
        source.commit_files("production", &[("assets/a.js", "a")], "init");
        destination.commit_files("sgc-production", &[], "empty");
        destination.fail_next(StoreOp::CreateBlob, StoreError::api(500, "Server Error"));

        let err = sync_branch(
            &source,
            "production",
            &destination,
            "sgc-production",
            &options(),
            None,
        )
        .await
        .expect_err("blob copy fails");

        assert_eq!(err.to_string(), "API error (500): Server Error");
        assert_eq!(destination.calls(StoreOp::CreateTree), 0);
    }

    #[tokio::test]
    async fn degraded_run_reports_status_instead_of_error() {
        let store = MemoryStore::new("acme/theme");
        store.commit_files("production", &[("assets/a.js", "a")], "init");
        store.commit_files("sgc-production", &[], "empty");
        store.fail_next(StoreOp::CreateCommit, StoreError::api(409, "Conflict"));
        store.fail_next(StoreOp::CreateMerge, StoreError::api(409, "Merge conflict"));

        let result = sync_branch(&store, "production", &store, "sgc-production", &options(), None)
            .await
            .unwrap();

        assert_eq!(result.status, SyncStatus::Degraded);
        assert!(result.commit_sha.is_none());
        assert!(store.branch_files("sgc-production").is_empty());
    }
}
