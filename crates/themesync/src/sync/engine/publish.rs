use crate::snapshot::BranchSnapshot;
use crate::store::{MergeOutcome, ObjectStore, Result, StoreError, TreeUpdate, short_error_message};

/// Outcome of writing a planned change set.
#[derive(Debug)]
pub(super) enum PublishOutcome {
    Committed { sha: String },
    Merged { sha: Option<String>, error: String },
    Degraded { error: StoreError, fallback_error: String },
}

/// Create tree, commit and fast-forward the destination ref, in that order.
///
/// The commit's only parent is the destination head the snapshot was read
/// at, so the ref move is a fast-forward unless someone pushed meanwhile.
pub(super) async fn write_commit<D>(
    store: &D,
    destination: &BranchSnapshot,
    updates: &[TreeUpdate],
    message: &str,
) -> Result<String>
where
    D: ObjectStore + ?Sized,
{
    let tree = store.create_tree(Some(&destination.tree_sha), updates).await?;
    let commit = store
        .create_commit(message, &tree, std::slice::from_ref(&destination.commit_sha))
        .await?;
    store.update_ref(&destination.branch, &commit, false).await?;
    Ok(commit)
}

/// Publish `updates`, falling back to a store-side merge of `source_head`
/// when the write fails with a conflict.
///
/// Non-conflict errors are returned. A failed fallback is not an error:
/// it is reported as [`PublishOutcome::Degraded`].
pub(super) async fn publish<D>(
    store: &D,
    destination: &BranchSnapshot,
    source_head: &str,
    updates: &[TreeUpdate],
    message: &str,
    merge_message: &str,
) -> Result<PublishOutcome>
where
    D: ObjectStore + ?Sized,
{
    let error = match write_commit(store, destination, updates, message).await {
        Ok(sha) => return Ok(PublishOutcome::Committed { sha }),
        Err(e) if e.is_conflict() => e,
        Err(e) => return Err(e),
    };

    tracing::warn!(
        repository = store.repository(),
        branch = %destination.branch,
        "Publishing conflicted, falling back to merge: {}",
        short_error_message(&error)
    );

    let fallback_error = match store
        .create_merge(&destination.branch, source_head, merge_message)
        .await
    {
        Ok(MergeOutcome::Merged { sha }) => {
            tracing::info!(
                repository = store.repository(),
                branch = %destination.branch,
                sha = %sha,
                "Merge fallback succeeded"
            );
            return Ok(PublishOutcome::Merged {
                sha: Some(sha),
                error: short_error_message(&error),
            });
        }
        Ok(MergeOutcome::NothingToMerge) => {
            tracing::info!(
                repository = store.repository(),
                branch = %destination.branch,
                "Merge fallback found nothing to merge"
            );
            return Ok(PublishOutcome::Merged {
                sha: None,
                error: short_error_message(&error),
            });
        }
        Ok(MergeOutcome::Conflict) => "merge conflict".to_string(),
        Err(e) => short_error_message(&e),
    };

    tracing::error!(
        repository = store.repository(),
        branch = %destination.branch,
        error = %short_error_message(&error),
        fallback_error = %fallback_error,
        "Publishing and merge fallback both failed"
    );

    Ok(PublishOutcome::Degraded {
        error,
        fallback_error,
    })
}
