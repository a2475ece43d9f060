//! Branch rebase engine.
//!
//! Moves a branch onto the latest commit of another branch with one of two
//! [`RebaseStrategy`] variants. Rebases always force-move the ref.

use crate::store::{ObjectStore, Result};

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{RebaseOutcome, RebaseStrategy};

fn skip(branch: &str, reason: &str, on_progress: Option<&ProgressCallback>) -> RebaseOutcome {
    tracing::info!(branch, "Not rebasing: {}", reason);
    emit(
        on_progress,
        SyncProgress::RebaseSkipped {
            branch: branch.to_string(),
            reason: reason.to_string(),
        },
    );
    RebaseOutcome::skipped()
}

/// Rebase `branch` onto the head of `onto`.
///
/// - `branch` missing: not rebased, not an error
/// - both at the same commit: not rebased, no writes
/// - no commits unique to `branch`: fast-forward to `onto`
/// - otherwise squash or replay, then force-move `branch`
///
/// A missing `onto` branch is returned as `StoreError::NotFound`.
pub async fn rebase_onto_latest<S>(
    store: &S,
    branch: &str,
    onto: &str,
    strategy: RebaseStrategy,
    marker: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<RebaseOutcome>
where
    S: ObjectStore + ?Sized,
{
    let branch_sha = match store.get_ref(branch).await {
        Ok(sha) => sha,
        Err(e) if e.is_not_found() => {
            return Ok(skip(branch, "branch does not exist", on_progress));
        }
        Err(e) => return Err(e),
    };
    let onto_sha = store.get_ref(onto).await?;

    if branch_sha == onto_sha {
        return Ok(skip(branch, "already at the same commit", on_progress));
    }

    let comparison = store.compare(onto, branch).await?;

    if comparison.commits.is_empty() {
        // Not forced: a branch that gained commits since the compare is rejected, not reset.
        store.update_ref(branch, &onto_sha, false).await?;
        tracing::info!(branch, onto, sha = %onto_sha, "Fast-forwarded branch");
        emit(
            on_progress,
            SyncProgress::Rebased {
                branch: branch.to_string(),
                onto: onto.to_string(),
                sha: onto_sha.clone(),
                commits: 0,
            },
        );
        return Ok(RebaseOutcome::moved_to(onto_sha));
    }

    let (new_sha, created) = match strategy {
        RebaseStrategy::Squash => {
            let onto_commit = store.get_commit(&onto_sha).await?;
            let message = format!("{marker} Rebase {branch} onto {onto}");
            let sha = store
                .create_commit(
                    &message,
                    &onto_commit.tree_sha,
                    std::slice::from_ref(&onto_sha),
                )
                .await?;
            (sha, 1)
        }
        RebaseStrategy::OrderedReplay => {
            let mut parent = onto_sha.clone();
            for commit in &comparison.commits {
                parent = store
                    .create_commit(
                        &commit.message,
                        &commit.tree_sha,
                        std::slice::from_ref(&parent),
                    )
                    .await?;
                tracing::debug!(
                    branch,
                    original = %commit.sha,
                    replayed = %parent,
                    "Replayed commit"
                );
            }
            (parent, comparison.commits.len())
        }
    };

    store.update_ref(branch, &new_sha, true).await?;

    tracing::info!(
        branch,
        onto,
        strategy = %strategy,
        sha = %new_sha,
        commits = created,
        "Rebased branch"
    );
    emit(
        on_progress,
        SyncProgress::Rebased {
            branch: branch.to_string(),
            onto: onto.to_string(),
            sha: new_sha.clone(),
            commits: created,
        },
    );

    Ok(RebaseOutcome::moved_to(new_sha))
}
