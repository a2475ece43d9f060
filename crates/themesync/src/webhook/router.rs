//! Event routing table.
//!
//! Routing is a pure function from a validated event to the actions it
//! triggers; running the actions is the caller's job.

use crate::scope::SyncScope;
use crate::store::Branch;
use crate::sync::{DEFAULT_COMMIT_MARKER, RebaseStrategy, SyncOptions};
use crate::theme::preview_theme_name;

use super::event::{PullRequest, PushEvent, WebhookEvent};

/// Label that requests a preview theme when no other is configured.
pub const DEFAULT_PREVIEW_LABEL: &str = "preview";

/// Routing knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    pub preview_label: String,
    pub commit_marker: String,
    pub rebase_strategy: RebaseStrategy,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            preview_label: DEFAULT_PREVIEW_LABEL.to_string(),
            commit_marker: DEFAULT_COMMIT_MARKER.to_string(),
            rebase_strategy: RebaseStrategy::default(),
        }
    }
}

/// One branch-to-branch sync inside the event's repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAction {
    pub source: Branch,
    pub destination: Branch,
    pub scope: SyncScope,
    pub allow_deletes: bool,
}

impl SyncAction {
    /// Options for this sync, taking pacing and the marker from `base`.
    #[must_use]
    pub fn options(&self, base: &SyncOptions) -> SyncOptions {
        SyncOptions {
            scope: self.scope.clone(),
            delete_scope: None,
            allow_deletes: self.allow_deletes,
            shared_objects: true,
            ..base.clone()
        }
    }
}

/// Work triggered by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Sync(SyncAction),
    Rebase {
        branch: Branch,
        onto: Branch,
        strategy: RebaseStrategy,
    },
    PublishPreview {
        number: u64,
        head_ref: String,
        theme_name: String,
    },
    DeletePreview {
        number: u64,
        theme_name: String,
    },
}

impl Action {
    /// Short description for logs and comments.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Action::Sync(sync) => format!("Sync {} into {}", sync.source, sync.destination),
            Action::Rebase { branch, onto, .. } => format!("Rebase {branch} onto {onto}"),
            Action::PublishPreview { number, .. } => format!("Preview theme for #{number}"),
            Action::DeletePreview { number, .. } => format!("Delete preview theme for #{number}"),
        }
    }

    /// Pull request the action reports back to, if any.
    #[must_use]
    pub fn pull_request(&self) -> Option<u64> {
        match self {
            Action::PublishPreview { number, .. } | Action::DeletePreview { number, .. } => {
                Some(*number)
            }
            Action::Sync(_) | Action::Rebase { .. } => None,
        }
    }
}

/// Whether a commit message was produced by the synchronizer itself.
#[must_use]
pub fn is_sync_commit(message: &str, marker: &str) -> bool {
    !marker.is_empty() && message.contains(marker)
}

/// Select the actions for `event`.
pub fn route_event(event: &WebhookEvent, config: &RoutingConfig) -> Vec<Action> {
    match event {
        WebhookEvent::Push(push) => route_push(push, config),
        WebhookEvent::PullRequestLabeled {
            pull_request,
            label,
        } if *label == config.preview_label => vec![publish_preview(pull_request)],
        WebhookEvent::PullRequestClosed(pull_request)
            if pull_request.has_label(&config.preview_label) =>
        {
            vec![Action::DeletePreview {
                number: pull_request.number,
                theme_name: preview_theme_name(
                    &pull_request.repository.full_name(),
                    pull_request.number,
                ),
            }]
        }
        _ => Vec::new(),
    }
}

fn publish_preview(pull_request: &PullRequest) -> Action {
    Action::PublishPreview {
        number: pull_request.number,
        head_ref: pull_request.head_ref.clone(),
        theme_name: preview_theme_name(&pull_request.repository.full_name(), pull_request.number),
    }
}

fn route_push(push: &PushEvent, config: &RoutingConfig) -> Vec<Action> {
    if push.deleted {
        return Vec::new();
    }
    let Some(branch) = push.branch().and_then(|b| b.parse::<Branch>().ok()) else {
        return Vec::new();
    };
    if let Some(message) = &push.head_commit_message
        && is_sync_commit(message, &config.commit_marker)
    {
        tracing::debug!(branch = %branch, "Skipping push produced by a sync");
        return Vec::new();
    }

    let mirror = branch.mirror();
    if branch.is_store_mirror() {
        // Editor changes flow back with JSON, and never delete.
        return vec![Action::Sync(SyncAction {
            source: branch,
            destination: mirror,
            scope: SyncScope::theme(),
            allow_deletes: false,
        })];
    }

    let mut actions = vec![Action::Sync(SyncAction {
        source: branch,
        destination: mirror,
        scope: SyncScope::theme_without_json(),
        allow_deletes: true,
    })];
    if branch == Branch::Production {
        actions.push(Action::Rebase {
            branch: Branch::Staging,
            onto: Branch::Production,
            strategy: config.rebase_strategy,
        });
    }
    actions
}
