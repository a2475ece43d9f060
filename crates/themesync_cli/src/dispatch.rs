//! Runs the actions routed from one webhook delivery.

use std::sync::Arc;

use themesync::github::outcome_comment;
use themesync::scope::SyncScope;
use themesync::store::{StoreError, short_error_message};
use themesync::sync::{
    RebaseOutcome, SyncOptions, SyncResult, SyncStatus, rebase_onto_latest, sync_branch,
};
use themesync::theme::{
    ThemeError, ThemePublisher, collect_theme_files, publish_theme, remove_theme,
};
use themesync::webhook::{Action, WebhookEvent};

use crate::github::{GitHubConnector, Store};
use crate::progress::LoggingReporter;
use crate::server::DeliveryHandler;

/// Why an action did not complete.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error("No theme store configured")]
    NoThemeStore,
}

/// Executes routed actions against GitHub and the theme store.
pub struct Dispatcher {
    connector: Arc<GitHubConnector>,
    publisher: Option<Arc<dyn ThemePublisher>>,
    sync_options: SyncOptions,
}

impl Dispatcher {
    pub fn new(
        connector: Arc<GitHubConnector>,
        publisher: Option<Arc<dyn ThemePublisher>>,
        sync_options: SyncOptions,
    ) -> Self {
        Self {
            connector,
            publisher,
            sync_options,
        }
    }

    fn publisher(&self) -> Result<&dyn ThemePublisher, ActionError> {
        self.publisher.as_deref().ok_or(ActionError::NoThemeStore)
    }

    /// Run one action. Returns a human-readable summary.
    async fn run(&self, store: &Store, action: &Action) -> Result<String, ActionError> {
        let repository = themesync::ObjectStore::repository(store).to_string();
        match action {
            Action::Sync(sync) => {
                let options = sync.options(&self.sync_options);
                let callback = LoggingReporter::new(&repository).into_callback();
                let result = match sync_branch(
                    store,
                    sync.source.as_str(),
                    store,
                    sync.destination.as_str(),
                    &options,
                    Some(&callback),
                )
                .await
                {
                    Ok(result) => result,
                    Err(e) if e.is_not_found() => {
                        return Ok(format!("Skipped: {}", short_error_message(&e)));
                    }
                    Err(e) => return Err(e.into()),
                };
                Ok(describe_sync(&result))
            }
            Action::Rebase {
                branch,
                onto,
                strategy,
            } => {
                let callback = LoggingReporter::new(&repository).into_callback();
                let outcome = rebase_onto_latest(
                    store,
                    branch.as_str(),
                    onto.as_str(),
                    *strategy,
                    &self.sync_options.commit_marker,
                    Some(&callback),
                )
                .await?;
                Ok(describe_rebase(branch.as_str(), onto.as_str(), &outcome))
            }
            Action::PublishPreview {
                head_ref,
                theme_name,
                ..
            } => {
                let publisher = self.publisher()?;
                let files = collect_theme_files(store, head_ref, &SyncScope::theme()).await?;
                let theme = publish_theme(publisher, theme_name, &files).await?;
                Ok(format!(
                    "Uploaded {} files to theme \"{}\". Preview: {}",
                    files.len(),
                    theme.name,
                    publisher.preview_url(theme.id)
                ))
            }
            Action::DeletePreview { theme_name, .. } => {
                let removed = remove_theme(self.publisher()?, theme_name).await?;
                Ok(if removed {
                    format!("Deleted theme \"{theme_name}\".")
                } else {
                    format!("No theme \"{theme_name}\" to delete.")
                })
            }
        }
    }

    async fn report(&self, event: &WebhookEvent, action: &Action, outcome: Result<&str, &str>) {
        let (Some(number), Some(repository)) = (action.pull_request(), event.repository()) else {
            return;
        };
        let body = outcome_comment(&action.describe(), outcome);
        let posted = match self
            .connector
            .commenter(&repository.owner, &repository.name, event.installation_id())
            .await
        {
            Ok(commenter) => commenter.comment(number, &body).await,
            Err(e) => Err(e),
        };
        if let Err(e) = posted {
            tracing::warn!(
                repository = %repository.full_name(),
                number,
                "Failed to post comment: {}",
                short_error_message(&e)
            );
        }
    }
}

#[async_trait::async_trait]
impl DeliveryHandler for Dispatcher {
    async fn handle(&self, event: WebhookEvent, actions: Vec<Action>) {
        let Some(repository) = event.repository() else {
            return;
        };
        let full_name = repository.full_name();

        let store = match self
            .connector
            .store(&repository.owner, &repository.name, event.installation_id())
            .await
        {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(
                    repository = %full_name,
                    "Failed to authenticate: {}",
                    short_error_message(&e)
                );
                return;
            }
        };

        // Actions run in order; one failing never stops the rest.
        for action in &actions {
            let label = action.describe();
            match self.run(&store, action).await {
                Ok(summary) => {
                    tracing::info!(repository = %full_name, action = %label, "{}", summary);
                    self.report(&event, action, Ok(&summary)).await;
                }
                Err(e) => {
                    let message = short_error_message(&e);
                    tracing::error!(repository = %full_name, action = %label, "Action failed: {}", message);
                    self.report(&event, action, Err(&message)).await;
                }
            }
        }
    }
}

/// One-line summary of a sync result.
pub fn describe_sync(result: &SyncResult) -> String {
    let counts = format!(
        "{} added, {} updated, {} deleted",
        result.added, result.updated, result.deleted
    );
    match result.status {
        SyncStatus::NoOp => format!("{} already matches {}", result.destination, result.source),
        SyncStatus::Committed => format!(
            "{} -> {}: {counts} ({})",
            result.source,
            result.destination,
            result.commit_sha.as_deref().unwrap_or("-")
        ),
        SyncStatus::FallbackMerged => format!(
            "{} -> {}: merged after conflict ({})",
            result.source,
            result.destination,
            result.commit_sha.as_deref().unwrap_or("nothing to merge")
        ),
        SyncStatus::Degraded => format!(
            "{} -> {}: conflict, destination left unchanged",
            result.source, result.destination
        ),
    }
}

/// One-line summary of a rebase outcome.
pub fn describe_rebase(branch: &str, onto: &str, outcome: &RebaseOutcome) -> String {
    match &outcome.new_sha {
        Some(sha) if outcome.rebased => format!("{branch} rebased onto {onto} ({sha})"),
        _ => format!("{branch} left as is"),
    }
}
