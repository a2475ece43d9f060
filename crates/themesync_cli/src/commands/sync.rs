use console::style;
use themesync::Branch;
use themesync::scope::SyncScope;
use themesync::sync::{RebaseStrategy, rebase_onto_latest, sync_branch};

use crate::commands::shared;
use crate::config::Config;
use crate::dispatch::{describe_rebase, describe_sync};
use crate::github::parse_repository;
use crate::progress::LoggingReporter;

/// Arguments of a one-shot sync.
pub(crate) struct SyncArgs {
    pub repository: String,
    pub installation: Option<u64>,
    pub source: Branch,
    pub destination: Option<Branch>,
    pub include_json: bool,
    pub no_delete: bool,
    pub no_rate_limit: bool,
}

pub(crate) async fn handle_sync(
    config: &Config,
    args: SyncArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let (owner, repo) = parse_repository(&args.repository)?;
    let connector = shared::connector(config, shared::transport()?, args.no_rate_limit)?;
    let store = connector.store(owner, repo, args.installation).await?;

    let destination = args.destination.unwrap_or_else(|| args.source.mirror());
    let scope = if args.include_json {
        SyncScope::theme()
    } else {
        SyncScope::theme_without_json()
    };
    let options = themesync::SyncOptions {
        scope,
        allow_deletes: !args.no_delete,
        shared_objects: true,
        ..config.sync_options()
    };

    let callback = LoggingReporter::new(&args.repository).into_callback();
    let result = sync_branch(
        &store,
        args.source.as_str(),
        &store,
        destination.as_str(),
        &options,
        Some(&callback),
    )
    .await?;

    println!("{} {}", style("✓").green(), describe_sync(&result));
    Ok(())
}

pub(crate) async fn handle_rebase(
    config: &Config,
    repository: &str,
    installation: Option<u64>,
    strategy: Option<RebaseStrategy>,
    no_rate_limit: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (owner, repo) = parse_repository(repository)?;
    let connector = shared::connector(config, shared::transport()?, no_rate_limit)?;
    let store = connector.store(owner, repo, installation).await?;

    let strategy = strategy.unwrap_or(config.sync.rebase_strategy);
    let callback = LoggingReporter::new(repository).into_callback();
    let outcome = rebase_onto_latest(
        &store,
        Branch::Staging.as_str(),
        Branch::Production.as_str(),
        strategy,
        &config.sync.commit_marker,
        Some(&callback),
    )
    .await?;

    println!(
        "{} {}",
        style("✓").green(),
        describe_rebase(
            Branch::Staging.as_str(),
            Branch::Production.as_str(),
            &outcome
        )
    );
    Ok(())
}
