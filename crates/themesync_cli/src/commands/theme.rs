use console::style;
use themesync::scope::SyncScope;
use themesync::theme::{ThemeContent, collect_theme_files, publish_theme};

use crate::commands::shared;
use crate::config::Config;
use crate::github::parse_repository;

/// List the files a preview theme would receive from `branch`.
pub(crate) async fn handle_files(
    config: &Config,
    repository: &str,
    branch: &str,
    installation: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (owner, repo) = parse_repository(repository)?;
    let connector = shared::connector(config, shared::transport()?, false)?;
    let store = connector.store(owner, repo, installation).await?;

    let files = collect_theme_files(&store, branch, &SyncScope::theme()).await?;
    for file in &files {
        let kind = match file.content {
            ThemeContent::Text(_) => "text",
            ThemeContent::Attachment(_) => "binary",
        };
        println!("{:<6} {}", kind, file.path);
    }
    println!("{} files", files.len());
    Ok(())
}

/// Publish `branch` to the theme named `name`.
pub(crate) async fn handle_publish(
    config: &Config,
    repository: &str,
    branch: &str,
    name: &str,
    installation: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (owner, repo) = parse_repository(repository)?;
    let transport = shared::transport()?;
    let publisher = shared::publisher(config, transport.clone())
        .ok_or("No theme store configured. Add a [shopify] section to the config.")?;
    let connector = shared::connector(config, transport, false)?;
    let store = connector.store(owner, repo, installation).await?;

    let files = collect_theme_files(&store, branch, &SyncScope::theme()).await?;
    let theme = publish_theme(publisher.as_ref(), name, &files).await?;

    println!(
        "{} Uploaded {} files to \"{}\" ({})",
        style("✓").green(),
        files.len(),
        theme.name,
        theme.id
    );
    println!("  Preview: {}", publisher.preview_url(theme.id));
    Ok(())
}
