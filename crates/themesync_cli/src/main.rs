//! Themesync CLI - webhook server and one-shot commands for theme branch sync.

mod commands;
mod config;
mod dispatch;
mod github;
mod progress;
mod server;
mod shutdown;

use clap::{Parser, Subcommand, ValueEnum};
use themesync::Branch;
use themesync::sync::RebaseStrategy;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "themesync")]
#[command(version)]
#[command(about = "Keep a theme repository's branches and its theme store in sync")]
#[command(
    long_about = "Themesync listens for GitHub webhooks on a theme repository. Pushes to \
production and staging are published to the sgc-* branches the theme store's editor \
commits to, editor commits flow back, staging is rebased onto production, and pull \
requests labeled for preview get their own theme."
)]
#[command(after_long_help = r#"EXAMPLES
    Run the webhook server:
        $ themesync serve --bind 0.0.0.0:8080

    Publish production to sgc-production once:
        $ themesync sync acme/theme production

    Rebase staging onto production:
        $ themesync rebase acme/theme --strategy ordered-replay

    Upload a branch to a theme:
        $ themesync theme publish acme/theme my-feature "Feature preview"

    Generate shell completions:
        $ themesync completions bash > ~/.local/share/bash-completion/completions/themesync

CONFIGURATION
    Themesync reads configuration from:
      1. ~/.config/themesync/config.toml (or $XDG_CONFIG_HOME/themesync/config.toml)
      2. ./themesync.toml
      3. Environment variables (THEMESYNC_* prefix, sections separated by __)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    THEMESYNC_GITHUB__TOKEN            GitHub token, used when no App is configured
    THEMESYNC_GITHUB__APP_ID           GitHub App id
    THEMESYNC_GITHUB__PRIVATE_KEY_PATH GitHub App private key (PEM)
    THEMESYNC_GITHUB__WEBHOOK_SECRET   Webhook signing secret
    THEMESYNC_SHOPIFY__STORE           Shopify store domain
    THEMESYNC_SHOPIFY__ACCESS_TOKEN    Shopify Admin API token
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve {
        /// Address to listen on (default from config or 0.0.0.0:8080)
        #[arg(short, long)]
        bind: Option<String>,

        /// Disable proactive rate limiting of GitHub requests
        #[arg(short = 'R', long)]
        no_rate_limit: bool,
    },
    /// Sync one branch into another
    Sync {
        /// Repository as owner/name
        repository: String,

        /// Source branch
        source: Branch,

        /// Destination branch (default: the source's mirror)
        destination: Option<Branch>,

        #[command(flatten)]
        target: TargetOptions,

        /// Publish JSON files too
        #[arg(short = 'j', long)]
        include_json: bool,

        /// Never delete destination files
        #[arg(long)]
        no_delete: bool,
    },
    /// Rebase staging onto production
    Rebase {
        /// Repository as owner/name
        repository: String,

        #[command(flatten)]
        target: TargetOptions,

        /// Rebase strategy (default from config)
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,
    },
    /// Theme store operations
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ThemeAction {
    /// List the theme files of a branch
    Files {
        /// Repository as owner/name
        repository: String,
        /// Branch to read
        branch: String,
        /// GitHub App installation id
        #[arg(short, long)]
        installation: Option<u64>,
    },
    /// Upload a branch to a theme, creating it if needed
    Publish {
        /// Repository as owner/name
        repository: String,
        /// Branch to upload
        branch: String,
        /// Theme name
        name: String,
        /// GitHub App installation id
        #[arg(short, long)]
        installation: Option<u64>,
    },
}

/// Options naming where a one-shot command runs.
#[derive(Debug, Clone, clap::Args)]
struct TargetOptions {
    /// GitHub App installation id
    #[arg(short, long)]
    installation: Option<u64>,

    /// Disable proactive rate limiting of GitHub requests
    #[arg(short = 'R', long)]
    no_rate_limit: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Squash,
    OrderedReplay,
}

impl From<StrategyArg> for RebaseStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Squash => RebaseStrategy::Squash,
            StrategyArg::OrderedReplay => RebaseStrategy::OrderedReplay,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("themesync=info,themesync_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        commands::meta::handle_completions(*shell)?;
        return Ok(());
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    match cli.command {
        Commands::Serve {
            bind,
            no_rate_limit,
        } => commands::serve::handle_serve(&config, bind, no_rate_limit).await?,
        Commands::Sync {
            repository,
            source,
            destination,
            target,
            include_json,
            no_delete,
        } => {
            let args = commands::sync::SyncArgs {
                repository,
                installation: target.installation,
                source,
                destination,
                include_json,
                no_delete,
                no_rate_limit: target.no_rate_limit,
            };
            commands::sync::handle_sync(&config, args).await?;
        }
        Commands::Rebase {
            repository,
            target,
            strategy,
        } => {
            commands::sync::handle_rebase(
                &config,
                &repository,
                target.installation,
                strategy.map(RebaseStrategy::from),
                target.no_rate_limit,
            )
            .await?;
        }
        Commands::Theme { action } => match action {
            ThemeAction::Files {
                repository,
                branch,
                installation,
            } => commands::theme::handle_files(&config, &repository, &branch, installation).await?,
            ThemeAction::Publish {
                repository,
                branch,
                name,
                installation,
            } => {
                commands::theme::handle_publish(&config, &repository, &branch, &name, installation)
                    .await?;
            }
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_parses_branches() {
        let cli = Cli::try_parse_from(["themesync", "sync", "acme/theme", "sgc-staging"]).unwrap();
        match cli.command {
            Commands::Sync {
                source,
                destination,
                ..
            } => {
                assert_eq!(source, Branch::SgcStaging);
                assert!(destination.is_none());
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn sync_rejects_unknown_branches() {
        assert!(Cli::try_parse_from(["themesync", "sync", "acme/theme", "main"]).is_err());
    }

    #[test]
    fn rebase_strategy_maps_to_library() {
        let cli = Cli::try_parse_from([
            "themesync",
            "rebase",
            "acme/theme",
            "--strategy",
            "ordered-replay",
            "-i",
            "9",
        ])
        .unwrap();
        match cli.command {
            Commands::Rebase {
                strategy, target, ..
            } => {
                assert_eq!(
                    strategy.map(RebaseStrategy::from),
                    Some(RebaseStrategy::OrderedReplay)
                );
                assert_eq!(target.installation, Some(9));
            }
            _ => panic!("expected rebase"),
        }
    }
}
