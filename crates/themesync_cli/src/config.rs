//! Configuration file support for themesync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `THEMESYNC_`, sections separated
//!    by `__`, e.g. `THEMESYNC_GITHUB__WEBHOOK_SECRET`)
//! 3. Config file (./themesync.toml, then ~/.config/themesync/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [github]
//! app_id = 123456
//! private_key_path = "/etc/themesync/app.pem"
//! webhook_secret = "..."    # or THEMESYNC_GITHUB__WEBHOOK_SECRET
//!
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [sync]
//! rebase_strategy = "squash"  # or "ordered-replay"
//! commit_marker = "[themesync]"
//! requests_per_second = 1
//! batch_size = 10
//! delay_between_batches = 1000  # milliseconds
//! delay_between_items = 100
//!
//! [retry]
//! max_retries = 5
//!
//! [shopify]
//! store = "acme.myshopify.com"
//! access_token = "shpat_..."
//!
//! [shopify.retry]  # 429 retries; waits at least Retry-After
//! max_retries = 5
//!
//! [routing]
//! preview_label = "preview"
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use themesync::retry::RetryConfig;
use themesync::sync::{DEFAULT_COMMIT_MARKER, RebaseStrategy, SyncOptions};
use themesync::theme::ShopifyConfig;
use themesync::webhook::{DEFAULT_PREVIEW_LABEL, RoutingConfig};
use themesync::BatchConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub server: ServerConfig,
    pub sync: SyncConfig,
    /// Rate-limit retry behaviour of every GitHub call.
    pub retry: RetryConfig,
    /// Theme store; preview actions are skipped without it.
    pub shopify: Option<ShopifyConfig>,
    pub routing: RoutingSection,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API root, for GitHub Enterprise.
    pub api_url: String,
    /// GitHub App id.
    pub app_id: Option<u64>,
    /// PEM private key of the App.
    pub private_key_path: Option<PathBuf>,
    /// Personal or installation token, used when no App is configured.
    pub token: Option<String>,
    /// Secret webhook deliveries are signed with.
    pub webhook_secret: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: themesync::github::GITHUB_API_URL.to_string(),
            app_id: None,
            private_key_path: None,
            token: None,
            webhook_secret: None,
        }
    }
}

/// Webhook server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub rebase_strategy: RebaseStrategy,
    pub commit_marker: String,
    /// Proactive GitHub request rate. Zero disables the limiter.
    pub requests_per_second: u32,
    /// Pacing of blob uploads.
    #[serde(flatten)]
    pub batch: BatchConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rebase_strategy: RebaseStrategy::default(),
            commit_marker: DEFAULT_COMMIT_MARKER.to_string(),
            requests_per_second: themesync::store::rate_limits::GITHUB_DEFAULT_RPS,
            batch: BatchConfig::default(),
        }
    }
}

/// Event routing configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RoutingSection {
    /// Pull request label that requests a preview theme.
    pub preview_label: String,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            preview_label: DEFAULT_PREVIEW_LABEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/themesync/config.toml)
    /// 3. Local config file (./themesync.toml)
    /// 4. Environment variables with THEMESYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("themesync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./themesync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., THEMESYNC_GITHUB__APP_ID -> github.app_id
        builder = builder.add_source(
            Environment::with_prefix("THEMESYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "themesync").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Base options every sync starts from.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            batch: self.sync.batch.clone(),
            commit_marker: self.sync.commit_marker.clone(),
            ..SyncOptions::default()
        }
    }

    pub fn routing(&self) -> RoutingConfig {
        RoutingConfig {
            preview_label: self.routing.preview_label.clone(),
            commit_marker: self.sync.commit_marker.clone(),
            rebase_strategy: self.sync.rebase_strategy,
        }
    }
}
