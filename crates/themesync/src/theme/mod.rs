//! Theme store publishing.
//!
//! Preview themes are built from the in-scope files of a branch
//! ([`collect_theme_files`]) and pushed to the theme store through a
//! [`ThemePublisher`]. Themes are looked up by name, so publishing the same
//! preview twice updates the existing theme instead of creating another.
//!
//! # Module Structure
//!
//! - [`error`] - `ThemeError`
//! - [`files`] - `ThemeFile`, `collect_theme_files()`
//! - [`shopify`] - `ShopifyPublisher`, the Shopify Admin REST API

mod error;
mod files;
#[cfg(feature = "shopify")]
pub mod shopify;

use async_trait::async_trait;
use serde::Deserialize;

// Re-export error types
pub use error::{Result, ThemeError};

// Re-export file collection
pub use files::{ThemeContent, ThemeFile, collect_theme_files};

#[cfg(feature = "shopify")]
pub use shopify::{ShopifyConfig, ShopifyPublisher};

/// Role of a theme in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeRole {
    Main,
    Unpublished,
    Demo,
    Development,
    #[serde(other)]
    Other,
}

/// A theme as reported by the theme store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Theme {
    pub id: u64,
    pub name: String,
    pub role: ThemeRole,
    #[serde(default)]
    pub previewable: bool,
    #[serde(default)]
    pub processing: bool,
}

impl Theme {
    /// Finished processing and can be previewed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.previewable && !self.processing
    }
}

/// Remote theme store.
#[async_trait]
pub trait ThemePublisher: Send + Sync {
    /// Human-readable store identifier, used in logs.
    fn store(&self) -> &str;

    async fn list_themes(&self) -> Result<Vec<Theme>>;

    /// Create an empty unpublished theme.
    async fn create_theme(&self, name: &str) -> Result<Theme>;

    /// Upload `files` into a theme. Returns the number of files uploaded.
    async fn upload_files(&self, theme_id: u64, files: &[ThemeFile]) -> Result<usize>;

    async fn theme_status(&self, theme_id: u64) -> Result<Theme>;

    async fn delete_theme(&self, theme_id: u64) -> Result<()>;

    /// Preview URL of a theme.
    fn preview_url(&self, theme_id: u64) -> String;
}

/// Name of the preview theme for a pull request.
#[must_use]
pub fn preview_theme_name(repository: &str, number: u64) -> String {
    format!("{repository} PR #{number}")
}

/// Look up a theme by exact name.
pub async fn find_theme<P>(publisher: &P, name: &str) -> Result<Option<Theme>>
where
    P: ThemePublisher + ?Sized,
{
    Ok(publisher
        .list_themes()
        .await?
        .into_iter()
        .find(|theme| theme.name == name))
}

/// Create or update the theme called `name` with `files`.
///
/// Returns the theme status after the upload.
pub async fn publish_theme<P>(publisher: &P, name: &str, files: &[ThemeFile]) -> Result<Theme>
where
    P: ThemePublisher + ?Sized,
{
    let theme = match find_theme(publisher, name).await? {
        Some(existing) => {
            tracing::info!(
                store = publisher.store(),
                theme_id = existing.id,
                name,
                "Updating existing theme"
            );
            existing
        }
        None => {
            let created = publisher.create_theme(name).await?;
            tracing::info!(
                store = publisher.store(),
                theme_id = created.id,
                name,
                "Created theme"
            );
            created
        }
    };

    let uploaded = publisher.upload_files(theme.id, files).await?;
    let status = publisher.theme_status(theme.id).await?;

    tracing::info!(
        store = publisher.store(),
        theme_id = status.id,
        uploaded,
        ready = status.is_ready(),
        "Published theme"
    );

    Ok(status)
}

/// Delete the theme called `name`. Returns `false` when there is none.
pub async fn remove_theme<P>(publisher: &P, name: &str) -> Result<bool>
where
    P: ThemePublisher + ?Sized,
{
    let Some(theme) = find_theme(publisher, name).await? else {
        tracing::debug!(store = publisher.store(), name, "No theme to delete");
        return Ok(false);
    };

    if theme.role == ThemeRole::Main {
        tracing::warn!(
            store = publisher.store(),
            theme_id = theme.id,
            name,
            "Refusing to delete the live theme"
        );
        return Ok(false);
    }

    publisher.delete_theme(theme.id).await?;
    tracing::info!(store = publisher.store(), theme_id = theme.id, name, "Deleted theme");
    Ok(true)
}
