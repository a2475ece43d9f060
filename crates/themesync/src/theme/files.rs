//! Theme file collection from a branch.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::scope::SyncScope;
use crate::snapshot::read_branch_snapshot;
use crate::store::{BlobEncoding, ObjectStore};

use super::error::{Result, ThemeError};

/// Content of one theme file as the theme store expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeContent {
    /// UTF-8 text, sent as-is.
    Text(String),
    /// Binary content, base64 encoded.
    Attachment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeFile {
    pub path: String,
    pub content: ThemeContent,
}

impl ThemeFile {
    #[must_use]
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: ThemeContent::Text(content.into()),
        }
    }
}

/// Turn raw blob content into theme content: valid UTF-8 without NUL bytes
/// is text, anything else an attachment.
fn theme_content(path: &str, content: &str, encoding: BlobEncoding) -> Result<ThemeContent> {
    match encoding {
        BlobEncoding::Utf8 => Ok(ThemeContent::Text(content.to_string())),
        BlobEncoding::Base64 => {
            let bytes = STANDARD
                .decode(content)
                .map_err(|e| ThemeError::InvalidFile {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            if bytes.contains(&0) {
                return Ok(ThemeContent::Attachment(content.to_string()));
            }
            match String::from_utf8(bytes) {
                Ok(text) => Ok(ThemeContent::Text(text)),
                Err(_) => Ok(ThemeContent::Attachment(content.to_string())),
            }
        }
    }
}

/// Read every in-scope file at the head of `branch`, sorted by path.
pub async fn collect_theme_files<S>(
    store: &S,
    branch: &str,
    scope: &SyncScope,
) -> Result<Vec<ThemeFile>>
where
    S: ObjectStore + ?Sized,
{
    let snapshot = read_branch_snapshot(store, branch).await?;
    let mut files = Vec::new();

    for (path, entry) in &snapshot.entries {
        if !scope.is_in_scope(path) {
            continue;
        }
        let blob = store.get_blob(&entry.sha).await?;
        files.push(ThemeFile {
            path: path.clone(),
            content: theme_content(path, &blob.content, blob.encoding)?,
        });
    }

    tracing::debug!(
        repository = store.repository(),
        branch,
        files = files.len(),
        "Collected theme files"
    );

    Ok(files)
}
