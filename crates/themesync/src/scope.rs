//! Path filtering for synchronized trees.
//!
//! A [`SyncScope`] decides which paths a sync manages. It is a plain value
//! passed into every call; filtering depends only on the path string and the
//! scope, never on I/O.

use serde::Deserialize;

/// Directories of a theme that the synchronizer manages.
pub const THEME_DIRECTORIES: [&str; 8] = [
    "assets",
    "blocks",
    "config",
    "layout",
    "locales",
    "sections",
    "snippets",
    "templates",
];

/// JSON file that stays in scope even when JSON is excluded.
pub const SETTINGS_SCHEMA_PATH: &str = "config/settings_schema.json";

/// Which paths of a tree a sync pass is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncScope {
    /// Top-level directories in scope.
    pub directories: Vec<String>,
    /// Drop `.json` files, except `json_exception`.
    pub exclude_json: bool,
    /// Exact path kept when JSON is excluded.
    pub json_exception: Option<String>,
}

impl Default for SyncScope {
    fn default() -> Self {
        Self::theme()
    }
}

impl SyncScope {
    /// Every theme directory, JSON included.
    #[must_use]
    pub fn theme() -> Self {
        Self {
            directories: THEME_DIRECTORIES.iter().map(|d| (*d).to_string()).collect(),
            exclude_json: false,
            json_exception: Some(SETTINGS_SCHEMA_PATH.to_string()),
        }
    }

    /// Every theme directory without JSON files, except the settings schema.
    ///
    /// The store editor rewrites JSON templates and settings data on its own;
    /// pushing ours over them would discard merchant edits.
    #[must_use]
    pub fn theme_without_json() -> Self {
        Self {
            exclude_json: true,
            ..Self::theme()
        }
    }

    #[must_use]
    pub fn with_directories<I, S>(mut self, directories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directories = directories.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `path` is managed by this scope.
    ///
    /// A path is in scope when it lives under one of the directories or is
    /// a top-level file named exactly like one.
    #[must_use]
    pub fn is_in_scope(&self, path: &str) -> bool {
        let in_directory = self.directories.iter().any(|dir| {
            path == dir
                || path
                    .strip_prefix(dir.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if !in_directory {
            return false;
        }

        if self.exclude_json && path.ends_with(".json") {
            return self.json_exception.as_deref() == Some(path);
        }

        true
    }

    /// Keep only the in-scope paths, preserving order.
    pub fn filter_paths<'a, I>(&self, paths: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        paths.into_iter().filter(|p| self.is_in_scope(p)).collect()
    }
}
