//! GitHub integration.
//!
//! # Module Structure
//!
//! - [`error`] - `GitHubError` and response classification
//! - [`types`] - Wire types of the git data API
//! - [`client`] - `GitHubStore`, the git data API as an `ObjectStore`
//! - [`app`] - GitHub App JWTs and installation tokens
//! - [`comments`] - Pull request comments via octocrab
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use themesync::github::{AppCredentials, GitHubStore, GITHUB_API_URL};
//! use themesync::http::reqwest_transport::ReqwestTransport;
//!
//! let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
//! let token = credentials.installation_token(transport.as_ref(), GITHUB_API_URL, 42).await?;
//! let store = GitHubStore::new(transport, GITHUB_API_URL, token.token, "acme", "theme");
//! ```

pub mod app;
mod client;
mod comments;
mod error;
mod types;

// Re-export error types
pub use error::{GitHubError, classify_response};

// Re-export client types
pub use client::{GITHUB_API_URL, GITHUB_API_VERSION, GitHubStore};

// Re-export auth types
pub use app::AppCredentials;
pub use types::InstallationToken;

// Re-export comment helpers
pub use comments::{PullRequestCommenter, create_client, outcome_comment};
