//! Pull request comments, posted through octocrab.

use octocrab::Octocrab;

use super::error::GitHubError;

/// Create an octocrab client authenticated with `token`.
///
/// `base_uri` overrides the API root for GitHub Enterprise.
pub fn create_client(token: &str, base_uri: Option<&str>) -> Result<Octocrab, GitHubError> {
    let mut builder = Octocrab::builder().personal_token(token.to_string());
    if let Some(uri) = base_uri {
        builder = builder.base_uri(uri)?;
    }
    builder.build().map_err(GitHubError::Api)
}

/// Posts outcome comments on one repository's pull requests.
pub struct PullRequestCommenter {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl PullRequestCommenter {
    pub fn new(client: Octocrab, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub async fn comment(&self, number: u64, body: &str) -> Result<(), GitHubError> {
        self.client
            .issues(&self.owner, &self.repo)
            .create_comment(number, body)
            .await?;
        tracing::debug!(
            repository = %format!("{}/{}", self.owner, self.repo),
            number,
            "Posted pull request comment"
        );
        Ok(())
    }
}

/// Render an action outcome as a comment body.
#[must_use]
pub fn outcome_comment(action: &str, outcome: Result<&str, &str>) -> String {
    match outcome {
        Ok(detail) => format!("**themesync**: {action} succeeded.\n\n{detail}"),
        Err(error) => format!("**themesync**: {action} failed.\n\n```\n{error}\n```"),
    }
}
