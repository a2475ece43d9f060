//! GitHub credentials and per-repository store construction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use themesync::github::{
    AppCredentials, GitHubError, GitHubStore, InstallationToken, PullRequestCommenter,
    create_client,
};
use themesync::http::HttpTransport;
use themesync::retry::{RequestExecutor, RetryConfig};
use themesync::store::{ApiRateLimiter, RateLimitedStore};

use crate::config::Config;

/// Refresh installation tokens this long before they expire.
const TOKEN_REFRESH_MARGIN_MINUTES: i64 = 5;

/// The store every command and delivery works against.
pub type Store = RateLimitedStore<GitHubStore>;

/// How themesync authenticates to GitHub.
pub enum Auth {
    App(AppCredentials),
    Token(String),
}

impl Auth {
    /// App credentials when configured, otherwise the plain token.
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        if let (Some(app_id), Some(key_path)) =
            (config.github.app_id, config.github.private_key_path.as_ref())
        {
            let pem = std::fs::read(key_path).map_err(|e| {
                format!("Failed to read private key {}: {e}", key_path.display())
            })?;
            return Ok(Auth::App(AppCredentials::from_pem(app_id, &pem)?));
        }

        config
            .github
            .token
            .clone()
            .map(Auth::Token)
            .ok_or_else(|| {
                "No GitHub credentials configured. Set github.app_id and \
                 github.private_key_path, or THEMESYNC_GITHUB__TOKEN."
                    .into()
            })
    }
}

/// Builds authenticated, rate-limited stores on demand.
pub struct GitHubConnector {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    auth: Auth,
    executor: RequestExecutor,
    limiter: Option<ApiRateLimiter>,
    tokens: Mutex<HashMap<u64, InstallationToken>>,
}

impl GitHubConnector {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_url: &str,
        auth: Auth,
        retry: RetryConfig,
        requests_per_second: u32,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.to_string(),
            auth,
            executor: RequestExecutor::new(retry),
            // Shared across repositories: the quota belongs to the installation.
            limiter: (requests_per_second > 0).then(|| ApiRateLimiter::new(requests_per_second)),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Token for `installation_id`, minted or taken from the cache.
    pub async fn token(&self, installation_id: Option<u64>) -> Result<String, GitHubError> {
        let credentials = match &self.auth {
            Auth::Token(token) => return Ok(token.clone()),
            Auth::App(credentials) => credentials,
        };
        let installation_id = installation_id.ok_or_else(|| {
            GitHubError::Auth("GitHub App authentication needs an installation id".to_string())
        })?;

        let margin = chrono::Duration::minutes(TOKEN_REFRESH_MARGIN_MINUTES);
        if let Some(cached) = self
            .tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&installation_id)
            .filter(|t| !t.expires_within(margin))
        {
            return Ok(cached.token.clone());
        }

        let fresh = credentials
            .installation_token(self.transport.as_ref(), &self.api_url, installation_id)
            .await?;
        let token = fresh.token.clone();
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(installation_id, fresh);
        Ok(token)
    }

    /// Store for `owner/repo`.
    pub async fn store(
        &self,
        owner: &str,
        repo: &str,
        installation_id: Option<u64>,
    ) -> Result<Store, GitHubError> {
        let token = self.token(installation_id).await?;
        let store = RateLimitedStore::new(
            GitHubStore::new(Arc::clone(&self.transport), &self.api_url, token, owner, repo),
            self.executor.clone(),
        );
        Ok(match &self.limiter {
            Some(limiter) => store.with_limiter(limiter.clone()),
            None => store,
        })
    }

    /// Pull request commenter for `owner/repo`.
    pub async fn commenter(
        &self,
        owner: &str,
        repo: &str,
        installation_id: Option<u64>,
    ) -> Result<PullRequestCommenter, GitHubError> {
        let token = self.token(installation_id).await?;
        let base_uri = (self.api_url != themesync::github::GITHUB_API_URL)
            .then_some(self.api_url.as_str());
        Ok(PullRequestCommenter::new(
            create_client(&token, base_uri)?,
            owner,
            repo,
        ))
    }
}

/// Split `owner/repo`.
pub fn parse_repository(full_name: &str) -> Result<(&str, &str), String> {
    match full_name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => Err(format!("Expected owner/repo, got '{full_name}'")),
    }
}

#[cfg(test)]
mod tests {
    use themesync::http::{HttpError, HttpRequest, HttpResponse};

    use super::*;

    /// Transport that fails every request, for paths that must not hit the network.
    struct OfflineTransport;

    #[async_trait::async_trait]
    impl HttpTransport for OfflineTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            Err(HttpError::Transport(format!("offline: {}", request.url)))
        }
    }

    fn connector(auth: Auth) -> GitHubConnector {
        GitHubConnector::new(
            Arc::new(OfflineTransport),
            "https://api.github.test",
            auth,
            RetryConfig::default(),
            0,
        )
    }

    #[tokio::test]
    async fn plain_token_needs_no_installation() {
        let connector = connector(Auth::Token("ghp_x".to_string()));
        assert_eq!(connector.token(None).await.unwrap(), "ghp_x");

        let store = connector.store("acme", "theme", None).await.unwrap();
        assert_eq!(themesync::ObjectStore::repository(&store), "acme/theme");
    }

    #[test]
    fn parse_repository_requires_owner_and_name() {
        assert_eq!(parse_repository("acme/theme").unwrap(), ("acme", "theme"));
        assert!(parse_repository("acme").is_err());
        assert!(parse_repository("acme/").is_err());
        assert!(parse_repository("a/b/c").is_err());
    }

    #[test]
    fn token_auth_comes_from_config() {
        let mut config = Config::default();
        assert!(Auth::from_config(&config).is_err());

        config.github.token = Some("ghp_y".to_string());
        assert!(matches!(Auth::from_config(&config), Ok(Auth::Token(t)) if t == "ghp_y"));
    }
}
