//! GitHub App authentication.
//!
//! A webhook delivery carries the installation id; the server signs a short
//! lived app JWT and exchanges it for an installation access token that the
//! [`GitHubStore`](super::GitHubStore) then uses.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use super::client::GITHUB_API_VERSION;
use super::error::{GitHubError, error_message};
use super::types::InstallationToken;
use crate::http::{HttpMethod, HttpRequest, HttpTransport};

/// Backdate `iat` to tolerate clock drift between us and GitHub.
const JWT_CLOCK_SKEW_SECS: i64 = 60;
/// GitHub rejects app JWTs valid for more than ten minutes.
const JWT_LIFETIME_SECS: i64 = 540;

#[derive(Debug, Serialize)]
struct Claims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// App id plus signing key.
#[derive(Clone)]
pub struct AppCredentials {
    app_id: u64,
    key: EncodingKey,
    algorithm: Algorithm,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl AppCredentials {
    /// Load credentials from the app's PEM-encoded RSA private key.
    pub fn from_pem(app_id: u64, pem: &[u8]) -> Result<Self, GitHubError> {
        Ok(Self {
            app_id,
            key: EncodingKey::from_rsa_pem(pem)?,
            algorithm: Algorithm::RS256,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_secret(app_id: u64, secret: &[u8]) -> Self {
        Self {
            app_id,
            key: EncodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    #[must_use]
    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Sign an app JWT valid for nine minutes.
    pub fn jwt(&self) -> Result<String, GitHubError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iat: now - JWT_CLOCK_SKEW_SECS,
            exp: now + JWT_LIFETIME_SECS,
            iss: self.app_id.to_string(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(self.algorithm),
            &claims,
            &self.key,
        )?)
    }

    /// Exchange an app JWT for an installation access token.
    pub async fn installation_token(
        &self,
        transport: &dyn HttpTransport,
        api_url: &str,
        installation_id: u64,
    ) -> Result<InstallationToken, GitHubError> {
        let url = format!(
            "{}/app/installations/{installation_id}/access_tokens",
            api_url.trim_end_matches('/')
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.jwt()?))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);

        let response = transport.send(request).await?;
        if !response.is_success() {
            return Err(GitHubError::Response {
                status: response.status,
                message: error_message(&response.body),
            });
        }

        let token: InstallationToken = serde_json::from_slice(&response.body)
            .map_err(|e| GitHubError::Decode(e.to_string()))?;

        tracing::debug!(
            installation_id,
            expires_at = %token.expires_at,
            "Obtained installation token"
        );

        Ok(token)
    }
}
