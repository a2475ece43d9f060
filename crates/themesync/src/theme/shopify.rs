//! Shopify Admin REST API theme publisher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::batch::{BatchConfig, run_batched};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::retry::{RequestExecutor, RetryConfig};
use crate::sync::MAX_RETRIES;

use super::error::{Result, ThemeError};
use super::files::{ThemeContent, ThemeFile};
use super::{Theme, ThemePublisher};

/// Admin API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2024-10";

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

/// Throttled calls back off from one second and never wait less than the
/// store's `Retry-After`. There is no per-call spacing; `upload` paces uploads.
fn default_retry() -> RetryConfig {
    RetryConfig::new(Duration::from_secs(1), Duration::from_secs(30), MAX_RETRIES)
        .with_spacing(Duration::ZERO)
        .with_secondary_floor(Duration::ZERO)
}

/// Connection settings for one Shopify store.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyConfig {
    /// Store domain, e.g. `acme.myshopify.com`.
    pub store: String,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Pacing of asset uploads.
    #[serde(default)]
    pub upload: BatchConfig,
    /// Retries of throttled (429) calls.
    #[serde(default = "default_retry")]
    pub retry: RetryConfig,
}

#[derive(Deserialize)]
struct ThemeEnvelope {
    theme: Theme,
}

#[derive(Deserialize)]
struct ThemesEnvelope {
    themes: Vec<Theme>,
}

#[derive(Serialize)]
struct NewTheme<'a> {
    name: &'a str,
    role: &'static str,
}

#[derive(Serialize)]
struct NewThemeEnvelope<'a> {
    theme: NewTheme<'a>,
}

#[derive(Serialize)]
struct Asset<'a> {
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<&'a str>,
}

#[derive(Serialize)]
struct AssetEnvelope<'a> {
    asset: Asset<'a>,
}

impl<'a> From<&'a ThemeFile> for AssetEnvelope<'a> {
    fn from(file: &'a ThemeFile) -> Self {
        let (value, attachment) = match &file.content {
            ThemeContent::Text(text) => (Some(text.as_str()), None),
            ThemeContent::Attachment(data) => (None, Some(data.as_str())),
        };
        AssetEnvelope {
            asset: Asset {
                key: &file.path,
                value,
                attachment,
            },
        }
    }
}

/// Publishes themes to one Shopify store.
#[derive(Clone)]
pub struct ShopifyPublisher {
    transport: Arc<dyn HttpTransport>,
    store: String,
    base_url: String,
    access_token: String,
    upload: BatchConfig,
    executor: RequestExecutor,
}

impl ShopifyPublisher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ShopifyConfig) -> Self {
        Self {
            transport,
            store: config.store.clone(),
            base_url: format!(
                "https://{}/admin/api/{}",
                config.store, config.api_version
            ),
            access_token: config.access_token.clone(),
            upload: config.upload.clone(),
            executor: RequestExecutor::new(config.retry.clone()),
        }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}/{}", self.base_url, path))
            .header("Accept", "application/json")
            .header("X-Shopify-Access-Token", self.access_token.clone())
    }

    /// Send `request`, retrying it while the store throttles.
    async fn send(&self, request: HttpRequest, theme_id: Option<u64>) -> Result<HttpResponse> {
        self.executor
            .execute_with(&request.url, ThemeError::rate_limit_kind, || {
                self.send_once(request.clone(), theme_id)
            })
            .await
    }

    async fn send_once(&self, request: HttpRequest, theme_id: Option<u64>) -> Result<HttpResponse> {
        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let message = response.text().trim().to_string();
        Err(match (response.status, theme_id) {
            (404, Some(id)) => ThemeError::NotFound { id },
            (429, _) => ThemeError::RateLimited {
                message,
                retry_after: retry_after(&response),
            },
            (status, _) => ThemeError::Api { status, message },
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        theme_id: Option<u64>,
    ) -> Result<T> {
        let response = self.send(request, theme_id).await?;
        serde_json::from_slice(&response.body).map_err(|e| ThemeError::Decode(e.to_string()))
    }

    async fn upload_asset(&self, theme_id: u64, file: &ThemeFile) -> Result<()> {
        let request = self
            .request(HttpMethod::Put, &format!("themes/{theme_id}/assets.json"))
            .json(&AssetEnvelope::from(file))?;
        self.send(request, Some(theme_id)).await?;
        tracing::trace!(store = %self.store, theme_id, path = %file.path, "Uploaded asset");
        Ok(())
    }
}

/// Shopify sends `Retry-After` in (possibly fractional) seconds.
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl ThemePublisher for ShopifyPublisher {
    fn store(&self) -> &str {
        &self.store
    }

    async fn list_themes(&self) -> Result<Vec<Theme>> {
        let envelope: ThemesEnvelope = self
            .send_json(self.request(HttpMethod::Get, "themes.json"), None)
            .await?;
        Ok(envelope.themes)
    }

    async fn create_theme(&self, name: &str) -> Result<Theme> {
        let request = self
            .request(HttpMethod::Post, "themes.json")
            .json(&NewThemeEnvelope {
                theme: NewTheme {
                    name,
                    role: "unpublished",
                },
            })?;
        let envelope: ThemeEnvelope = self.send_json(request, None).await?;
        Ok(envelope.theme)
    }

    async fn upload_files(&self, theme_id: u64, files: &[ThemeFile]) -> Result<usize> {
        let uploaded = run_batched(
            files.iter().collect::<Vec<_>>(),
            |file| self.upload_asset(theme_id, file),
            &self.upload,
        )
        .await?;
        Ok(uploaded.len())
    }

    async fn theme_status(&self, theme_id: u64) -> Result<Theme> {
        let envelope: ThemeEnvelope = self
            .send_json(
                self.request(HttpMethod::Get, &format!("themes/{theme_id}.json")),
                Some(theme_id),
            )
            .await?;
        Ok(envelope.theme)
    }

    async fn delete_theme(&self, theme_id: u64) -> Result<()> {
        self.send(
            self.request(HttpMethod::Delete, &format!("themes/{theme_id}.json")),
            Some(theme_id),
        )
        .await?;
        Ok(())
    }

    fn preview_url(&self, theme_id: u64) -> String {
        format!("https://{}/?preview_theme_id={theme_id}", self.store)
    }
}
