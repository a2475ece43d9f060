use std::sync::Arc;
use std::time::Duration;

use themesync::http::HttpTransport;
use themesync::http::reqwest_transport::ReqwestTransport;
use themesync::theme::{ShopifyPublisher, ThemePublisher};

use crate::config::Config;
use crate::github::{Auth, GitHubConnector};

/// Timeout of a single API request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub(crate) fn transport() -> Result<Arc<dyn HttpTransport>, Box<dyn std::error::Error>> {
    Ok(Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(
        REQUEST_TIMEOUT_SECS,
    ))?))
}

/// Connector authenticated with the configured GitHub credentials.
pub(crate) fn connector(
    config: &Config,
    transport: Arc<dyn HttpTransport>,
    no_rate_limit: bool,
) -> Result<GitHubConnector, Box<dyn std::error::Error>> {
    let requests_per_second = if no_rate_limit {
        0
    } else {
        config.sync.requests_per_second
    };
    Ok(GitHubConnector::new(
        transport,
        &config.github.api_url,
        Auth::from_config(config)?,
        config.retry.clone(),
        requests_per_second,
    ))
}

/// Theme publisher, when a theme store is configured.
pub(crate) fn publisher(
    config: &Config,
    transport: Arc<dyn HttpTransport>,
) -> Option<Arc<dyn ThemePublisher>> {
    config
        .shopify
        .as_ref()
        .map(|shopify| Arc::new(ShopifyPublisher::new(transport, shopify)) as Arc<dyn ThemePublisher>)
}
