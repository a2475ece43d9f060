use std::sync::Arc;

use crate::commands::shared;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::server::{self, AppState};

pub(crate) async fn handle_serve(
    config: &Config,
    bind: Option<String>,
    no_rate_limit: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let secret = config.github.webhook_secret.clone().ok_or(
        "No webhook secret configured. Set github.webhook_secret or THEMESYNC_GITHUB__WEBHOOK_SECRET.",
    )?;

    let transport = shared::transport()?;
    let connector = shared::connector(config, Arc::clone(&transport), no_rate_limit)?;
    let publisher = shared::publisher(config, transport);
    if publisher.is_none() {
        tracing::warn!("No theme store configured; preview labels will fail");
    }

    let dispatcher = Dispatcher::new(Arc::new(connector), publisher, config.sync_options());
    let state = AppState::new(secret, config.routing(), Arc::new(dispatcher));

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    server::serve(&bind, state).await?;
    tracing::info!("Server stopped");
    Ok(())
}
