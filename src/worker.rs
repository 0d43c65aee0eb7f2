use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DeclaredWatch};
use crate::error::{Error, Result};
use crate::manager::{ToggleRequest, WatchManager, WatchSettings};
use crate::provider::ChzzkProvider;
use crate::recovery::recover;
use crate::sink::DiscordClient;
use crate::store::JsonFileStore;

/// Runs the watch service until `token` is cancelled.
///
/// # Behavior
///
/// - Loads configuration and opens the persisted watch state
/// - Restores every persisted watch whose channel still resolves
/// - Starts the watches declared in the config that are not active yet
/// - Waits for shutdown, then cancels every scheduled tick
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the HTTP
/// clients cannot be built.
pub async fn run(token: CancellationToken) -> Result<()> {
    let config = Config::load()?;
    let roster = config.roster();
    let state_path = config.state_path()?;

    // Initial configuration logging
    info!("Starting live watch service...");
    info!(
        "Check interval: {} seconds",
        config.config.check_interval_secs
    );
    info!("Timeout: {} seconds", config.config.timeout_secs);
    info!("Roster has {} streamers", roster.len());
    info!("State file: {}", state_path.display());
    if roster.is_empty() {
        warn!("Roster is empty, only unknown-subject notices can be sent");
    }

    let provider = Arc::new(ChzzkProvider::new(
        &config.config.api_base_url,
        config.config.timeout_secs,
    )?);
    let discord = Arc::new(DiscordClient::new(
        &config.config.discord_api_base,
        config.discord_token()?,
        config.config.timeout_secs,
    )?);

    let manager = WatchManager::new(
        roster,
        provider,
        discord.clone(),
        Box::new(JsonFileStore::open(state_path)),
        WatchSettings {
            period: Duration::from_secs(config.config.check_interval_secs),
            live_url_base: config.config.live_url_base.clone(),
        },
        token.child_token(),
    );

    recover(&manager, discord.as_ref()).await;

    for declared in &config.watches {
        ensure_declared(&manager, declared).await;
    }

    token.cancelled().await;
    info!("Shutdown requested");
    manager.shutdown().await;

    // Cleanup and shutdown
    info!("Live watch service stopped gracefully");
    Ok(())
}

async fn ensure_declared(manager: &Arc<WatchManager>, declared: &DeclaredWatch) {
    let request = ToggleRequest {
        owner_user_id: declared.owner_user_id.clone(),
        channel_id: declared.channel_id.clone(),
        guild_id: declared.guild_id.clone(),
        selector_text: declared.subject.clone(),
    };

    let record = match manager.record_for(&request) {
        Ok(record) => record,
        Err(text) => {
            warn!("Declared watch skipped: {}", Error::UnknownSelector(text));
            return;
        }
    };

    match manager.start(record).await {
        Ok(()) | Err(Error::AlreadyWatching(_)) => {}
        Err(e) => warn!("Declared watch not started: {e}"),
    }
}
