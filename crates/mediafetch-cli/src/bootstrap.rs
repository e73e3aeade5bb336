//! CLI bootstrap - the composition root.
//!
//! This module is the only place where concrete adapters are wired to the
//! download engine:
//! - configuration from the environment (after `.env` is loaded)
//! - the startup sweep of staged partial files
//! - source router (HTTP + local files)
//! - free-space probe (sysinfo)
//! - remote player (Kodi) when playback is requested

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mediafetch_core::{ChannelEmitter, DownloadConfig, DownloadEvent, NoopPlayer, PlayerPort};
use mediafetch_download::{
    DownloadManager, DownloadManagerDeps, SysinfoSpaceProbe, build_download_manager,
    sweep_partials,
};
use tokio::sync::mpsc;

use crate::error::CliError;
use crate::kodi::{KodiClient, KodiConfig};
use crate::sources::CliSource;

/// Capacity of the event channel between the engine and the terminal.
const EVENT_CAPACITY: usize = 1024;

/// Read the engine configuration once for this process.
///
/// `download_dir` overrides `DOWNLOAD_DIR`.
pub fn load_config(download_dir: Option<&Path>) -> Result<DownloadConfig, CliError> {
    let mut config = DownloadConfig::from_env();
    if let Some(dir) = download_dir {
        config = config.with_storage_root(dir);
    }
    config.validate()?;
    Ok(config)
}

/// Fully composed context for the fetch command.
pub struct CliContext {
    /// Immutable engine configuration.
    pub config: DownloadConfig,
    /// The queue manager.
    pub manager: Arc<DownloadManager>,
    /// Every event the manager emits.
    pub events: mpsc::Receiver<DownloadEvent>,
    /// Source router, also used to describe sources before submission.
    pub sources: Arc<CliSource>,
    /// Kodi client when playback was requested.
    pub kodi: Option<Arc<KodiClient>>,
}

/// Bootstrap the engine.
///
/// Runs the partial-file sweep before the manager exists, so nothing staged
/// by a previous process survives as a resumable transfer.
pub async fn bootstrap(config: DownloadConfig, play: bool) -> Result<CliContext> {
    tokio::fs::create_dir_all(&config.storage_root)
        .await
        .with_context(|| format!("Failed to create {}", config.storage_root.display()))?;

    let sweep_config = config.clone();
    let report = tokio::task::spawn_blocking(move || sweep_partials(&sweep_config))
        .await
        .context("Partial sweep task failed")?
        .map_err(CliError::from)?;
    if !report.removed.is_empty() || !report.promoted.is_empty() {
        tracing::info!(
            removed = report.removed.len(),
            promoted = report.promoted.len(),
            "Swept staged files from a previous run"
        );
    }

    let sources = Arc::new(CliSource::new().map_err(CliError::from)?);

    let kodi = if play {
        let client = KodiClient::new(KodiConfig::from_env()).context("Failed to build Kodi client")?;
        tracing::debug!(url = %client.config().url, "Kodi playback enabled");
        Some(Arc::new(client))
    } else {
        None
    };
    let player: Arc<dyn PlayerPort> = match &kodi {
        Some(client) => client.clone(),
        None => Arc::new(NoopPlayer),
    };

    let (emitter, events) = ChannelEmitter::new(EVENT_CAPACITY);
    let manager = build_download_manager(DownloadManagerDeps {
        source: sources.clone(),
        event_emitter: Arc::new(emitter),
        player,
        space_probe: Arc::new(SysinfoSpaceProbe::new()),
        config: config.clone(),
    });

    Ok(CliContext {
        config,
        manager,
        events,
        sources,
        kodi,
    })
}
