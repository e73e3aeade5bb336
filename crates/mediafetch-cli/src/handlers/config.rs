//! Config handler: prints the effective configuration.

use anyhow::Result;
use mediafetch_core::{DownloadConfig, humanize_size};

use crate::kodi::KodiConfig;

/// Text rendering of the effective settings.
pub fn render(config: &DownloadConfig, kodi: &KodiConfig) -> String {
    let on_off = |flag: bool| if flag { "on" } else { "off" };
    [
        format!("DOWNLOAD_DIR               {}", config.storage_root.display()),
        format!("MAX_CONCURRENT_DOWNLOADS   {}", config.max_concurrent),
        format!("MAX_RETRY_ATTEMPTS         {}", config.max_retry_attempts),
        format!(
            "MIN_FREE_DISK_MB           {} ({})",
            config.min_free_disk_mb,
            humanize_size(config.min_free_bytes())
        ),
        format!(
            "DISK_WARNING_MB            {} ({})",
            config.disk_warning_mb,
            humanize_size(config.warning_bytes())
        ),
        format!("ORGANIZE_MEDIA             {}", on_off(config.organize)),
        format!("PARTIAL_COMPLETENESS_RATIO {}", config.completeness_ratio),
        format!("SIZE_TOLERANCE_RATIO       {}", config.size_tolerance),
        format!(
            "PROGRESS_INTERVAL_MS       {}",
            config.progress_interval.as_millis()
        ),
        format!("RETRY_DELAY_MS             {}", config.retry_delay.as_millis()),
        format!("KODI_URL                   {}", kodi.url),
        format!("KODI_USERNAME              {}", kodi.username),
        format!(
            "KODI_PASSWORD              {}",
            if kodi.password.is_some() { "(set)" } else { "(not set)" }
        ),
    ]
    .join("\n")
}

/// Execute the config command.
pub fn execute(config: &DownloadConfig) -> Result<()> {
    println!("{}", render(config, &KodiConfig::from_env()));
    Ok(())
}
