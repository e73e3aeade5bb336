//! Runtime configuration.
//!
//! Read once at startup and never mutated afterwards. Values come from the
//! process environment (optionally seeded from `.env` by the binary) and
//! fall back to defaults with a warning when they do not parse.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::download::RetryPolicy;

/// Default number of concurrently active transfers.
pub const DEFAULT_MAX_CONCURRENT: u32 = 5;
/// Default hard floor of free space, in MB.
pub const DEFAULT_MIN_FREE_DISK_MB: u64 = 200;
/// Default soft-warning threshold, in MB.
pub const DEFAULT_DISK_WARNING_MB: u64 = 500;
/// Default fraction of the declared size a file needs to count as complete.
pub const DEFAULT_COMPLETENESS_RATIO: f64 = 0.98;
/// Default tolerated deviation between final and declared size.
pub const DEFAULT_SIZE_TOLERANCE: f64 = 0.02;
/// Default minimum interval between progress events per item.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(3000);
/// Default pause before a transient failure is handed to the retry policy.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);
/// Directory under the storage root holding in-flight files.
pub const STAGING_DIR_NAME: &str = ".partial";

const MB: u64 = 1024 * 1024;

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("MAX_CONCURRENT_DOWNLOADS must be at least 1")]
    ZeroConcurrency,

    #[error("Storage root cannot be empty")]
    EmptyStorageRoot,

    #[error("{name} must be in {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: f64,
    },
}

/// Immutable settings for the download engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root under which files are staged and organized.
    pub storage_root: PathBuf,
    /// Maximum simultaneously active (or paused) transfers.
    pub max_concurrent: u32,
    /// Maximum start attempts per item.
    pub max_retry_attempts: u32,
    /// Hard floor of free space after a projected transfer, in MB.
    pub min_free_disk_mb: u64,
    /// Soft-warning threshold, in MB.
    pub disk_warning_mb: u64,
    /// Place completed files into the Movies/Series/Other layout.
    pub organize: bool,
    /// Fraction of the declared size a file needs to count as complete.
    pub completeness_ratio: f64,
    /// Tolerated relative deviation between final and declared size.
    pub size_tolerance: f64,
    /// Minimum interval between progress events per item.
    pub progress_interval: Duration,
    /// Pause before a transient failure is reported.
    pub retry_delay: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_retry_attempts: crate::download::retry::DEFAULT_MAX_ATTEMPTS,
            min_free_disk_mb: DEFAULT_MIN_FREE_DISK_MB,
            disk_warning_mb: DEFAULT_DISK_WARNING_MB,
            organize: true,
            completeness_ratio: DEFAULT_COMPLETENESS_RATIO,
            size_tolerance: DEFAULT_SIZE_TOLERANCE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl DownloadConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            storage_root: get("DOWNLOAD_DIR").map_or(defaults.storage_root, |v| expand_home(&v)),
            max_concurrent: parse_or(
                "MAX_CONCURRENT_DOWNLOADS",
                get("MAX_CONCURRENT_DOWNLOADS"),
                defaults.max_concurrent,
            ),
            max_retry_attempts: parse_or(
                "MAX_RETRY_ATTEMPTS",
                get("MAX_RETRY_ATTEMPTS"),
                defaults.max_retry_attempts,
            ),
            min_free_disk_mb: parse_or(
                "MIN_FREE_DISK_MB",
                get("MIN_FREE_DISK_MB"),
                defaults.min_free_disk_mb,
            ),
            disk_warning_mb: parse_or(
                "DISK_WARNING_MB",
                get("DISK_WARNING_MB"),
                defaults.disk_warning_mb,
            ),
            organize: get("ORGANIZE_MEDIA").map_or(defaults.organize, |v| {
                parse_flag(&v).unwrap_or_else(|| {
                    tracing::warn!(key = "ORGANIZE_MEDIA", value = %v, "Invalid flag, using default");
                    defaults.organize
                })
            }),
            completeness_ratio: parse_or(
                "PARTIAL_COMPLETENESS_RATIO",
                get("PARTIAL_COMPLETENESS_RATIO"),
                defaults.completeness_ratio,
            ),
            size_tolerance: parse_or(
                "SIZE_TOLERANCE_RATIO",
                get("SIZE_TOLERANCE_RATIO"),
                defaults.size_tolerance,
            ),
            progress_interval: Duration::from_millis(parse_or(
                "PROGRESS_INTERVAL_MS",
                get("PROGRESS_INTERVAL_MS"),
                millis(defaults.progress_interval),
            )),
            retry_delay: Duration::from_millis(parse_or(
                "RETRY_DELAY_MS",
                get("RETRY_DELAY_MS"),
                millis(defaults.retry_delay),
            )),
        }
    }

    /// Set the storage root.
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// Set the concurrency limit.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the retry ceiling.
    #[must_use]
    pub const fn with_max_retry_attempts(mut self, max: u32) -> Self {
        self.max_retry_attempts = max;
        self
    }

    /// Set the hard floor and warning threshold, in MB.
    #[must_use]
    pub const fn with_disk_thresholds(mut self, min_free_mb: u64, warning_mb: u64) -> Self {
        self.min_free_disk_mb = min_free_mb;
        self.disk_warning_mb = warning_mb;
        self
    }

    /// Enable or disable organized placement.
    #[must_use]
    pub const fn with_organize(mut self, organize: bool) -> Self {
        self.organize = organize;
        self
    }

    /// Set the completeness ratio.
    #[must_use]
    pub const fn with_completeness_ratio(mut self, ratio: f64) -> Self {
        self.completeness_ratio = ratio;
        self
    }

    /// Set the progress interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.storage_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorageRoot);
        }
        if !(self.completeness_ratio > 0.0 && self.completeness_ratio <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "PARTIAL_COMPLETENESS_RATIO",
                range: "(0, 1]",
                value: self.completeness_ratio,
            });
        }
        if !(0.0..1.0).contains(&self.size_tolerance) {
            return Err(ConfigError::OutOfRange {
                name: "SIZE_TOLERANCE_RATIO",
                range: "[0, 1)",
                value: self.size_tolerance,
            });
        }
        Ok(())
    }

    /// Hard floor in bytes.
    #[must_use]
    pub const fn min_free_bytes(&self) -> u64 {
        self.min_free_disk_mb.saturating_mul(MB)
    }

    /// Warning threshold in bytes.
    #[must_use]
    pub const fn warning_bytes(&self) -> u64 {
        self.disk_warning_mb.saturating_mul(MB)
    }

    /// Directory holding in-flight files.
    pub fn staging_dir(&self) -> PathBuf {
        self.storage_root.join(STAGING_DIR_NAME)
    }

    /// Retry policy derived from the attempt ceiling.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retry_attempts)
    }

    /// Whether `actual` bytes count as a complete copy of `declared`.
    ///
    /// A zero declared size is trivially complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn meets_completeness(&self, actual: u64, declared: u64) -> bool {
        declared == 0 || actual as f64 >= self.completeness_ratio * declared as f64
    }

    /// Whether `actual` deviates from `declared` beyond the size tolerance.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn deviates(&self, actual: u64, declared: u64) -> bool {
        let diff = actual.abs_diff(declared) as f64;
        diff > self.size_tolerance * declared as f64
    }
}

fn default_storage_root() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from("downloads"), |home| home.join("Downloads"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let rest = match trimmed.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(trimmed),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(Path::new(rest)),
        None => PathBuf::from(trimmed),
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy,
{
    let Some(raw) = raw else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, "Invalid value, using default");
        default
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
