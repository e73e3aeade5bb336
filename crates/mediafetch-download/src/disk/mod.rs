//! Disk guard: free-space admission check with oldest-first eviction.
//!
//! The guard answers one question: can a transfer of `projected` bytes
//! start while leaving at least the configured floor free? When it cannot,
//! files under the storage root are deleted oldest-first (by mtime, then
//! path) until it can, or until nothing deletable is left.
//!
//! The staging directory holding in-flight transfers is never a candidate.
//! Callers serialize `ensure_space` behind the admission lock, so two
//! evictions never run at once.

mod probe;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use mediafetch_core::{DownloadConfig, DownloadResult, SoftWarning, SpaceProbe};

use crate::placement::remove_empty_parents;

pub use probe::SysinfoSpaceProbe;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceVerdict {
    /// Enough space, possibly after evicting files.
    Ok {
        /// Free bytes after any eviction.
        free_bytes: u64,
        /// Files deleted to get there, oldest first.
        evicted: Vec<PathBuf>,
    },
    /// Not enough space even after evicting every candidate.
    Refused {
        /// Free bytes after eviction.
        free_bytes: u64,
        /// Free bytes the transfer needs (projected size plus floor).
        required_bytes: u64,
    },
}

impl SpaceVerdict {
    /// Whether the transfer may start.
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Free bytes after the check.
    pub const fn free_bytes(&self) -> u64 {
        match self {
            Self::Ok { free_bytes, .. } | Self::Refused { free_bytes, .. } => *free_bytes,
        }
    }

    /// Missing bytes for a refusal, zero otherwise.
    pub const fn shortfall(&self) -> u64 {
        match self {
            Self::Ok { .. } => 0,
            Self::Refused {
                free_bytes,
                required_bytes,
            } => required_bytes.saturating_sub(*free_bytes),
        }
    }
}

/// A file that may be evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    /// Absolute path.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes.
    pub size: u64,
}

/// Free-space guard over one storage root.
#[derive(Clone)]
pub struct DiskGuard {
    probe: Arc<dyn SpaceProbe>,
    root: PathBuf,
    staging: PathBuf,
    min_free_bytes: u64,
    warning_bytes: u64,
}

impl DiskGuard {
    /// Create a guard with explicit thresholds in bytes.
    pub fn new(
        probe: Arc<dyn SpaceProbe>,
        root: impl Into<PathBuf>,
        staging: impl Into<PathBuf>,
        min_free_bytes: u64,
        warning_bytes: u64,
    ) -> Self {
        Self {
            probe,
            root: root.into(),
            staging: staging.into(),
            min_free_bytes,
            warning_bytes,
        }
    }

    /// Create a guard from the runtime configuration.
    pub fn from_config(probe: Arc<dyn SpaceProbe>, config: &DownloadConfig) -> Self {
        Self::new(
            probe,
            config.storage_root.clone(),
            config.staging_dir(),
            config.min_free_bytes(),
            config.warning_bytes(),
        )
    }

    /// Storage root this guard watches.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hard floor in bytes.
    pub const fn min_free_bytes(&self) -> u64 {
        self.min_free_bytes
    }

    /// Warning threshold in bytes.
    pub const fn warning_bytes(&self) -> u64 {
        self.warning_bytes
    }

    /// Current free bytes under the root.
    pub fn free_bytes(&self) -> DownloadResult<u64> {
        self.probe.free_bytes(&self.root)
    }

    /// Make room for `projected_bytes` while keeping the floor free.
    ///
    /// Always terminates: every iteration deletes (or skips) one entry of
    /// a candidate list built once up front.
    pub fn ensure_space(&self, projected_bytes: u64) -> DownloadResult<SpaceVerdict> {
        let required_bytes = projected_bytes.saturating_add(self.min_free_bytes);
        let mut free_bytes = self.free_bytes()?;
        if free_bytes >= required_bytes {
            return Ok(SpaceVerdict::Ok {
                free_bytes,
                evicted: Vec::new(),
            });
        }

        tracing::warn!(
            target: "mediafetch.download",
            free_bytes,
            required_bytes,
            "Low disk space, evicting oldest files"
        );

        let mut evicted = Vec::new();
        for candidate in self.eviction_candidates() {
            if free_bytes >= required_bytes {
                break;
            }
            match std::fs::remove_file(&candidate.path) {
                Ok(()) => {
                    tracing::warn!(
                        target: "mediafetch.download",
                        path = %candidate.path.display(),
                        size = candidate.size,
                        "Evicted file"
                    );
                    if let Some(parent) = candidate.path.parent() {
                        remove_empty_parents(parent, &self.root);
                    }
                    evicted.push(candidate.path);
                }
                Err(err) => {
                    tracing::warn!(
                        target: "mediafetch.download",
                        path = %candidate.path.display(),
                        error = %err,
                        "Could not evict file"
                    );
                    continue;
                }
            }
            free_bytes = self.free_bytes()?;
        }

        if free_bytes >= required_bytes {
            Ok(SpaceVerdict::Ok {
                free_bytes,
                evicted,
            })
        } else {
            Ok(SpaceVerdict::Refused {
                free_bytes,
                required_bytes,
            })
        }
    }

    /// Soft warning when `free_bytes` is under the warning threshold.
    pub const fn low_space_warning(&self, free_bytes: u64) -> Option<SoftWarning> {
        if free_bytes < self.warning_bytes {
            Some(SoftWarning::LowDisk {
                free_bytes,
                threshold_bytes: self.warning_bytes,
            })
        } else {
            None
        }
    }

    /// Every regular file under the root outside the staging directory,
    /// ordered by `(mtime, path)` ascending.
    pub fn eviction_candidates(&self) -> Vec<EvictionCandidate> {
        let mut candidates = Vec::new();
        let mut dirs = vec![self.root.clone()];

        while let Some(dir) = dirs.pop() {
            if dir == self.staging {
                continue;
            }
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                let path = entry.path();
                if file_type.is_dir() {
                    dirs.push(path);
                } else if file_type.is_file() {
                    let Ok(metadata) = entry.metadata() else {
                        continue;
                    };
                    candidates.push(EvictionCandidate {
                        path,
                        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                        size: metadata.len(),
                    });
                }
            }
        }

        candidates.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        candidates
    }
}
