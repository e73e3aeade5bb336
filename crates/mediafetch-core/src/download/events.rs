//! Download events - discriminated union for all item state changes.
//!
//! Events for one item are emitted in the order they happen; events for
//! different items interleave freely. Delivery is best-effort.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::retry::ErrorClass;
use super::types::ItemId;
use crate::classify::MediaCategory;

/// Non-blocking advisory signals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoftWarning {
    /// Free space is below the warning threshold but above the hard floor.
    LowDisk {
        /// Current free bytes under the storage root.
        free_bytes: u64,
        /// Configured warning threshold in bytes.
        threshold_bytes: u64,
    },
    /// The final size differs from the declared size beyond tolerance.
    SizeMismatch {
        /// Size reported by the source.
        declared: u64,
        /// Bytes actually written.
        actual: u64,
    },
}

/// Single discriminated union for all download events.
///
/// Serialized with a `type` tag:
///
/// ```json
/// { "type": "queued", "id": 3, "position": 1 }
/// { "type": "progress", "id": 3, "bytes_transferred": 1024, "declared_size": 4096 }
/// { "type": "failed", "id": 3, "reason": "...", "class": "transient", "attempts": 3 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// Waiting for a slot at the given 1-based position.
    Queued {
        /// Item id.
        id: ItemId,
        /// 1-based queue position.
        position: u32,
    },

    /// Classification was ambiguous; a category choice is required.
    AwaitingCategory {
        /// Item id.
        id: ItemId,
        /// Filename that could not be classified.
        filename: String,
    },

    /// A worker started (or restarted) the transfer.
    Started {
        /// Item id.
        id: ItemId,
        /// 1-based attempt number.
        attempt: u32,
    },

    /// Rate-limited progress update.
    Progress {
        /// Item id.
        id: ItemId,
        /// Bytes written so far.
        bytes_transferred: u64,
        /// Size reported by the source.
        #[serde(skip_serializing_if = "Option::is_none")]
        declared_size: Option<u64>,
    },

    /// Reading suspended at a chunk boundary.
    Paused {
        /// Item id.
        id: ItemId,
        /// Offset the transfer will resume from.
        bytes_transferred: u64,
    },

    /// Reading resumed from the paused offset.
    Resumed {
        /// Item id.
        id: ItemId,
        /// Offset the transfer resumed from.
        bytes_transferred: u64,
    },

    /// Transfer finished and the file was placed.
    Completed {
        /// Item id.
        id: ItemId,
        /// Final path of the file.
        path: PathBuf,
        /// Category the path was built from.
        category: MediaCategory,
        /// Bytes written.
        bytes: u64,
    },

    /// The file is ready for the remote player.
    ReadyToPlay {
        /// Item id.
        id: ItemId,
        /// Final path of the file.
        path: PathBuf,
        /// Category the path was built from.
        category: MediaCategory,
        /// Result of the "is something already playing" predicate.
        already_playing: bool,
    },

    /// Stopped on request; no partial file remains.
    Cancelled {
        /// Item id.
        id: ItemId,
    },

    /// Terminal failure.
    Failed {
        /// Item id.
        id: ItemId,
        /// Human-readable reason.
        reason: String,
        /// Category of the last error.
        class: ErrorClass,
        /// Start attempts made.
        attempts: u32,
    },

    /// Admission refused for lack of disk space.
    DiskRefused {
        /// Item id.
        id: ItemId,
        /// Free bytes after eviction.
        free_bytes: u64,
        /// Free bytes needed.
        required_bytes: u64,
        /// Missing bytes.
        shortfall_bytes: u64,
    },

    /// Advisory signal; never changes control flow.
    SoftWarning {
        /// Item the warning relates to, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<ItemId>,
        /// The warning itself.
        warning: SoftWarning,
    },
}

impl DownloadEvent {
    /// Create a queued event.
    #[must_use]
    pub const fn queued(id: ItemId, position: u32) -> Self {
        Self::Queued { id, position }
    }

    /// Create a started event.
    #[must_use]
    pub const fn started(id: ItemId, attempt: u32) -> Self {
        Self::Started { id, attempt }
    }

    /// Create a progress event.
    #[must_use]
    pub const fn progress(id: ItemId, bytes_transferred: u64, declared_size: Option<u64>) -> Self {
        Self::Progress {
            id,
            bytes_transferred,
            declared_size,
        }
    }

    /// Create a failed event.
    pub fn failed(id: ItemId, reason: impl Into<String>, class: ErrorClass, attempts: u32) -> Self {
        Self::Failed {
            id,
            reason: reason.into(),
            class,
            attempts,
        }
    }

    /// Create a disk refusal event.
    #[must_use]
    pub const fn disk_refused(id: ItemId, free_bytes: u64, required_bytes: u64) -> Self {
        Self::DiskRefused {
            id,
            free_bytes,
            required_bytes,
            shortfall_bytes: required_bytes.saturating_sub(free_bytes),
        }
    }

    /// Create a low-disk soft warning.
    #[must_use]
    pub const fn low_disk(id: Option<ItemId>, free_bytes: u64, threshold_bytes: u64) -> Self {
        Self::SoftWarning {
            id,
            warning: SoftWarning::LowDisk {
                free_bytes,
                threshold_bytes,
            },
        }
    }

    /// Get the item id this event relates to, if any.
    pub const fn id(&self) -> Option<ItemId> {
        match self {
            Self::Queued { id, .. }
            | Self::AwaitingCategory { id, .. }
            | Self::Started { id, .. }
            | Self::Progress { id, .. }
            | Self::Paused { id, .. }
            | Self::Resumed { id, .. }
            | Self::Completed { id, .. }
            | Self::ReadyToPlay { id, .. }
            | Self::Cancelled { id }
            | Self::Failed { id, .. }
            | Self::DiskRefused { id, .. } => Some(*id),
            Self::SoftWarning { id, .. } => *id,
        }
    }

    /// Get the event name for logging.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Queued { .. } => "queued",
            Self::AwaitingCategory { .. } => "awaiting_category",
            Self::Started { .. } => "started",
            Self::Progress { .. } => "progress",
            Self::Paused { .. } => "paused",
            Self::Resumed { .. } => "resumed",
            Self::Completed { .. } => "completed",
            Self::ReadyToPlay { .. } => "ready_to_play",
            Self::Cancelled { .. } => "cancelled",
            Self::Failed { .. } => "failed",
            Self::DiskRefused { .. } => "disk_refused",
            Self::SoftWarning { .. } => "soft_warning",
        }
    }

    /// Whether this is the last event the item will produce.
    ///
    /// A completed item still produces `ReadyToPlay`, so `Completed` itself
    /// is not final.
    pub const fn is_final(&self) -> bool {
        matches!(
            self,
            Self::ReadyToPlay { .. }
                | Self::Cancelled { .. }
                | Self::Failed { .. }
                | Self::DiskRefused { .. }
        )
    }
}
