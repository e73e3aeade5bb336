//! Core download identifiers and data structures.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{DownloadState, TransitionError};
use crate::classify::{ChosenCategory, MediaCategory};

/// Identifier assigned to an item at admission.
///
/// Ids are unique for the lifetime of the process and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle resolved by a source adapter (a URL, a path, a message id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    /// Create a source reference.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to fetch one remote item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Where the bytes come from.
    pub source: SourceRef,
    /// Original filename, used for classification and duplicate detection.
    pub filename: String,
    /// Size reported by the source, if any. Advisory only.
    pub declared_size: Option<u64>,
    /// Category decided up front, skipping the classifier's guess.
    pub category: Option<ChosenCategory>,
}

impl DownloadRequest {
    /// Create a request with no declared size and no forced category.
    pub fn new(source: SourceRef, filename: impl Into<String>) -> Self {
        Self {
            source,
            filename: filename.into(),
            declared_size: None,
            category: None,
        }
    }

    /// Attach the size reported by the source.
    #[must_use]
    pub const fn with_declared_size(mut self, size: Option<u64>) -> Self {
        self.declared_size = size;
        self
    }

    /// Force a category instead of classifying the filename.
    #[must_use]
    pub const fn with_category(mut self, category: ChosenCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// One tracked transfer.
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadItem {
    /// Admission id.
    pub id: ItemId,
    /// Source to resolve through the source adapter.
    pub source: SourceRef,
    /// Original filename.
    pub filename: String,
    /// Size reported by the source.
    pub declared_size: Option<u64>,
    /// Bytes written for the current attempt.
    pub bytes_transferred: u64,
    /// Lifecycle state. Changed only through [`DownloadItem::transition`].
    pub state: DownloadState,
    /// Number of times a worker has started this item.
    pub attempt: u32,
    /// Classification result.
    pub category: MediaCategory,
    /// Final path, known once `category` is resolved.
    pub destination: Option<PathBuf>,
    /// When the item was admitted.
    pub submitted_at: DateTime<Utc>,
    /// Most recent failure reason, kept across retries.
    pub last_error: Option<String>,
}

impl DownloadItem {
    /// Create a queued item from a request.
    pub fn new(id: ItemId, request: &DownloadRequest) -> Self {
        Self {
            id,
            source: request.source.clone(),
            filename: request.filename.clone(),
            declared_size: request.declared_size,
            bytes_transferred: 0,
            state: DownloadState::Queued,
            attempt: 0,
            category: MediaCategory::Undetermined,
            destination: None,
            submitted_at: Utc::now(),
            last_error: None,
        }
    }

    /// Move to `to` if the state machine allows it.
    pub fn transition(&mut self, to: DownloadState) -> Result<(), TransitionError> {
        self.state = self.state.transition(to)?;
        Ok(())
    }

    /// Bytes still expected from the source (0 when the size is unknown).
    pub const fn remaining_bytes(&self) -> u64 {
        match self.declared_size {
            Some(size) => size.saturating_sub(self.bytes_transferred),
            None => 0,
        }
    }

    /// Completion percentage, if the declared size is known.
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> Option<f64> {
        match self.declared_size {
            Some(0) | None => None,
            Some(size) => Some((self.bytes_transferred as f64 / size as f64 * 100.0).min(100.0)),
        }
    }

    /// Build a read-only summary for status reporting.
    pub fn summary(&self, position: Option<u32>) -> ItemSummary {
        ItemSummary {
            id: self.id,
            filename: self.filename.clone(),
            state: self.state,
            bytes_transferred: self.bytes_transferred,
            declared_size: self.declared_size,
            percent: self.progress_percent(),
            attempt: self.attempt,
            category: self.category,
            destination: self.destination.clone(),
            submitted_at: self.submitted_at,
            position,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view of one item, returned by status queries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    /// Admission id.
    pub id: ItemId,
    /// Original filename.
    pub filename: String,
    /// Current state.
    pub state: DownloadState,
    /// Bytes written for the current attempt.
    pub bytes_transferred: u64,
    /// Size reported by the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_size: Option<u64>,
    /// Progress percentage (0.0 - 100.0) when the size is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    /// Start attempts so far.
    pub attempt: u32,
    /// Classification result.
    pub category: MediaCategory,
    /// Final path, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Admission time.
    pub submitted_at: DateTime<Utc>,
    /// 1-based queue position for waiting items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Last failure reason, if any attempt failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Point-in-time view of the whole manager.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Items holding a slot (Active or Paused), in admission order.
    pub active: Vec<ItemSummary>,
    /// Items waiting for a slot, in FIFO order.
    pub queued: Vec<ItemSummary>,
    /// Items parked until a category is chosen.
    pub awaiting_category: Vec<ItemSummary>,
    /// Configured concurrency limit.
    pub max_concurrent: u32,
}

impl StatusSnapshot {
    /// True when nothing is active, queued or parked.
    pub fn is_idle(&self) -> bool {
        self.active.is_empty() && self.queued.is_empty() && self.awaiting_category.is_empty()
    }
}
