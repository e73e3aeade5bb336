//! Per-item lifecycle state machine.
//!
//! ```text
//! Queued -> Active -> {Paused <-> Active} -> {Completed | Cancelled | Failed}
//! Queued -> Cancelled
//! Failed -> Queued            (retry only)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a download item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Waiting for a concurrency slot.
    Queued,
    /// A worker is streaming bytes for this item.
    Active,
    /// Reading is suspended; the slot and the partial file are retained.
    Paused,
    /// Stopped on request; the partial file is gone.
    Cancelled,
    /// Stopped by an error. Re-enters `Queued` only through the retry policy.
    Failed,
    /// Transferred and placed at its final path.
    Completed,
}

impl DownloadState {
    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }

    /// Whether the state ends the item's lifecycle.
    ///
    /// `Failed` counts as terminal even though a retry can move it back
    /// to `Queued`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed | Self::Completed)
    }

    /// Whether an item in this state holds a concurrency slot.
    #[must_use]
    pub const fn occupies_slot(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    /// Check whether `self -> to` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Active | Self::Cancelled)
                | (
                    Self::Active,
                    Self::Paused | Self::Completed | Self::Cancelled | Self::Failed
                )
                | (Self::Paused, Self::Active | Self::Cancelled | Self::Failed)
                | (Self::Failed, Self::Queued)
        )
    }

    /// Apply a transition, returning the new state.
    pub const fn transition(self, to: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An illegal state machine transition was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("invalid transition from {from} to {to}")]
pub struct TransitionError {
    /// State the item was in.
    pub from: DownloadState,
    /// State that was requested.
    pub to: DownloadState,
}
