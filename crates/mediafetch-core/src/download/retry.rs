//! Retry policy.
//!
//! Decides whether a failed attempt goes back to the tail of the queue or
//! ends the item. Only transient errors are retried, and only while the
//! item has attempts left. Disk refusals are never retried.

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;
use super::types::DownloadItem;

/// Default number of start attempts per item.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Coarse error category reported with failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Likely to succeed on a later attempt.
    Transient,
    /// Will not succeed without outside intervention.
    Fatal,
    /// Admission refused for lack of disk space.
    DiskRefused,
    /// A paused item's source can no longer be reopened.
    SourceExpired,
    /// Stopped on request; not a failure.
    Cancelled,
}

impl ErrorClass {
    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::DiskRefused => "disk_refused",
            Self::SourceExpired => "source_expired",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Outcome of consulting the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue at the tail; the next start will be attempt `next_attempt`.
    Retry {
        /// Attempt number of the next start.
        next_attempt: u32,
    },
    /// Terminal failure.
    GiveUp,
}

/// Bounded retry policy keyed on [`ErrorClass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` starts per item.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Configured attempt ceiling.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True when `error` is transient and `item` has attempts left.
    #[must_use]
    pub const fn should_retry(&self, item: &DownloadItem, error: &DownloadError) -> bool {
        self.permits(item.attempt, error)
    }

    /// Same check keyed on a bare attempt count.
    #[must_use]
    pub const fn permits(&self, attempt: u32, error: &DownloadError) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }

    /// Same as [`Self::should_retry`], with the next attempt number.
    #[must_use]
    pub const fn decide(&self, item: &DownloadItem, error: &DownloadError) -> RetryDecision {
        if self.should_retry(item, error) {
            RetryDecision::Retry {
                next_attempt: item.attempt + 1,
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
