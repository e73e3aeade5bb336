//! Download domain types, events, errors, and retry policy.
//!
//! This module contains pure data types for the download system. No I/O,
//! networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Identifiers, requests, tracked items and status snapshots
//! - `state` - Per-item lifecycle state machine
//! - `events` - Notifier events (`DownloadEvent`, `SoftWarning`)
//! - `errors` - Error taxonomy for transfers and manager operations
//! - `retry` - Transient/fatal classification and the retry decision

pub mod errors;
pub mod events;
pub mod retry;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use errors::{DownloadError, DownloadResult};
pub use events::{DownloadEvent, SoftWarning};
pub use retry::{ErrorClass, RetryDecision, RetryPolicy};
pub use state::{DownloadState, TransitionError};
pub use types::{DownloadItem, DownloadRequest, ItemId, ItemSummary, SourceRef, StatusSnapshot};
