//! Core domain types and port definitions for mediafetch.
//!
//! This crate is pure: no filesystem walking, no networking, no runtime.
//! Adapters (the download engine, the CLI) depend on it and implement
//! its ports.
//!
//! - `download` - item lifecycle, state machine, errors, events, retry policy
//! - `classify` - filename classification into an organized library layout
//! - `media` - ranked "is this playable media" capability check
//! - `config` - immutable runtime configuration
//! - `ports` - traits for source adapters, notifiers, players and disk probes

pub mod classify;
pub mod config;
pub mod download;
pub mod media;
pub mod ports;
pub mod utils;

// Re-export commonly used types for convenience
pub use classify::{
    ChosenCategory, Classification, MediaCategory, UnknownCategory, classify, classify_as,
};
pub use config::{ConfigError, DownloadConfig};
pub use download::{
    DownloadError, DownloadEvent, DownloadItem, DownloadRequest, DownloadResult, DownloadState,
    ErrorClass, ItemId, ItemSummary, RetryDecision, RetryPolicy, SoftWarning, SourceRef,
    StatusSnapshot, TransitionError,
};
pub use media::{MediaCheck, MediaEvidence, MediaKind, MediaProbe};
pub use ports::{
    ChannelEmitter, DownloadEventEmitterPort, NoopDownloadEmitter, NoopPlayer, PlayerPort,
    SourceAdapter, SourceReader, SourceStream, SpaceProbe,
};
pub use utils::humanize_size;

#[cfg(test)]
use tokio_test as _;
