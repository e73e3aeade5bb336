//! Download engine for mediafetch.
//!
//! Implements the queue manager declared by `mediafetch-core`: bounded
//! concurrency with a FIFO wait queue, per-item workers that stream a
//! source into a staging file, a disk guard that evicts the oldest files
//! to make room, and placement of finished files into the library layout.
//!
//! - `manager` - admission, slots, leases, worker lifecycle
//! - `queue` - pure FIFO of waiting item ids
//! - `disk` - free-space guard and the `sysinfo` probe
//! - `partials` - staging paths and the startup sweep
//! - `placement` - moving files into place and pruning empty folders
//! - `progress` - per-item progress throttling

// Re-export core types for convenience
pub use mediafetch_core::{
    ChosenCategory, DownloadConfig, DownloadError, DownloadEvent, DownloadRequest, DownloadResult,
    DownloadState, ItemId, SourceRef, StatusSnapshot,
};

pub(crate) mod placement;
pub(crate) mod progress;
pub(crate) mod queue;

pub mod disk;
pub mod partials;

pub use disk::{DiskGuard, SpaceVerdict, SysinfoSpaceProbe};
pub use partials::{SweepReport, sweep_partials};
pub use progress::ProgressThrottle;

// Public API - download manager
mod manager;

pub use manager::{
    CompletedJob, DownloadJob, DownloadManager, DownloadManagerDeps, ProgressUpdate,
    SubmitOutcome, WorkerDeps, build_download_manager,
};

#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
