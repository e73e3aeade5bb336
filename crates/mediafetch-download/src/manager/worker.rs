//! Download worker pipeline.
//!
//! This module contains the transfer loop, isolated from the queue
//! orchestration. The worker operates on a value-type `DownloadJob` and
//! cloned Arc dependencies, with no access to the manager's registry lock.
//!
//! # Design Principles
//!
//! - Worker receives a `DownloadJob` (value type) and `WorkerDeps` (cloned Arcs)
//! - Live byte counts go to a `watch::Sender`; the manager reads them for
//!   status and disk projection
//! - Per-item events (`Progress`, `Paused`, `Resumed`) are emitted from
//!   here so they stay ordered with the bytes they describe
//! - Cancellation is handled via `tokio::select!` around every await that
//!   touches the source
//! - On any failure the staged file is deleted before returning

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use mediafetch_core::{
    DownloadError, DownloadEvent, DownloadEventEmitterPort, DownloadResult, ItemId, RetryPolicy,
    SourceAdapter, SourceReader, SourceRef, SourceStream,
};

use crate::placement::remove_if_exists;
use crate::progress::ProgressThrottle;

/// Dependencies for the download worker.
#[derive(Clone)]
pub struct WorkerDeps {
    /// Source adapter used to open (and reopen) the stream.
    pub source: Arc<dyn SourceAdapter>,
    /// Event sink for per-item events.
    pub event_emitter: Arc<dyn DownloadEventEmitterPort>,
    /// Minimum spacing of `Progress` events.
    pub progress_interval: Duration,
    /// Pause before handing a retryable failure back to the manager.
    pub retry_delay: Duration,
    /// Used only to decide whether to wait `retry_delay`.
    pub retry_policy: RetryPolicy,
}

/// A download job to be executed by the worker.
///
/// This is a value type containing all information needed to run one
/// attempt, with no references back to the manager.
pub struct DownloadJob {
    /// The item id.
    pub id: ItemId,
    /// Source to open.
    pub source: SourceRef,
    /// Size known at submission, if any.
    pub declared_size: Option<u64>,
    /// 1-based attempt number of this run.
    pub attempt: u32,
    /// File the bytes are written to.
    pub staged_path: PathBuf,
    /// Cancellation token for this job.
    pub cancel: CancellationToken,
    /// `true` while the item is paused.
    pub pause_rx: watch::Receiver<bool>,
    /// Progress sender for this job.
    pub progress_tx: watch::Sender<ProgressUpdate>,
}

/// Progress update sent through the watch channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Bytes written so far.
    pub bytes_transferred: u64,
    /// Declared size, once known.
    pub declared_size: Option<u64>,
}

impl ProgressUpdate {
    /// Create a progress update.
    pub const fn new(bytes_transferred: u64, declared_size: Option<u64>) -> Self {
        Self {
            bytes_transferred,
            declared_size,
        }
    }

    /// Bytes still expected (0 when the size is unknown).
    pub const fn remaining(&self) -> u64 {
        match self.declared_size {
            Some(size) => size.saturating_sub(self.bytes_transferred),
            None => 0,
        }
    }
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    /// The item id.
    pub id: ItemId,
    /// Where the bytes were written.
    pub staged_path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Declared size from submission or from the source.
    pub declared_size: Option<u64>,
}

/// Run one attempt of a job.
///
/// Returns `Err(DownloadError::Cancelled)` when the token fires, including
/// while waiting out the retry delay.
pub async fn run_job(mut job: DownloadJob, deps: &WorkerDeps) -> DownloadResult<CompletedJob> {
    let result = transfer(&mut job, deps).await;
    let Err(err) = result else {
        return result;
    };

    if let Err(cleanup) = remove_if_exists(&job.staged_path) {
        tracing::warn!(
            target: "mediafetch.download",
            id = %job.id,
            path = %job.staged_path.display(),
            error = %cleanup,
            "Failed to remove staged file"
        );
    }

    if !err.is_cancelled()
        && !deps.retry_delay.is_zero()
        && deps.retry_policy.permits(job.attempt, &err)
    {
        tracing::debug!(
            target: "mediafetch.download",
            id = %job.id,
            delay_ms = deps.retry_delay.as_millis(),
            "Waiting before retry"
        );
        tokio::select! {
            biased;
            () = job.cancel.cancelled() => return Err(DownloadError::Cancelled),
            () = tokio::time::sleep(deps.retry_delay) => {}
        }
    }

    Err(err)
}

async fn transfer(job: &mut DownloadJob, deps: &WorkerDeps) -> DownloadResult<CompletedJob> {
    if let Some(parent) = job.staged_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(&job.staged_path).await?;

    let stream = open_source(job, deps, 0).await?;
    let declared = job.declared_size.or(stream.declared_size);
    let mut reader = stream.reader;
    let mut written: u64 = 0;
    let mut throttle = ProgressThrottle::new(deps.progress_interval);

    job.progress_tx.send_replace(ProgressUpdate::new(0, declared));

    loop {
        if declared.is_some_and(|size| written >= size) {
            break;
        }

        if *job.pause_rx.borrow() {
            reader.close().await;
            file.flush().await?;
            deps.event_emitter.emit(DownloadEvent::Paused {
                id: job.id,
                bytes_transferred: written,
            });
            tracing::info!(
                target: "mediafetch.download",
                id = %job.id,
                offset = written,
                "Transfer paused"
            );

            wait_while_paused(job).await?;

            reader = open_source(job, deps, written).await?.reader;
            deps.event_emitter.emit(DownloadEvent::Resumed {
                id: job.id,
                bytes_transferred: written,
            });
            tracing::info!(
                target: "mediafetch.download",
                id = %job.id,
                offset = written,
                "Transfer resumed"
            );
            throttle.rearm();
            continue;
        }

        let Some(chunk) = next_chunk(job, reader.as_mut()).await? else {
            break;
        };

        let take = declared.map_or(chunk.len(), |size| {
            usize::try_from(size - written).map_or(chunk.len(), |left| left.min(chunk.len()))
        });
        file.write_all(&chunk[..take]).await?;
        written += take as u64;

        job.progress_tx.send_replace(ProgressUpdate::new(written, declared));
        if throttle.admit(written) {
            deps.event_emitter
                .emit(DownloadEvent::progress(job.id, written, declared));
        }
    }

    reader.close().await;
    file.flush().await?;
    drop(file);

    if throttle.admit_final(written) {
        deps.event_emitter
            .emit(DownloadEvent::progress(job.id, written, declared));
    }

    Ok(CompletedJob {
        id: job.id,
        staged_path: job.staged_path.clone(),
        bytes: written,
        declared_size: declared,
    })
}

async fn open_source(
    job: &DownloadJob,
    deps: &WorkerDeps,
    offset: u64,
) -> DownloadResult<SourceStream> {
    tokio::select! {
        biased;
        () = job.cancel.cancelled() => Err(DownloadError::Cancelled),
        opened = deps.source.open(&job.source, offset) => opened,
    }
}

async fn next_chunk(
    job: &DownloadJob,
    reader: &mut dyn SourceReader,
) -> DownloadResult<Option<Bytes>> {
    let read = tokio::select! {
        biased;
        () = job.cancel.cancelled() => Err(DownloadError::Cancelled),
        chunk = reader.read_chunk() => chunk,
    };
    if read.is_err() {
        reader.close().await;
    }
    read
}

/// Block until the pause flag clears or the job is cancelled.
async fn wait_while_paused(job: &mut DownloadJob) -> DownloadResult<()> {
    while *job.pause_rx.borrow_and_update() {
        tokio::select! {
            biased;
            () = job.cancel.cancelled() => return Err(DownloadError::Cancelled),
            changed = job.pause_rx.changed() => {
                if changed.is_err() {
                    return Err(DownloadError::Cancelled);
                }
            }
        }
    }
    Ok(())
}

