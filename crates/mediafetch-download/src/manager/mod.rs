//! Download manager implementation.
//!
//! This module owns the admission path (classification, duplicate checks,
//! the disk guard), the slot accounting, and the worker lifecycle.
//!
//! # Architecture
//!
//! - **Manager**: Orchestrates the registry, leases, and worker lifecycle
//! - **Worker**: Runs one attempt of one item; writes to a `watch::Sender`
//!   and emits the per-item byte events
//!
//! # Concurrency Model
//!
//! - One registry lock guards items, the queue, active jobs and parked items
//! - Admission, promotion and eviction all happen under that lock, so two
//!   disk-guard passes never overlap and the slot count never overshoots
//! - Lease tokens prevent stale finalize commits: cancelling an active item
//!   frees its slot at once, and the worker's late finalize only cleans up
//! - Awaiting the remote player happens outside the lock

mod worker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mediafetch_core::classify::flat_path;
use mediafetch_core::{
    ChosenCategory, DownloadConfig, DownloadError, DownloadEvent, DownloadEventEmitterPort,
    DownloadItem, DownloadRequest, DownloadResult, DownloadState, ItemId, MediaCategory,
    PlayerPort, RetryDecision, RetryPolicy, SoftWarning, SourceAdapter, SpaceProbe,
    StatusSnapshot, classify, classify_as,
};

use crate::disk::{DiskGuard, SpaceVerdict};
use crate::partials::staged_path;
use crate::placement::{place, remove_empty_parents, remove_if_exists};
use crate::queue::DownloadQueue;

pub use worker::{CompletedJob, DownloadJob, ProgressUpdate, WorkerDeps};

/// Lease ID for tracking active downloads.
///
/// Used to prevent stale finalize commits when a download is cancelled
/// or shut down while its worker is still unwinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LeaseId(u64);

/// State for an active (or paused) download.
struct ActiveJob {
    /// Unique lease for this execution.
    lease: LeaseId,
    /// Cancellation token.
    cancel: CancellationToken,
    /// `true` while paused.
    pause_tx: watch::Sender<bool>,
    /// Live byte counts from the worker.
    progress_rx: watch::Receiver<ProgressUpdate>,
    /// Worker task, taken at shutdown.
    handle: Option<JoinHandle<()>>,
}

/// Everything the registry lock guards.
#[derive(Default)]
struct Registry {
    /// Every non-terminal item, in admission order.
    items: IndexMap<ItemId, DownloadItem>,
    /// Items waiting for a slot.
    queue: DownloadQueue,
    /// Items holding a slot.
    active: HashMap<ItemId, ActiveJob>,
    /// Items parked until a category is chosen.
    awaiting: IndexSet<ItemId>,
    /// Set by shutdown; no admissions afterwards.
    closed: bool,
}

impl Registry {
    /// Bytes still expected by every slot holder.
    fn in_flight_remaining(&self) -> u64 {
        self.active
            .values()
            .map(|job| job.progress_rx.borrow().remaining())
            .sum()
    }

    /// Declared size of `id` plus what every slot holder still expects.
    fn projected_size(&self, id: ItemId) -> u64 {
        self.items
            .get(&id)
            .and_then(|item| item.declared_size)
            .unwrap_or(0)
            .saturating_add(self.in_flight_remaining())
    }

    fn verify_and_remove_lease(&mut self, id: ItemId, lease: LeaseId) -> bool {
        if self.active.get(&id).is_some_and(|job| job.lease == lease) {
            self.active.remove(&id);
            true
        } else {
            false
        }
    }

    /// Id of the tracked item that will be written to `destination`.
    fn holder_of(&self, destination: &Path) -> Option<ItemId> {
        self.items
            .values()
            .find(|item| item.destination.as_deref() == Some(destination))
            .map(|item| item.id)
    }
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A slot was free; the transfer started.
    Active(ItemId),
    /// Waiting at the given 1-based position.
    Queued {
        /// New item id.
        id: ItemId,
        /// 1-based queue position.
        position: u32,
    },
    /// Parked until [`DownloadManager::resolve_category`] is called.
    AwaitingCategory(ItemId),
    /// A complete file already sits at the destination; nothing was queued.
    AlreadyPresent {
        /// The existing file.
        path: PathBuf,
    },
    /// An in-flight item already targets the same destination.
    Duplicate {
        /// The tracked item.
        existing: ItemId,
        /// Its state after the submission (a paused duplicate is resumed).
        state: DownloadState,
    },
}

impl SubmitOutcome {
    /// The item id this submission refers to, if any.
    pub const fn id(&self) -> Option<ItemId> {
        match self {
            Self::Active(id) | Self::Queued { id, .. } | Self::AwaitingCategory(id) => Some(*id),
            Self::Duplicate { existing, .. } => Some(*existing),
            Self::AlreadyPresent { .. } => None,
        }
    }
}

/// Dependencies for building a download manager.
pub struct DownloadManagerDeps {
    /// Opens sources.
    pub source: Arc<dyn SourceAdapter>,
    /// Receives every download event.
    pub event_emitter: Arc<dyn DownloadEventEmitterPort>,
    /// Queried after each completion.
    pub player: Arc<dyn PlayerPort>,
    /// Free-space probe for the disk guard.
    pub space_probe: Arc<dyn SpaceProbe>,
    /// Runtime configuration.
    pub config: DownloadConfig,
}

/// Build a download manager from its dependencies.
pub fn build_download_manager(deps: DownloadManagerDeps) -> Arc<DownloadManager> {
    Arc::new(DownloadManager::new(deps))
}

/// Queue manager with bounded concurrency.
pub struct DownloadManager {
    config: DownloadConfig,
    source: Arc<dyn SourceAdapter>,
    event_emitter: Arc<dyn DownloadEventEmitterPort>,
    player: Arc<dyn PlayerPort>,
    disk: DiskGuard,
    retry_policy: RetryPolicy,
    registry: Mutex<Registry>,
    id_counter: AtomicU64,
    lease_counter: AtomicU64,
}

impl DownloadManager {
    fn new(deps: DownloadManagerDeps) -> Self {
        let disk = DiskGuard::from_config(deps.space_probe, &deps.config);
        Self {
            retry_policy: deps.config.retry_policy(),
            config: deps.config,
            source: deps.source,
            event_emitter: deps.event_emitter,
            player: deps.player,
            disk,
            registry: Mutex::new(Registry::default()),
            id_counter: AtomicU64::new(1),
            lease_counter: AtomicU64::new(1),
        }
    }

    /// Runtime configuration.
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// The disk guard used for admission.
    pub const fn disk_guard(&self) -> &DiskGuard {
        &self.disk
    }

    /// Submit a new download.
    ///
    /// # Errors
    ///
    /// Returns `DiskRefused` when the disk guard cannot make room (the
    /// refusal is also emitted as an event), or `Rejected` after shutdown.
    pub async fn submit(self: &Arc<Self>, request: DownloadRequest) -> DownloadResult<SubmitOutcome> {
        let (category, destination) = self.plan_destination(&request.filename, request.category);

        let mut guard = self.registry.lock().await;
        let reg = &mut *guard;
        if reg.closed {
            return Err(DownloadError::rejected("download manager is shut down", None));
        }

        if let Some(destination) = &destination {
            if let Some(outcome) = self.check_existing(reg, destination, request.declared_size) {
                return Ok(outcome);
            }
        }

        let id = ItemId::new(self.id_counter.fetch_add(1, Ordering::Relaxed));
        let mut item = DownloadItem::new(id, &request);
        item.category = category;
        item.destination = destination;

        if item.destination.is_none() {
            tracing::info!(
                target: "mediafetch.download",
                %id,
                filename = %item.filename,
                "Category undetermined, awaiting choice"
            );
            self.event_emitter.emit(DownloadEvent::AwaitingCategory {
                id,
                filename: item.filename.clone(),
            });
            reg.items.insert(id, item);
            reg.awaiting.insert(id);
            return Ok(SubmitOutcome::AwaitingCategory(id));
        }

        tracing::debug!(
            target: "mediafetch.download",
            %id,
            filename = %item.filename,
            category = %item.category,
            "Download submitted"
        );
        reg.items.insert(id, item);
        self.admit(reg, id).await
    }

    /// Supply the category for a parked item and admit it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, `InvalidState` for items that are
    /// not awaiting a category, and `DiskRefused` as for [`Self::submit`].
    pub async fn resolve_category(
        self: &Arc<Self>,
        id: ItemId,
        choice: ChosenCategory,
    ) -> DownloadResult<SubmitOutcome> {
        let mut guard = self.registry.lock().await;
        let reg = &mut *guard;

        if !reg.awaiting.contains(&id) {
            return Err(match reg.items.get(&id) {
                Some(item) => DownloadError::invalid_state(id, item.state, "resolve the category of"),
                None => DownloadError::not_found(id),
            });
        }
        let Some((filename, declared)) = reg
            .items
            .get(&id)
            .map(|item| (item.filename.clone(), item.declared_size))
        else {
            reg.awaiting.shift_remove(&id);
            return Err(DownloadError::not_found(id));
        };

        let (category, destination) = self.plan_destination(&filename, Some(choice));
        reg.awaiting.shift_remove(&id);

        if let Some(destination) = &destination {
            if let Some(outcome) = self.check_existing(reg, destination, declared) {
                reg.items.shift_remove(&id);
                return Ok(outcome);
            }
        }

        if let Some(item) = reg.items.get_mut(&id) {
            item.category = category;
            item.destination = destination;
        }
        tracing::info!(
            target: "mediafetch.download",
            %id,
            %category,
            "Category chosen"
        );
        self.admit(reg, id).await
    }

    /// Pause an active download at the next chunk boundary.
    ///
    /// The slot stays occupied while paused.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids and `InvalidState` unless Active.
    pub async fn pause(&self, id: ItemId) -> DownloadResult<()> {
        let mut guard = self.registry.lock().await;
        let reg = &mut *guard;
        let item = reg.items.get_mut(&id).ok_or_else(|| DownloadError::not_found(id))?;
        let state = item.state;
        match reg.active.get(&id) {
            Some(job) if state == DownloadState::Active => {
                item.transition(DownloadState::Paused)
                    .map_err(|_| DownloadError::invalid_state(id, state, "pause"))?;
                job.pause_tx.send_replace(true);
                tracing::info!(target: "mediafetch.download", %id, "Pause requested");
                Ok(())
            }
            _ => Err(DownloadError::invalid_state(id, state, "pause")),
        }
    }

    /// Resume a paused download from its paused offset.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids and `InvalidState` unless Paused.
    pub async fn resume(&self, id: ItemId) -> DownloadResult<()> {
        let mut guard = self.registry.lock().await;
        Self::resume_locked(&mut guard, id)
    }

    fn resume_locked(reg: &mut Registry, id: ItemId) -> DownloadResult<()> {
        let item = reg.items.get_mut(&id).ok_or_else(|| DownloadError::not_found(id))?;
        let state = item.state;
        match reg.active.get(&id) {
            Some(job) if state == DownloadState::Paused => {
                item.transition(DownloadState::Active)
                    .map_err(|_| DownloadError::invalid_state(id, state, "resume"))?;
                job.pause_tx.send_replace(false);
                tracing::info!(target: "mediafetch.download", %id, "Resume requested");
                Ok(())
            }
            _ => Err(DownloadError::invalid_state(id, state, "resume")),
        }
    }

    /// Cancel a download in any non-terminal state.
    ///
    /// An active item's slot is released immediately; its worker deletes
    /// the staged file and the `Cancelled` event follows once it has.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is not tracked.
    pub async fn cancel(self: &Arc<Self>, id: ItemId) -> DownloadResult<()> {
        let mut guard = self.registry.lock().await;
        let reg = &mut *guard;

        if let Some(job) = reg.active.remove(&id) {
            job.cancel.cancel();
            reg.items.shift_remove(&id);
            tracing::info!(target: "mediafetch.download", %id, "Cancelling active download");
            self.promote(reg).await;
            return Ok(());
        }

        if reg.queue.remove(id) || reg.awaiting.shift_remove(&id) {
            reg.items.shift_remove(&id);
            tracing::info!(target: "mediafetch.download", %id, "Download cancelled");
            self.event_emitter.emit(DownloadEvent::Cancelled { id });
            return Ok(());
        }

        Err(DownloadError::not_found(id))
    }

    /// Point-in-time view of every tracked item.
    pub async fn status(&self) -> StatusSnapshot {
        let reg = self.registry.lock().await;

        let active = reg
            .items
            .values()
            .filter(|item| item.state.occupies_slot())
            .map(|item| match reg.active.get(&item.id) {
                Some(job) => {
                    let live = *job.progress_rx.borrow();
                    let mut item = item.clone();
                    item.bytes_transferred = live.bytes_transferred;
                    item.declared_size = item.declared_size.or(live.declared_size);
                    item.summary(None)
                }
                None => item.summary(None),
            })
            .collect();

        let queued = reg
            .queue
            .iter()
            .filter_map(|(position, id)| reg.items.get(&id).map(|item| item.summary(Some(position))))
            .collect();

        let awaiting_category = reg
            .awaiting
            .iter()
            .filter_map(|id| reg.items.get(id).map(|item| item.summary(None)))
            .collect();

        StatusSnapshot {
            active,
            queued,
            awaiting_category,
            max_concurrent: self.config.max_concurrent,
        }
    }

    /// Stop accepting work, cancel everything, and wait for workers to exit.
    ///
    /// When this returns no staged file of this run remains.
    pub async fn shutdown(&self) {
        let handles = {
            let mut guard = self.registry.lock().await;
            let reg = &mut *guard;
            reg.closed = true;

            let mut handles = Vec::with_capacity(reg.active.len());
            for (_, mut job) in reg.active.drain() {
                job.cancel.cancel();
                handles.extend(job.handle.take());
            }
            for id in reg.queue.drain() {
                self.event_emitter.emit(DownloadEvent::Cancelled { id });
            }
            for id in reg.awaiting.drain(..) {
                self.event_emitter.emit(DownloadEvent::Cancelled { id });
            }
            reg.items.clear();
            handles
        };

        tracing::info!(
            target: "mediafetch.download",
            workers = handles.len(),
            "Shutting down download manager"
        );
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(target: "mediafetch.download", error = %e, "Worker task ended abnormally");
            }
        }

        let _guard = self.registry.lock().await;
        self.prune_staging();
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Category and final path for a filename, or no path when the item has
    /// to wait for a category choice.
    fn plan_destination(
        &self,
        filename: &str,
        choice: Option<ChosenCategory>,
    ) -> (MediaCategory, Option<PathBuf>) {
        let root = &self.config.storage_root;
        if !self.config.organize {
            let category = choice.map_or_else(|| classify(filename).category, MediaCategory::from);
            return (category, Some(root.join(flat_path(filename))));
        }

        let classification = match choice {
            Some(choice) => classify_as(filename, choice),
            None => classify(filename),
        };
        (classification.category, classification.destination(root))
    }

    /// Duplicate and already-on-disk checks for a resolved destination.
    fn check_existing(
        &self,
        reg: &mut Registry,
        destination: &Path,
        declared: Option<u64>,
    ) -> Option<SubmitOutcome> {
        if let Some(existing) = reg.holder_of(destination) {
            let state = reg.items.get(&existing).map(|item| item.state)?;
            if state == DownloadState::Paused && Self::resume_locked(reg, existing).is_ok() {
                return Some(SubmitOutcome::Duplicate {
                    existing,
                    state: DownloadState::Active,
                });
            }
            tracing::info!(
                target: "mediafetch.download",
                id = %existing,
                %state,
                "Duplicate submission"
            );
            return Some(SubmitOutcome::Duplicate { existing, state });
        }

        let size = std::fs::metadata(destination)
            .ok()
            .filter(std::fs::Metadata::is_file)?
            .len();
        if declared.is_none_or(|declared| self.config.meets_completeness(size, declared)) {
            tracing::info!(
                target: "mediafetch.download",
                path = %destination.display(),
                size,
                "File already present"
            );
            return Some(SubmitOutcome::AlreadyPresent {
                path: destination.to_path_buf(),
            });
        }

        tracing::warn!(
            target: "mediafetch.download",
            path = %destination.display(),
            size,
            ?declared,
            "Existing file is incomplete, replacing it"
        );
        if let Err(e) = remove_if_exists(destination) {
            tracing::warn!(
                target: "mediafetch.download",
                path = %destination.display(),
                error = %e,
                "Could not remove incomplete file"
            );
        }
        None
    }

    /// Run the disk guard for `id` and start or queue it.
    async fn admit(
        self: &Arc<Self>,
        reg: &mut Registry,
        id: ItemId,
    ) -> DownloadResult<SubmitOutcome> {
        if let Err(err) = self.check_space(id, reg.projected_size(id)).await {
            reg.items.shift_remove(&id);
            return Err(err);
        }

        if reg.queue.is_empty() && reg.active.len() < self.max_concurrent() {
            self.start(reg, id)?;
            return Ok(SubmitOutcome::Active(id));
        }

        let position = reg.queue.push(id);
        tracing::info!(target: "mediafetch.download", %id, position, "Download queued");
        self.event_emitter.emit(DownloadEvent::queued(id, position));
        Ok(SubmitOutcome::Queued { id, position })
    }

    /// Disk-guard pass for one item, emitting `DiskRefused` or a low-space
    /// warning as appropriate.
    ///
    /// The walk and the deletions run on the blocking pool; callers hold the
    /// registry lock across the await so no two passes overlap.
    async fn check_space(&self, id: ItemId, projected: u64) -> DownloadResult<()> {
        let disk = self.disk.clone();
        let verdict = tokio::task::spawn_blocking(move || disk.ensure_space(projected))
            .await
            .unwrap_or_else(|e| Err(DownloadError::other(format!("disk check task failed: {e}"))));

        match verdict {
            Ok(SpaceVerdict::Ok {
                free_bytes,
                evicted,
            }) => {
                if !evicted.is_empty() {
                    tracing::info!(
                        target: "mediafetch.download",
                        %id,
                        evicted = evicted.len(),
                        free_bytes,
                        "Made room by evicting old files"
                    );
                }
                self.warn_if_low(Some(id), free_bytes);
                Ok(())
            }
            Ok(SpaceVerdict::Refused {
                free_bytes,
                required_bytes,
            }) => {
                tracing::warn!(
                    target: "mediafetch.download",
                    %id,
                    free_bytes,
                    required_bytes,
                    "Not enough disk space, download refused"
                );
                self.event_emitter
                    .emit(DownloadEvent::disk_refused(id, free_bytes, required_bytes));
                Err(DownloadError::disk_refused(free_bytes, required_bytes))
            }
            Err(err) => {
                tracing::warn!(
                    target: "mediafetch.download",
                    %id,
                    error = %err,
                    "Free-space probe failed"
                );
                self.event_emitter
                    .emit(DownloadEvent::failed(id, err.user_message(), err.class(), 0));
                Err(err)
            }
        }
    }

    fn warn_if_low(&self, id: Option<ItemId>, free_bytes: u64) {
        if let Some(warning) = self.disk.low_space_warning(free_bytes) {
            tracing::warn!(
                target: "mediafetch.download",
                free_bytes,
                threshold_bytes = self.disk.warning_bytes(),
                "Disk space is running low"
            );
            self.event_emitter
                .emit(DownloadEvent::SoftWarning { id, warning });
        }
    }

    fn max_concurrent(&self) -> usize {
        usize::try_from(self.config.max_concurrent).unwrap_or(usize::MAX)
    }

    // =========================================================================
    // Worker lifecycle
    // =========================================================================

    /// Move `id` into a slot and spawn its worker.
    fn start(self: &Arc<Self>, reg: &mut Registry, id: ItemId) -> DownloadResult<()> {
        let item = reg.items.get_mut(&id).ok_or_else(|| DownloadError::not_found(id))?;
        let state = item.state;
        item.transition(DownloadState::Active)
            .map_err(|_| DownloadError::invalid_state(id, state, "start"))?;
        item.attempt += 1;
        item.bytes_transferred = 0;

        let lease = LeaseId(self.lease_counter.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let (pause_tx, pause_rx) = watch::channel(false);
        let (progress_tx, progress_rx) = watch::channel(ProgressUpdate::new(0, item.declared_size));

        let job = DownloadJob {
            id,
            source: item.source.clone(),
            declared_size: item.declared_size,
            attempt: item.attempt,
            staged_path: staged_path(
                &self.config.staging_dir(),
                id,
                &item.filename,
                item.declared_size,
            ),
            cancel: cancel.clone(),
            pause_rx,
            progress_tx,
        };

        tracing::info!(
            target: "mediafetch.download",
            %id,
            attempt = item.attempt,
            filename = %item.filename,
            "Download started"
        );
        self.event_emitter
            .emit(DownloadEvent::started(id, item.attempt));

        let manager = Arc::clone(self);
        let deps = self.worker_deps();
        let handle = tokio::spawn(async move {
            let result = worker::run_job(job, &deps).await;
            manager.finalize_job(id, lease, result).await;
        });

        reg.active.insert(
            id,
            ActiveJob {
                lease,
                cancel,
                pause_tx,
                progress_rx,
                handle: Some(handle),
            },
        );
        Ok(())
    }

    fn worker_deps(&self) -> WorkerDeps {
        WorkerDeps {
            source: Arc::clone(&self.source),
            event_emitter: Arc::clone(&self.event_emitter),
            progress_interval: self.config.progress_interval,
            retry_delay: self.config.retry_delay,
            retry_policy: self.retry_policy,
        }
    }

    /// Fill free slots from the head of the queue.
    ///
    /// Every promotion re-runs the disk guard; a refused item is dropped
    /// and the next one is tried.
    async fn promote(self: &Arc<Self>, reg: &mut Registry) {
        while !reg.closed && reg.active.len() < self.max_concurrent() {
            let Some(id) = reg.queue.pop() else {
                break;
            };
            if !reg.items.contains_key(&id) {
                continue;
            }
            if self.check_space(id, reg.projected_size(id)).await.is_err() {
                reg.items.shift_remove(&id);
                continue;
            }
            if let Err(err) = self.start(reg, id) {
                tracing::warn!(
                    target: "mediafetch.download",
                    %id,
                    error = %err,
                    "Could not start queued download"
                );
                reg.items.shift_remove(&id);
            }
        }
    }

    /// Finalize a job after its worker returns.
    ///
    /// Verifies the lease to prevent stale commits.
    async fn finalize_job(
        self: &Arc<Self>,
        id: ItemId,
        lease: LeaseId,
        result: DownloadResult<CompletedJob>,
    ) {
        let mut guard = self.registry.lock().await;
        let reg = &mut *guard;

        if !reg.verify_and_remove_lease(id, lease) {
            drop(guard);
            tracing::debug!(target: "mediafetch.download", %id, "Ignoring stale finalize (lease mismatch)");
            if let Ok(completed) = result {
                self.discard_staged(&completed.staged_path);
            }
            self.event_emitter.emit(DownloadEvent::Cancelled { id });
            return;
        }

        match result {
            Ok(completed) => {
                let item = reg.items.shift_remove(&id);
                self.promote(reg).await;
                drop(guard);
                match item {
                    Some(item) => self.handle_success(item, completed).await,
                    None => self.discard_staged(&completed.staged_path),
                }
            }
            Err(err) if err.is_cancelled() => {
                reg.items.shift_remove(&id);
                self.promote(reg).await;
                drop(guard);
                tracing::info!(target: "mediafetch.download", %id, "Download cancelled");
                self.event_emitter.emit(DownloadEvent::Cancelled { id });
            }
            Err(err) => {
                self.handle_failure(reg, id, &err);
                self.promote(reg).await;
            }
        }
    }

    async fn handle_success(&self, mut item: DownloadItem, completed: CompletedJob) {
        let id = item.id;
        item.bytes_transferred = completed.bytes;
        item.declared_size = item.declared_size.or(completed.declared_size);

        if let Some(declared) = item.declared_size {
            if self.config.deviates(completed.bytes, declared) {
                tracing::warn!(
                    target: "mediafetch.download",
                    %id,
                    declared,
                    actual = completed.bytes,
                    "Downloaded size differs from declared size"
                );
                self.event_emitter.emit(DownloadEvent::SoftWarning {
                    id: Some(id),
                    warning: SoftWarning::SizeMismatch {
                        declared,
                        actual: completed.bytes,
                    },
                });
            }
        }

        let placed = match item.destination.clone() {
            Some(destination) => {
                let staged = completed.staged_path.clone();
                tokio::task::spawn_blocking(move || place(&staged, &destination))
                    .await
                    .unwrap_or_else(|e| {
                        Err(DownloadError::other(format!("placement task failed: {e}")))
                    })
            }
            None => Err(DownloadError::other("no destination for completed download")),
        };

        let path = match placed {
            Ok(path) => path,
            Err(err) => {
                self.discard_staged(&completed.staged_path);
                tracing::warn!(target: "mediafetch.download", %id, error = %err, "Could not place file");
                self.event_emitter.emit(DownloadEvent::failed(
                    id,
                    err.user_message(),
                    err.class(),
                    item.attempt,
                ));
                return;
            }
        };

        if let Err(e) = item.transition(DownloadState::Completed) {
            tracing::debug!(target: "mediafetch.download", %id, error = %e, "Unexpected state at completion");
        }
        tracing::info!(
            target: "mediafetch.download",
            %id,
            path = %path.display(),
            bytes = completed.bytes,
            "Download completed"
        );
        self.event_emitter.emit(DownloadEvent::Completed {
            id,
            path: path.clone(),
            category: item.category,
            bytes: completed.bytes,
        });

        let already_playing = self.player.is_playing().await;
        self.event_emitter.emit(DownloadEvent::ReadyToPlay {
            id,
            path,
            category: item.category,
            already_playing,
        });
    }

    fn handle_failure(&self, reg: &mut Registry, id: ItemId, err: &DownloadError) {
        let Some(item) = reg.items.get_mut(&id) else {
            return;
        };
        item.last_error = Some(err.user_message());
        item.bytes_transferred = 0;
        if let Err(e) = item.transition(DownloadState::Failed) {
            tracing::debug!(target: "mediafetch.download", %id, error = %e, "Unexpected state at failure");
        }

        match self.retry_policy.decide(item, err) {
            RetryDecision::Retry { next_attempt } => {
                if let Err(e) = item.transition(DownloadState::Queued) {
                    tracing::debug!(target: "mediafetch.download", %id, error = %e, "Unexpected state at retry");
                }
                let position = reg.queue.push(id);
                tracing::warn!(
                    target: "mediafetch.download",
                    %id,
                    next_attempt,
                    position,
                    error = %err,
                    "Transient failure, download re-queued"
                );
                self.event_emitter.emit(DownloadEvent::queued(id, position));
            }
            RetryDecision::GiveUp => {
                let attempts = item.attempt;
                reg.items.shift_remove(&id);
                tracing::warn!(
                    target: "mediafetch.download",
                    %id,
                    attempts,
                    class = err.class().as_str(),
                    error = %err,
                    "Download failed"
                );
                self.event_emitter.emit(DownloadEvent::failed(
                    id,
                    err.user_message(),
                    err.class(),
                    attempts,
                ));
            }
        }
    }

    fn discard_staged(&self, path: &Path) {
        if let Err(e) = remove_if_exists(path) {
            tracing::warn!(
                target: "mediafetch.download",
                path = %path.display(),
                error = %e,
                "Failed to remove staged file"
            );
        }
    }

    /// Drop the staging directory if it is empty.
    ///
    /// Only called once the manager is closed: a running worker creates its
    /// staged file after `create_dir_all` without holding the registry lock.
    fn prune_staging(&self) {
        remove_empty_parents(&self.config.staging_dir(), &self.config.storage_root);
    }
}
