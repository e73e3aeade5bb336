//! Shared fakes for the download manager integration tests.
//!
//! - `ScriptedSource` serves synthetic bytes per source name, with optional
//!   open failures, mid-stream failures, and a gate that blocks reads
//! - `FixedProbe` reports a settable amount of free space
//! - `Harness` wires a manager to a channel emitter and collects events

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mockall::mock;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

use mediafetch_core::{
    ChannelEmitter, DownloadConfig, DownloadError, DownloadEvent, DownloadRequest, DownloadResult,
    ItemId, NoopPlayer, PlayerPort, SourceAdapter, SourceReader, SourceRef, SourceStream,
    SpaceProbe,
};
use mediafetch_download::{DownloadManager, DownloadManagerDeps, build_download_manager};

mock! {
    pub Player {}

    #[async_trait]
    impl PlayerPort for Player {
        async fn is_playing(&self) -> bool;
    }
}

/// One scripted open of a source.
#[derive(Clone, Debug)]
pub enum Plan {
    /// Serve `size` bytes in `chunk`-sized pieces.
    Serve { size: u64, chunk: usize },
    /// Serve `size` bytes but fail once `after` bytes have been read.
    FailAfter {
        size: u64,
        chunk: usize,
        after: u64,
        error: DownloadError,
    },
    /// Fail the open itself.
    OpenError(DownloadError),
}

/// Source adapter driven by per-name plans.
///
/// Each open pops the next plan for the name; the last plan is reused for
/// every further open. Reads block while the gate is closed.
pub struct ScriptedSource {
    plans: Mutex<HashMap<String, VecDeque<Plan>>>,
    opens: Mutex<Vec<(String, u64)>>,
    gate: watch::Sender<bool>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            plans: Mutex::new(HashMap::new()),
            opens: Mutex::new(Vec::new()),
            gate,
        })
    }

    /// Queue plans for a source name.
    pub fn script(&self, name: &str, plans: impl IntoIterator<Item = Plan>) {
        self.plans
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .extend(plans);
    }

    /// Block every read until [`Self::open_gate`].
    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// Every `(name, offset)` passed to `open`, in call order.
    pub fn opens(&self) -> Vec<(String, u64)> {
        self.opens.lock().unwrap().clone()
    }

    fn next_plan(&self, name: &str) -> Option<Plan> {
        let mut plans = self.plans.lock().unwrap();
        let queue = plans.get_mut(name)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    async fn open(&self, source: &SourceRef, offset: u64) -> DownloadResult<SourceStream> {
        let name = source.as_str().to_string();
        self.opens.lock().unwrap().push((name.clone(), offset));

        let plan = self
            .next_plan(&name)
            .ok_or_else(|| DownloadError::source_expired(format!("unknown source {name}")))?;
        let (size, chunk, fail) = match plan {
            Plan::Serve { size, chunk } => (size, chunk, None),
            Plan::FailAfter {
                size,
                chunk,
                after,
                error,
            } => (size, chunk, Some((after, error))),
            Plan::OpenError(error) => return Err(error),
        };

        Ok(SourceStream {
            declared_size: Some(size),
            reader: Box::new(ScriptedReader {
                position: offset,
                size,
                chunk,
                fail,
                gate: self.gate.subscribe(),
            }),
        })
    }
}

struct ScriptedReader {
    position: u64,
    size: u64,
    chunk: usize,
    fail: Option<(u64, DownloadError)>,
    gate: watch::Receiver<bool>,
}

#[async_trait]
impl SourceReader for ScriptedReader {
    async fn read_chunk(&mut self) -> DownloadResult<Option<Bytes>> {
        let gate_alive = self.gate.wait_for(|open| *open).await.is_ok();
        if !gate_alive {
            return Err(DownloadError::connection_lost("gate dropped"));
        }
        if let Some((after, error)) = &self.fail {
            if self.position >= *after {
                return Err(error.clone());
            }
        }
        if self.position >= self.size {
            return Ok(None);
        }
        let n = (self.chunk as u64).min(self.size - self.position);
        self.position += n;
        Ok(Some(Bytes::from(vec![b'x'; n as usize])))
    }
}

/// Probe returning a settable free-byte count.
pub struct FixedProbe(AtomicU64);

impl FixedProbe {
    pub fn new(free_bytes: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(free_bytes)))
    }
}

impl SpaceProbe for FixedProbe {
    fn free_bytes(&self, _root: &std::path::Path) -> DownloadResult<u64> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}

/// Manager under test plus everything it emitted.
pub struct Harness {
    pub dir: TempDir,
    pub manager: Arc<DownloadManager>,
    pub source: Arc<ScriptedSource>,
    pub events: Vec<DownloadEvent>,
    rx: mpsc::Receiver<DownloadEvent>,
}

/// Test configuration: no disk floor, no delays.
pub fn test_config(dir: &TempDir) -> DownloadConfig {
    DownloadConfig::default()
        .with_storage_root(dir.path())
        .with_disk_thresholds(0, 0)
        .with_retry_delay(Duration::ZERO)
        .with_progress_interval(Duration::ZERO)
}

impl Harness {
    pub fn new(configure: impl FnOnce(DownloadConfig) -> DownloadConfig) -> Self {
        Self::with_parts(configure, FixedProbe::new(u64::MAX / 2), Arc::new(NoopPlayer))
    }

    pub fn with_parts(
        configure: impl FnOnce(DownloadConfig) -> DownloadConfig,
        probe: Arc<dyn SpaceProbe>,
        player: Arc<dyn PlayerPort>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let config = configure(test_config(&dir));
        let source = ScriptedSource::new();
        let (emitter, rx) = ChannelEmitter::new(4096);
        let manager = build_download_manager(DownloadManagerDeps {
            source: source.clone(),
            event_emitter: Arc::new(emitter),
            player,
            space_probe: probe,
            config,
        });
        Self {
            dir,
            manager,
            source,
            events: Vec::new(),
            rx,
        }
    }

    /// Script a plain transfer and build the matching request.
    pub fn request(&self, filename: &str, size: u64) -> DownloadRequest {
        self.source.script(filename, [Plan::Serve { size, chunk: 64 }]);
        DownloadRequest::new(SourceRef::new(filename), filename).with_declared_size(Some(size))
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Receive events until one matches, keeping all of them in `events`.
    pub async fn wait_for(&mut self, pred: impl Fn(&DownloadEvent) -> bool) -> DownloadEvent {
        let found = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let event = self.rx.recv().await.expect("emitter dropped");
                self.events.push(event.clone());
                if pred(&event) {
                    return event;
                }
            }
        })
        .await;
        found.unwrap_or_else(|_| panic!("timed out; events so far: {:#?}", self.events))
    }

    /// Wait for the terminal event of `id` (`ReadyToPlay`, `Cancelled`,
    /// `Failed` or `DiskRefused`).
    ///
    /// Already-recorded events are checked first, so finals can be awaited
    /// in any order.
    pub async fn wait_final(&mut self, id: ItemId) -> DownloadEvent {
        let is_final = |e: &DownloadEvent| e.id() == Some(id) && e.is_final();
        if let Some(event) = self.events.iter().find(|e| is_final(e)) {
            return event.clone();
        }
        self.wait_for(is_final).await
    }

    /// Wait until the worker for `name` has opened its source `opens` times.
    ///
    /// Tests run on a current-thread runtime, so once the open is recorded
    /// the worker has run on to its next read.
    pub async fn wait_for_opens(&self, name: &str, opens: usize) {
        let reached = tokio::time::timeout(Duration::from_secs(10), async {
            while self.source.opens().iter().filter(|(n, _)| n == name).count() < opens {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(reached.is_ok(), "{name} was never opened {opens} time(s)");
    }

    /// Events recorded so far for one item.
    pub fn events_for(&self, id: ItemId) -> Vec<&DownloadEvent> {
        self.events.iter().filter(|e| e.id() == Some(id)).collect()
    }

    /// Names of the events recorded so far for one item, `Progress` omitted.
    pub fn names_for(&self, id: ItemId) -> Vec<&'static str> {
        self.events_for(id)
            .into_iter()
            .filter(|e| !matches!(e, DownloadEvent::Progress { .. }))
            .map(DownloadEvent::event_name)
            .collect()
    }
}

/// A filename the classifier files as a movie, unique per `n`.
pub fn movie(n: u32) -> String {
    format!("Film.{}.1080p.mkv", 1990 + n)
}
