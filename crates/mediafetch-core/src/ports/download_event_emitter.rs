//! Download event emitter port.
//!
//! This port abstracts download event emission, allowing the download manager
//! to emit events without coupling to the consumer (terminal UI, chat bot,
//! remote player bridge).

use tokio::sync::mpsc;

use crate::download::DownloadEvent;

/// Port for emitting download events.
///
/// Implementations handle the actual event delivery. Emission is
/// fire-and-forget: an event that cannot be delivered right away is dropped.
pub trait DownloadEventEmitterPort: Send + Sync {
    /// Emit a download event.
    ///
    /// This method must not block.
    fn emit(&self, event: DownloadEvent);

    /// Clone this emitter into a boxed trait object.
    ///
    /// This enables cloning of `Arc<dyn DownloadEventEmitterPort>` without
    /// requiring the underlying type to implement Clone.
    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort>;
}

/// A no-op download event emitter for tests and headless contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopDownloadEmitter;

impl NoopDownloadEmitter {
    /// Create a new no-op download emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DownloadEventEmitterPort for NoopDownloadEmitter {
    fn emit(&self, _event: DownloadEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}

/// Emitter backed by a bounded channel.
///
/// Uses `try_send`, so a full or closed channel drops the event instead of
/// stalling the transfer.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::Sender<DownloadEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver consuming its events.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DownloadEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl DownloadEventEmitterPort for ChannelEmitter {
    fn emit(&self, event: DownloadEvent) {
        if let Err(err) = self.tx.try_send(event) {
            let reason = match &err {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            let event = err.into_inner();
            tracing::trace!(
                event = event.event_name(),
                id = ?event.id(),
                reason,
                "Dropped download event"
            );
        }
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}
