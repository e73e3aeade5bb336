//! Source adapter port.
//!
//! A source adapter resolves a [`SourceRef`] into a readable byte stream.
//! The engine reads it chunk by chunk; pausing or cancelling closes the
//! reader and never reads from it again. Resuming opens a fresh reader at
//! the paused offset.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::download::{DownloadResult, SourceRef};

/// An open byte stream for one source.
#[async_trait]
pub trait SourceReader: Send {
    /// Next chunk of bytes, or `None` at end of stream.
    async fn read_chunk(&mut self) -> DownloadResult<Option<Bytes>>;

    /// Release the underlying handle. No reads follow a close.
    async fn close(&mut self) {}
}

/// Result of opening a source.
pub struct SourceStream {
    /// Total size as reported by the source; advisory only.
    pub declared_size: Option<u64>,
    /// Reader positioned at the requested offset.
    pub reader: Box<dyn SourceReader>,
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStream")
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}

/// Port for opening remote items.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Open `source` positioned at byte `offset`.
    ///
    /// `offset` is non-zero only when resuming a paused item. Adapters that
    /// can no longer serve the source from that offset return
    /// [`crate::DownloadError::SourceExpired`].
    async fn open(&self, source: &SourceRef, offset: u64) -> DownloadResult<SourceStream>;
}
