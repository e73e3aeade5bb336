//! Source adapters for the CLI.
//!
//! `http://` and `https://` references go to [`HttpSource`]; anything else
//! is treated as a local path (an optional `file://` prefix is stripped).

mod file;
mod http;

use async_trait::async_trait;
use mediafetch_core::{DownloadResult, SourceAdapter, SourceRef, SourceStream};

pub use file::{FileSource, local_path};
pub use http::{HttpSource, content_range_total, disposition_filename, status_error};

/// What is known about a source before it is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Reference handed to the engine.
    pub source: SourceRef,
    /// Filename used for classification and placement.
    pub filename: String,
    /// Size reported by the source, if any.
    pub declared_size: Option<u64>,
    /// MIME type reported by the source, if any.
    pub mime: Option<String>,
    /// Whether the source is a local file.
    pub local: bool,
}

/// Whether a raw reference names a remote (http/https) source.
pub fn is_remote(raw: &str) -> bool {
    let lower = raw.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Routes each source to the matching adapter.
#[derive(Debug, Clone)]
pub struct CliSource {
    http: HttpSource,
    file: FileSource,
}

impl CliSource {
    /// Create the router with a fresh HTTP client.
    pub fn new() -> DownloadResult<Self> {
        Ok(Self {
            http: HttpSource::new()?,
            file: FileSource,
        })
    }

    /// Look up filename, size and type without transferring the body.
    pub async fn describe(&self, raw: &str) -> DownloadResult<SourceInfo> {
        if is_remote(raw) {
            self.http.describe(raw.trim()).await
        } else {
            FileSource::describe(&local_path(raw)).await
        }
    }
}

#[async_trait]
impl SourceAdapter for CliSource {
    async fn open(&self, source: &SourceRef, offset: u64) -> DownloadResult<SourceStream> {
        if is_remote(source.as_str()) {
            self.http.open(source, offset).await
        } else {
            self.file.open(source, offset).await
        }
    }
}
