//! Local-file source adapter.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use mediafetch_core::{
    DownloadError, DownloadResult, SourceAdapter, SourceReader, SourceRef, SourceStream,
};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::SourceInfo;

const CHUNK_SIZE: usize = 64 * 1024;

/// Path named by a local reference, with any `file://` prefix removed.
pub fn local_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    PathBuf::from(trimmed.strip_prefix("file://").unwrap_or(trimmed))
}

/// Reads files from the local filesystem in 64 KiB chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl FileSource {
    /// Describe a local file. The reference handed to the engine is the
    /// absolute path, so it does not depend on the working directory.
    pub async fn describe(path: &Path) -> DownloadResult<SourceInfo> {
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|err| DownloadError::from_io_error(&err))?;
        let metadata = tokio::fs::metadata(&absolute).await?;
        if !metadata.is_file() {
            return Err(DownloadError::rejected(
                format!("{} is not a regular file", absolute.display()),
                None,
            ));
        }

        let filename = absolute
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DownloadError::rejected(format!("{} has no file name", absolute.display()), None)
            })?;

        Ok(SourceInfo {
            source: SourceRef::new(absolute.to_string_lossy()),
            filename,
            declared_size: Some(metadata.len()),
            mime: None,
            local: true,
        })
    }
}

#[async_trait]
impl SourceAdapter for FileSource {
    async fn open(&self, source: &SourceRef, offset: u64) -> DownloadResult<SourceStream> {
        let path = local_path(source.as_str());
        let mut file = File::open(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => {
                DownloadError::source_expired(format!("{} no longer exists", path.display()))
            }
            _ => DownloadError::from_io_error(&err),
        })?;

        let len = file.metadata().await?.len();
        if offset > len {
            return Err(DownloadError::source_expired(format!(
                "{} shrank to {len} bytes, cannot resume at {offset}",
                path.display()
            )));
        }
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }

        Ok(SourceStream {
            declared_size: Some(len),
            reader: Box::new(FileReader { file: Some(file) }),
        })
    }
}

struct FileReader {
    file: Option<File>,
}

#[async_trait]
impl SourceReader for FileReader {
    async fn read_chunk(&mut self) -> DownloadResult<Option<Bytes>> {
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };

        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        let n = file.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }

    async fn close(&mut self) {
        self.file = None;
    }
}
