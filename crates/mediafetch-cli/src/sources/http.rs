//! HTTP(S) source adapter.
//!
//! Bodies are streamed with `reqwest`. Resuming at a non-zero offset sends
//! `Range: bytes=<offset>-` and requires a `206 Partial Content` reply; a
//! server that answers with the full body has lost the session, which is
//! reported as an expired source.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use mediafetch_core::{
    DownloadError, DownloadResult, SourceAdapter, SourceReader, SourceRef, SourceStream,
};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, RANGE};
use reqwest::{Client, StatusCode, Url};

use super::SourceInfo;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const FALLBACK_FILENAME: &str = "download";

/// Streams remote files over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    read_timeout: Duration,
}

impl HttpSource {
    /// Create a source with default timeouts.
    pub fn new() -> DownloadResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("mediafetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| DownloadError::other(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            read_timeout: READ_TIMEOUT,
        })
    }

    /// Ask the server for name, size and type with a `HEAD` request.
    ///
    /// Servers that refuse `HEAD` still get submitted: the filename then
    /// comes from the URL and the size from the first `GET`.
    pub async fn describe(&self, url: &str) -> DownloadResult<SourceInfo> {
        let parsed = Url::parse(url)
            .map_err(|err| DownloadError::rejected(format!("invalid URL {url}: {err}"), None))?;
        let url_name = filename_from_url(&parsed);

        let mut info = SourceInfo {
            source: SourceRef::new(url),
            filename: url_name,
            declared_size: None,
            mime: None,
            local: false,
        };

        let response = match self.client.head(parsed).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(url, error = %err, "HEAD request failed, describing from URL");
                return Ok(info);
            }
        };
        if let Some(err) = status_error(response.status(), url, 0) {
            if !err.is_transient() && response.status() != StatusCode::METHOD_NOT_ALLOWED {
                return Err(err);
            }
            tracing::debug!(url, status = %response.status(), "HEAD not usable, describing from URL");
            return Ok(info);
        }

        let headers = response.headers();
        if let Some(name) = header_str(headers, CONTENT_DISPOSITION).and_then(disposition_filename) {
            info.filename = name;
        }
        info.declared_size = response.content_length().filter(|len| *len > 0);
        info.mime = header_str(headers, CONTENT_TYPE).map(str::to_string);
        Ok(info)
    }
}

#[async_trait]
impl SourceAdapter for HttpSource {
    async fn open(&self, source: &SourceRef, offset: u64) -> DownloadResult<SourceStream> {
        let url = source.as_str();
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = request.send().await.map_err(|err| map_reqwest_error(&err))?;
        let status = response.status();
        if let Some(err) = status_error(status, url, offset) {
            return Err(err);
        }

        let declared_size = if offset == 0 {
            response.content_length()
        } else if status == StatusCode::PARTIAL_CONTENT {
            content_range_total(response.headers())
        } else {
            return Err(DownloadError::source_expired(format!(
                "{url} ignored the range request (status {status})"
            )));
        };

        tracing::debug!(url, offset, %status, ?declared_size, "Opened HTTP source");
        Ok(SourceStream {
            declared_size,
            reader: Box::new(HttpReader {
                stream: Some(response.bytes_stream().boxed()),
                read_timeout: self.read_timeout,
            }),
        })
    }
}

struct HttpReader {
    stream: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    read_timeout: Duration,
}

#[async_trait]
impl SourceReader for HttpReader {
    async fn read_chunk(&mut self) -> DownloadResult<Option<Bytes>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match tokio::time::timeout(self.read_timeout, stream.next()).await {
            Err(_) => Err(DownloadError::timeout(format!(
                "no data for {}s",
                self.read_timeout.as_secs()
            ))),
            Ok(None) => Ok(None),
            Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
            Ok(Some(Err(err))) => Err(map_reqwest_error(&err)),
        }
    }

    async fn close(&mut self) {
        // Dropping the body releases the connection.
        self.stream = None;
    }
}

/// Error for a non-success status, `None` when the response is usable.
///
/// 408, 429 and 5xx are transient; 401 and 403 are permission failures;
/// 404, 410 and (when resuming) 416 mean the source is gone; other 4xx
/// are explicit rejections.
pub fn status_error(status: StatusCode, url: &str, offset: u64) -> Option<DownloadError> {
    if status.is_success() {
        return None;
    }
    let code = status.as_u16();
    let message = format!("{url} returned {status}");
    let err = match code {
        408 | 429 => DownloadError::unavailable(message, Some(code)),
        _ if status.is_server_error() => DownloadError::unavailable(message, Some(code)),
        401 | 403 => DownloadError::permission_denied(message),
        404 | 410 => DownloadError::source_expired(message),
        416 if offset > 0 => DownloadError::source_expired(message),
        _ => DownloadError::rejected(message, Some(code)),
    };
    Some(err)
}

/// Total size from `Content-Range: bytes <start>-<end>/<total>`.
pub fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, CONTENT_RANGE)?
        .rsplit('/')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Filename from a `Content-Disposition` header value.
pub fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty() && !name.contains(['/', '\\']))
}

fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
        .map_or_else(|| FALLBACK_FILENAME.to_string(), str::to_string)
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn map_reqwest_error(err: &reqwest::Error) -> DownloadError {
    let message = err.to_string();
    if err.is_timeout() {
        DownloadError::timeout(message)
    } else if err.is_builder() {
        DownloadError::rejected(message, None)
    } else if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
        DownloadError::connection_lost(message)
    } else {
        DownloadError::other(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediafetch_core::ErrorClass;
    use reqwest::header::HeaderValue;

    fn class_of(code: u16, offset: u64) -> Option<ErrorClass> {
        let status = StatusCode::from_u16(code).unwrap();
        status_error(status, "http://host/a.mkv", offset).map(|err| err.class())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(class_of(200, 0), None);
        assert_eq!(class_of(206, 100), None);
        assert_eq!(class_of(408, 0), Some(ErrorClass::Transient));
        assert_eq!(class_of(429, 0), Some(ErrorClass::Transient));
        assert_eq!(class_of(503, 0), Some(ErrorClass::Transient));
        assert_eq!(class_of(401, 0), Some(ErrorClass::Fatal));
        assert_eq!(class_of(403, 0), Some(ErrorClass::Fatal));
        assert_eq!(class_of(404, 0), Some(ErrorClass::SourceExpired));
        assert_eq!(class_of(410, 0), Some(ErrorClass::SourceExpired));
        assert_eq!(class_of(416, 100), Some(ErrorClass::SourceExpired));
        assert_eq!(class_of(416, 0), Some(ErrorClass::Fatal));
        assert_eq!(class_of(400, 0), Some(ErrorClass::Fatal));
    }

    #[test]
    fn test_permission_statuses_are_permission_errors() {
        let err = status_error(StatusCode::FORBIDDEN, "u", 0).unwrap();
        assert!(matches!(err, DownloadError::PermissionDenied { .. }));
    }

    #[test]
    fn test_content_range_total() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_range_total(&headers), None);
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("bytes 100-999/1000"));
        assert_eq!(content_range_total(&headers), Some(1000));
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("bytes 100-999/*"));
        assert_eq!(content_range_total(&headers), None);
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="Movie.Title.2022.mkv""#),
            Some("Movie.Title.2022.mkv".to_string())
        );
        assert_eq!(
            disposition_filename("inline; filename=clip.mp4"),
            Some("clip.mp4".to_string())
        );
        assert_eq!(disposition_filename("attachment"), None);
        assert_eq!(disposition_filename(r#"attachment; filename="../etc/passwd""#), None);
    }

    #[test]
    fn test_filename_from_url() {
        let url = Url::parse("https://cdn.example.com/files/Show.S01E02.mkv?token=abc").unwrap();
        assert_eq!(filename_from_url(&url), "Show.S01E02.mkv");
        let url = Url::parse("https://cdn.example.com/files/").unwrap();
        assert_eq!(filename_from_url(&url), "files");
        let url = Url::parse("https://cdn.example.com").unwrap();
        assert_eq!(filename_from_url(&url), FALLBACK_FILENAME);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let source = HttpSource::new().unwrap();
        let err = source
            .open(&SourceRef::new("http://127.0.0.1:1/a.mkv"), 0)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }
}
