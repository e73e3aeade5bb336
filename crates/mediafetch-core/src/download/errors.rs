//! Download error types.
//!
//! These errors are serializable and do not hold external error types like
//! `std::io::Error`. For I/O errors we capture the kind and message as
//! strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::retry::ErrorClass;
use super::state::DownloadState;
use crate::utils::humanize_size;

/// Error type for transfers and manager operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// Local I/O error (writing, renaming, deleting).
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "`NotFound`", "`StorageFull`").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// The source stopped responding within its deadline.
    #[error("Timed out: {message}")]
    Timeout {
        /// Detailed error message.
        message: String,
    },

    /// The connection dropped mid-transfer.
    #[error("Connection lost: {message}")]
    ConnectionLost {
        /// Detailed error message.
        message: String,
    },

    /// The source is temporarily unable to serve the item.
    #[error("Source unavailable: {message}")]
    SourceUnavailable {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The source explicitly refused the request.
    #[error("Rejected by source: {message}")]
    Rejected {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// Permission or quota failure at the source or on disk.
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Detailed error message.
        message: String,
    },

    /// The source handle can no longer be reopened (e.g. after a pause).
    #[error("Source expired: {message}")]
    SourceExpired {
        /// Detailed error message.
        message: String,
    },

    /// Not enough free space even after eviction.
    #[error("Not enough disk space: {free_bytes} bytes free, {required_bytes} bytes required")]
    DiskRefused {
        /// Free bytes after eviction.
        free_bytes: u64,
        /// Free bytes needed to admit the item.
        required_bytes: u64,
    },

    /// No tracked item with this id.
    #[error("Not found: {id}")]
    NotFound {
        /// The id that was not found.
        id: String,
    },

    /// The operation does not apply to the item's current state.
    #[error("Cannot {action} download {id} while it is {state}")]
    InvalidState {
        /// The item id.
        id: String,
        /// Its current state.
        state: DownloadState,
        /// The rejected operation.
        action: String,
    },

    /// Download was cancelled by user.
    #[error("Download cancelled")]
    Cancelled,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

/// Result alias for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

impl DownloadError {
    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an error from a `std::io::Error`, keeping the taxonomy.
    ///
    /// Timeouts and dropped connections are transient; permission problems
    /// get their own variant; everything else is a fatal I/O error.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        let message = err.to_string();
        match err.kind() {
            ErrorKind::TimedOut => Self::Timeout { message },
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::Interrupted => Self::ConnectionLost { message },
            ErrorKind::PermissionDenied => Self::PermissionDenied { message },
            kind => Self::Io {
                kind: format!("{kind:?}"),
                message,
            },
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a connection-lost error.
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }

    /// Create a temporary-unavailability error.
    pub fn unavailable(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
            status_code,
        }
    }

    /// Create an explicit-rejection error.
    pub fn rejected(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Rejected {
            message: message.into(),
            status_code,
        }
    }

    /// Create a permission error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a source-expired error.
    pub fn source_expired(message: impl Into<String>) -> Self {
        Self::SourceExpired {
            message: message.into(),
        }
    }

    /// Create a disk refusal.
    #[must_use]
    pub const fn disk_refused(free_bytes: u64, required_bytes: u64) -> Self {
        Self::DiskRefused {
            free_bytes,
            required_bytes,
        }
    }

    /// Create a not found error.
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(id: impl ToString, state: DownloadState, action: impl Into<String>) -> Self {
        Self::InvalidState {
            id: id.to_string(),
            state,
            action: action.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Classify the error for the retry policy.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout { .. } | Self::ConnectionLost { .. } | Self::SourceUnavailable { .. } => {
                ErrorClass::Transient
            }
            Self::DiskRefused { .. } => ErrorClass::DiskRefused,
            Self::SourceExpired { .. } => ErrorClass::SourceExpired,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Io { .. }
            | Self::Rejected { .. }
            | Self::PermissionDenied { .. }
            | Self::NotFound { .. }
            | Self::InvalidState { .. }
            | Self::Other { .. } => ErrorClass::Fatal,
        }
    }

    /// Check if this error is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient)
    }

    /// Check if this error represents a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Bytes missing for a disk refusal.
    #[must_use]
    pub const fn shortfall_bytes(&self) -> Option<u64> {
        match self {
            Self::DiskRefused {
                free_bytes,
                required_bytes,
            } => Some(required_bytes.saturating_sub(*free_bytes)),
            _ => None,
        }
    }

    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::DiskRefused {
                free_bytes,
                required_bytes,
            } => format!(
                "Not enough disk space: short by {} ({} free, {} needed). Free some space or lower MIN_FREE_DISK_MB.",
                humanize_size(required_bytes.saturating_sub(*free_bytes)),
                humanize_size(*free_bytes),
                humanize_size(*required_bytes),
            ),
            Self::Timeout { .. } | Self::ConnectionLost { .. } => {
                "Network problem. Please check your connection.".to_string()
            }
            Self::SourceExpired { .. } => {
                "The source link expired. Send the item again.".to_string()
            }
            Self::PermissionDenied { .. } => "Access denied by the source or the disk.".to_string(),
            Self::Cancelled => "Download was cancelled.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DownloadError::not_found("42");
        assert_eq!(err.to_string(), "Not found: 42");

        let err = DownloadError::invalid_state(3, DownloadState::Queued, "pause");
        assert_eq!(err.to_string(), "Cannot pause download 3 while it is queued");
    }

    #[test]
    fn test_io_error_mapping() {
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(matches!(
            DownloadError::from_io_error(&timeout),
            DownloadError::Timeout { .. }
        ));

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(DownloadError::from(reset).is_transient());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            DownloadError::from_io_error(&denied),
            DownloadError::PermissionDenied { .. }
        ));

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        match DownloadError::from_io_error(&missing) {
            DownloadError::Io { kind, .. } => assert_eq!(kind, "NotFound"),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(DownloadError::timeout("t").class(), ErrorClass::Transient);
        assert_eq!(
            DownloadError::unavailable("503", Some(503)).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            DownloadError::rejected("bad", Some(400)).class(),
            ErrorClass::Fatal
        );
        assert_eq!(
            DownloadError::permission_denied("quota").class(),
            ErrorClass::Fatal
        );
        assert_eq!(
            DownloadError::disk_refused(1, 2).class(),
            ErrorClass::DiskRefused
        );
        assert_eq!(
            DownloadError::source_expired("stale").class(),
            ErrorClass::SourceExpired
        );
        assert_eq!(DownloadError::Cancelled.class(), ErrorClass::Cancelled);
    }

    #[test]
    fn test_disk_refusal_names_shortfall() {
        let err = DownloadError::disk_refused(150 * 1024 * 1024, 210 * 1024 * 1024);
        assert_eq!(err.shortfall_bytes(), Some(60 * 1024 * 1024));
        assert!(err.user_message().contains("short by 60 MB"));
        assert_eq!(DownloadError::Cancelled.shortfall_bytes(), None);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let err = DownloadError::unavailable("busy", Some(503));
        let json = serde_json::to_string(&err).unwrap();
        let back: DownloadError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
