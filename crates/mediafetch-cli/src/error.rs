//! CLI-specific error types and exit-code mapping.

use mediafetch_core::{ConfigError, DownloadError, ErrorClass};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument error (unsupported source, non-media file, ...).
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// Local I/O error.
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not enough disk space.
    #[error("{0}")]
    DiskSpace(String),

    /// The source could not be reached or refused the request.
    #[error("Source error: {0}")]
    Source(String),

    /// Some transfers did not complete.
    #[error("{failed} of {total} transfer(s) did not complete")]
    Incomplete {
        /// Items that failed or were cancelled.
        failed: usize,
        /// Items submitted.
        total: usize,
    },
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// Exit codes follow sysexits.h where a category fits:
    /// - 1: transfers did not complete
    /// - 2: invalid arguments
    /// - 69: source unavailable
    /// - 73: cannot create output (disk full)
    /// - 74: local I/O error
    /// - 78: configuration error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Incomplete { .. } => 1,
            Self::Arguments(_) => 2,
            Self::Source(_) => 69,      // EX_UNAVAILABLE
            Self::DiskSpace(_) => 73,   // EX_CANTCREAT
            Self::Io(_) => 74,          // EX_IOERR
            Self::Config(_) => 78,      // EX_CONFIG
        }
    }
}

impl From<DownloadError> for CliError {
    fn from(err: DownloadError) -> Self {
        match (&err, err.class()) {
            (DownloadError::Io { .. }, _) => Self::Io(err.to_string()),
            (DownloadError::NotFound { .. } | DownloadError::InvalidState { .. }, _) => {
                Self::Arguments(err.to_string())
            }
            (_, ErrorClass::DiskRefused) => Self::DiskSpace(err.user_message()),
            _ => Self::Source(err.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 2);
        assert_eq!(CliError::Config("x".into()).exit_code(), 78);
        assert_eq!(
            CliError::Incomplete {
                failed: 1,
                total: 2
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_download_error_mapping() {
        let disk: CliError = DownloadError::disk_refused(10, 100).into();
        assert!(matches!(disk, CliError::DiskSpace(_)));
        assert_eq!(disk.exit_code(), 73);

        let io: CliError = DownloadError::io("StorageFull", "no space").into();
        assert_eq!(io.exit_code(), 74);

        let source: CliError = DownloadError::rejected("gone", Some(404)).into();
        assert_eq!(source.exit_code(), 69);

        let missing: CliError = DownloadError::not_found(3).into();
        assert_eq!(missing.exit_code(), 2);
    }

    #[test]
    fn test_config_error_mapping() {
        let err: CliError = ConfigError::ZeroConcurrency.into();
        assert_eq!(err.exit_code(), 78);
    }
}
