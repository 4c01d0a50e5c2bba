//! Error types and handling for gridsync
//!
//! A single structured error enum is shared across the workspace. Diff-time and
//! repository-construction errors propagate to the caller; per-item transfer
//! failures are captured as event data instead and never surface here.

use std::path::PathBuf;

/// Main error type for gridsync operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// A local path required by an operation does not exist
    #[error("Source not found: {path}")]
    SourceNotFound {
        /// Path that was expected to exist locally
        path: PathBuf,
    },

    /// File and collection namespaces disagree between source and target
    #[error("Structural mismatch: {message}")]
    StructuralMismatch {
        /// Description of the conflicting path kinds
        message: String,
    },

    /// Permission denied creating or writing remote structure
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Remote path that could not be written
        path: String,
    },

    /// Aggregate batch size exceeds available capacity
    #[error("Not enough free space: need {required} bytes, {available} available")]
    NotEnoughFreeSpace {
        /// Bytes the batch would transfer
        required: u64,
        /// Bytes currently available after the reserve
        available: u64,
    },

    /// Persisted state could not be loaded
    #[error("Error loading {path}, please fix or remove it: {message}")]
    MalformedDocument {
        /// Path of the offending document
        path: PathBuf,
        /// Underlying parse error
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Remote store operation failed
    #[error("Remote store error: {message}")]
    Remote {
        /// Error message from the remote collaborator
        message: String,
    },

    /// Cron expression could not be parsed
    #[error("Invalid cron expression '{expression}': {message}")]
    InvalidCron {
        /// The rejected expression
        expression: String,
        /// Parser diagnostic
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors, including missing sources
    Io,
    /// Structural file/collection mismatches
    StructuralMismatch,
    /// Permission problems on the remote side
    PermissionDenied,
    /// Capacity exhaustion
    Capacity,
    /// Malformed persisted state
    MalformedDocument,
    /// Configuration errors, including invalid cron expressions
    Config,
    /// Remote collaborator errors
    Remote,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::SourceNotFound { .. } => ErrorKind::Io,
            Self::StructuralMismatch { .. } => ErrorKind::StructuralMismatch,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NotEnoughFreeSpace { .. } => ErrorKind::Capacity,
            Self::MalformedDocument { .. } => ErrorKind::MalformedDocument,
            Self::Config { .. } | Self::InvalidCron { .. } => ErrorKind::Config,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Whether the operator must intervene before a retry can succeed
    pub fn needs_operator(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PermissionDenied | ErrorKind::MalformedDocument | ErrorKind::Config
        )
    }

    /// Create a new structural mismatch error
    pub fn structural_mismatch<S: Into<String>>(message: S) -> Self {
        Self::StructuralMismatch {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new remote store error
    pub fn remote<S: Into<String>>(message: S) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_kinds() {
        let err = Error::SourceNotFound {
            path: PathBuf::from("/missing/dir"),
        };
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/missing/dir"));

        let err = Error::structural_mismatch("file vs collection");
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);

        let err = Error::NotEnoughFreeSpace {
            required: 100,
            available: 10,
        };
        assert_eq!(err.kind(), ErrorKind::Capacity);
    }

    #[test]
    fn test_operator_intervention() {
        assert!(Error::MalformedDocument {
            path: PathBuf::from("sync.json"),
            message: "unexpected EOF".into(),
        }
        .needs_operator());
        assert!(Error::PermissionDenied {
            path: "/grid/home/other".into(),
        }
        .needs_operator());
        assert!(!Error::remote("connection reset").needs_operator());
    }

    #[test]
    fn test_malformed_document_names_the_file() {
        let err = Error::MalformedDocument {
            path: PathBuf::from("/home/user/.gridsync/synchronisation.json"),
            message: "expected value at line 1".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("synchronisation.json"));
        assert!(rendered.contains("fix or remove"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "test file");
        let err = Error::from(io_error);
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("test file"));
    }

    #[test]
    fn test_invalid_cron_error() {
        let err = Error::InvalidCron {
            expression: "not a cron".into(),
            message: "expected 5 fields".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("not a cron"));
    }
}
