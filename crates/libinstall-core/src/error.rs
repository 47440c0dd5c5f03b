//! Error types for libinstall.
//!
//! Every install or uninstall attempt aborts on the first failure and hands
//! one of these variants back to the caller. Nothing is retried internally.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for library installation.
#[derive(Debug, Error)]
pub enum LibraryError {
    // Conflict errors
    #[error("Library already installed: {name}@{version}")]
    AlreadyInstalled { name: String, version: String },

    #[error("Destination dir {path} already exists, cannot install")]
    DirectoryConflict { path: PathBuf },

    // Configuration errors
    #[error("User libraries directory not set")]
    MissingUserDirectory,

    #[error("Configuration error: {message}")]
    Config { message: String },

    // Archive errors
    #[error("Archive {archive} is not valid: {message}")]
    ArchiveStructureInvalid { archive: PathBuf, message: String },

    #[error("Extracting archive {archive}: {message}")]
    ArchiveExtractionFailed {
        archive: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Repository errors
    #[error("Invalid git url: {url}")]
    InvalidRepositoryUrl { url: String },

    #[error("Cloning git repository {url}: {message}")]
    RepositoryCloneFailed { url: String, message: String },

    // Index resource errors
    #[error("Installing resource for {name}: {message}")]
    ResourceInstallFailed { name: String, message: String },

    // Uninstall errors
    #[error("Install directory not set for library {name}")]
    InstallDirectoryUnset { name: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Filesystem {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("Installation cancelled")]
    Cancelled,
}

/// Result type alias for libinstall operations.
pub type Result<T> = std::result::Result<T, LibraryError>;

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Filesystem {
            message: err.to_string(),
            path: None,
            source: err,
        }
    }
}

impl LibraryError {
    /// Create a filesystem error with path context.
    pub fn fs(err: std::io::Error, message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        LibraryError::Filesystem {
            message: message.into(),
            path: Some(path.into()),
            source: err,
        }
    }

    /// Kind of the underlying I/O failure, if this error wraps one.
    ///
    /// Lets callers tell not-found, permission and other causes apart.
    pub fn io_error_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            LibraryError::Filesystem { source, .. } => Some(source.kind()),
            LibraryError::ArchiveExtractionFailed {
                source: Some(source),
                ..
            } => Some(source.kind()),
            _ => None,
        }
    }

    /// Whether this error reports a collision with something already on disk.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            LibraryError::AlreadyInstalled { .. } | LibraryError::DirectoryConflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let err = LibraryError::AlreadyInstalled {
            name: "Servo".into(),
            version: "1.2.0".into(),
        };
        assert_eq!(err.to_string(), "Library already installed: Servo@1.2.0");

        let err = LibraryError::DirectoryConflict {
            path: PathBuf::from("/libs/Servo"),
        };
        assert_eq!(
            err.to_string(),
            "Destination dir /libs/Servo already exists, cannot install"
        );
    }

    #[test]
    fn test_io_error_kind() {
        let err = LibraryError::fs(
            io::Error::from(io::ErrorKind::PermissionDenied),
            "Failed to remove library directory",
            "/libs/Servo",
        );
        assert_eq!(err.io_error_kind(), Some(io::ErrorKind::PermissionDenied));

        let err: LibraryError = io::Error::from(io::ErrorKind::NotFound).into();
        assert_eq!(err.io_error_kind(), Some(io::ErrorKind::NotFound));

        assert_eq!(LibraryError::MissingUserDirectory.io_error_kind(), None);
    }

    #[test]
    fn test_conflict_errors() {
        assert!(LibraryError::DirectoryConflict {
            path: PathBuf::from("/libs/Servo")
        }
        .is_conflict());
        assert!(!LibraryError::Cancelled.is_conflict());
    }
}
