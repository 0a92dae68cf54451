//! Error types for autopacker-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while reconciling or packaging.
///
/// At this layer a locked archive and a vanished folder are the same thing:
/// the caller retries on the next cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip reader or writer rejected the archive.
    #[error("zip error at {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Directory traversal failed (folder removed mid-scan, permission denied).
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Zip`].
pub(crate) fn zip_err(path: impl Into<PathBuf>, source: zip::result::ZipError) -> SyncError {
    SyncError::Zip {
        path: path.into(),
        source,
    }
}
