//! Error types for autopacker-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while resolving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `autopacker.yaml` exists but could not be parsed.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The working directory is not inside the game's mod root.
    #[error(
        "working directory must be a subfolder of the '{root_folder}' directory; \
         use --any-folder to bypass (directory: {path})"
    )]
    OutsideModRoot { path: PathBuf, root_folder: String },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
