//! Capture error types.

use std::path::PathBuf;

/// Errors that can occur while writing capture artifacts or the result sink.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// Failed to create the parent directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open the file.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write or flush the file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
