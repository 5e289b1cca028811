//! Snapshot error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while packing or fingerprinting a tree
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
