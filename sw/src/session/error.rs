//! Session error types

use std::path::PathBuf;
use thiserror::Error;

use super::SessionPhase;
use crate::snapshot::SnapshotError;

/// Errors that can occur while loading, storing or advancing a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },

    #[error("Session {id} is corrupt: {reason}")]
    Corruption { id: String, reason: String },

    #[error("Session {id} is completed and can no longer change")]
    Completed { id: String },

    #[error("Session {id} is not ready for generation (phase: {phase})")]
    NotReady { id: String, phase: SessionPhase },

    #[error("Invalid session id '{0}'")]
    InvalidId(String),

    #[error("Session storage error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Codebase snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
}
