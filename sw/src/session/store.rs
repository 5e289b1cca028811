//! Session persistence
//!
//! One self-describing JSON document per session, written atomically.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{SessionError, SessionPhase, SessionRecord};

/// One row of `list()`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionListing {
    pub id: String,
    pub display_name: String,
    pub phase: SessionPhase,
    pub last_updated: DateTime<Utc>,
}

impl From<&SessionRecord> for SessionListing {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id.clone(),
            display_name: record.display_name(),
            phase: record.machine_state,
            last_updated: record.last_updated,
        }
    }
}

/// Storage seam for session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a record; `Ok(None)` when no record exists under `id`
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Persist a record under `id`, replacing any previous version
    async fn save(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError>;

    /// All readable sessions, most recently updated first
    async fn list(&self) -> Result<Vec<SessionListing>, SessionError>;
}

/// Stores each session as `<dir>/<id>.json`
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, SessionError> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn ensure_dir(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|source| SessionError::Io {
            path: self.dir.clone(),
            source,
        })
    }
}

/// Ids become file names, so only `[A-Za-z0-9-]` is accepted
fn validate_id(id: &str) -> Result<(), SessionError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(SessionError::InvalidId(id.to_string()));
    }
    Ok(())
}

fn decode(id: &str, bytes: &[u8]) -> Result<SessionRecord, SessionError> {
    serde_json::from_slice(bytes).map_err(|e| SessionError::Corruption {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, SessionError> {
        debug!(%id, "FileSessionStore::load: called");
        let path = self.path_for(id)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SessionError::Io { path, source }),
        };

        let record = decode(id, &bytes)?;
        if record.id != id {
            return Err(SessionError::Corruption {
                id: id.to_string(),
                reason: format!("record id '{}' does not match file name", record.id),
            });
        }
        Ok(Some(record))
    }

    async fn save(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError> {
        debug!(%id, phase = %record.machine_state, "FileSessionStore::save: called");
        let path = self.path_for(id)?;
        self.ensure_dir().await?;

        let json = serde_json::to_vec_pretty(record)?;
        let tmp = self.dir.join(format!(".{id}.json.tmp"));
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| SessionError::Io { path: tmp.clone(), source })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| SessionError::Io { path, source })
    }

    async fn list(&self) -> Result<Vec<SessionListing>, SessionError> {
        debug!(dir = %self.dir.display(), "FileSessionStore::list: called");
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut listings = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(SessionError::Io {
                        path: self.dir.clone(),
                        source,
                    });
                }
            };

            let path = entry.path();
            let Some(id) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
                .filter(|id| validate_id(id).is_ok())
            else {
                continue;
            };

            match self.load(id).await {
                Ok(Some(record)) => listings.push(SessionListing::from(&record)),
                Ok(None) => {}
                Err(e) => warn!(%id, error = %e, "Skipping unreadable session"),
            }
        }

        listings.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(listings)
    }
}
