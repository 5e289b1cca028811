//! Session lifecycle state machine
//!
//! The lifecycle is the only writer of a [`SessionRecord`]. Every mutation
//! goes through it and every consistent checkpoint is persisted through the
//! [`SessionStore`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::{DecisionDocument, PendingInteraction, SessionError, SessionPhase, SessionRecord, SessionStore};
use crate::llm::Message;
use crate::snapshot::{Fingerprinter, SnapshotProvider};

/// Owns one session record and advances it through its phases
pub struct SessionLifecycle {
    record: SessionRecord,
    store: Arc<dyn SessionStore>,
    snapshots: Arc<dyn SnapshotProvider>,
    fingerprinter: Arc<Fingerprinter>,
    /// System framing seeded on entering `ChatInitialized`
    framing: String,
}

impl SessionLifecycle {
    pub fn new(
        record: SessionRecord,
        store: Arc<dyn SessionStore>,
        snapshots: Arc<dyn SnapshotProvider>,
        fingerprinter: Arc<Fingerprinter>,
        framing: String,
    ) -> Self {
        debug!(id = %record.id, phase = %record.machine_state, "SessionLifecycle::new: called");
        Self {
            record,
            store,
            snapshots,
            fingerprinter,
            framing,
        }
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.record.machine_state
    }

    fn ensure_mutable(&self) -> Result<(), SessionError> {
        if self.record.machine_state == SessionPhase::Completed {
            return Err(SessionError::Completed {
                id: self.record.id.clone(),
            });
        }
        Ok(())
    }

    /// Walk forward to `target`, running each intermediate entry effect once
    ///
    /// The record is persisted after every step. Targets at or behind the
    /// current phase are no-ops.
    pub async fn transition_to(&mut self, target: SessionPhase) -> Result<(), SessionError> {
        debug!(id = %self.record.id, from = %self.record.machine_state, to = %target, "transition_to: called");
        while self.record.machine_state < target {
            let Some(next) = self.record.machine_state.next() else {
                break;
            };
            self.enter(next).await?;
            self.record.machine_state = next;
            self.checkpoint().await?;
            info!(id = %self.record.id, phase = %next, "Session entered phase");
        }
        Ok(())
    }

    async fn enter(&mut self, phase: SessionPhase) -> Result<(), SessionError> {
        match phase {
            SessionPhase::CodebasePacked => {
                self.sync_snapshot().await?;
            }
            SessionPhase::ChatInitialized => {
                if self.record.chat_history.is_empty() {
                    debug!("enter: seeding framing message");
                    self.record.chat_history.append(Message::system(self.framing.clone()));
                } else {
                    debug!(len = %self.record.chat_history.len(), "enter: keeping persisted history");
                }
            }
            SessionPhase::Fresh | SessionPhase::Planning | SessionPhase::GenerationReady | SessionPhase::Completed => {}
        }
        Ok(())
    }

    /// Bring the stored snapshot up to date with the working tree
    ///
    /// Returns `true` when the snapshot provider was invoked, `false` when the
    /// fingerprint matched and the stored content was reused.
    pub async fn sync_snapshot(&mut self) -> Result<bool, SessionError> {
        self.ensure_mutable()?;
        let dir = self.record.feature_data.snapshot_dir();
        let fingerprint = self.fingerprinter.compute(&dir).await?;

        if self.record.codebase_content.is_some() && self.record.codebase_hash.as_deref() == Some(fingerprint.as_str())
        {
            debug!(%fingerprint, "sync_snapshot: fingerprint unchanged, reusing snapshot");
            return Ok(false);
        }

        info!(id = %self.record.id, dir = %dir.display(), %fingerprint, "Packing codebase");
        let snapshot = self.snapshots.pack(&dir).await?;
        self.record.codebase_content = Some(snapshot.content);
        self.record.codebase_hash = Some(fingerprint);
        self.record.codebase_summary = Some(snapshot.summary);
        Ok(true)
    }

    /// Append a message to the history
    pub fn append(&mut self, message: Message) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.record.chat_history.append(message);
        Ok(())
    }

    pub fn pending(&self) -> Option<&PendingInteraction> {
        self.record.pending.as_ref()
    }

    pub fn set_pending(&mut self, pending: PendingInteraction) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.record.pending = Some(pending);
        Ok(())
    }

    pub fn take_pending(&mut self) -> Result<Option<PendingInteraction>, SessionError> {
        self.ensure_mutable()?;
        Ok(self.record.pending.take())
    }

    /// Store the generated document; call before entering `Completed`
    pub fn set_document(&mut self, document: DecisionDocument) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.record.document = Some(document);
        Ok(())
    }

    /// Persist the record as it stands
    pub async fn checkpoint(&mut self) -> Result<(), SessionError> {
        self.record.last_updated = Utc::now();
        self.store.save(&self.record.id, &self.record).await
    }
}
