//! Planning sessions
//!
//! A session is a persisted record that walks a strictly monotonic phase
//! sequence. [`SessionLifecycle`] owns the record while it is in use and
//! [`SessionStore`] keeps it between runs.

mod error;
mod lifecycle;
mod phase;
mod record;
mod store;

pub use error::SessionError;
pub use lifecycle::SessionLifecycle;
pub use phase::SessionPhase;
pub use record::{DecisionDocument, FeatureRequest, History, PendingInteraction, SessionRecord, WorkflowKind};
pub use store::{FileSessionStore, SessionListing, SessionStore};
