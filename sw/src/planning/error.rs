//! Planning error types

use thiserror::Error;

use crate::llm::LlmError;
use crate::session::SessionError;

/// Errors that end a planning turn
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("Turn budget of {turns} exhausted without the plan becoming ready")]
    MaxTurnsExceeded { turns: usize },

    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("No question is waiting for an answer in session {id}")]
    NothingPending { id: String },

    #[error("Session {id} is waiting for an answer and cannot start a new turn")]
    AwaitingAnswer { id: String },
}
