//! Interactive planning dialogue
//!
//! Shows each question with its numbered options and feeds replies back into
//! the planner. Slash commands: `/done`, `/tools`, `/quit`, `/help`.

mod session;

pub use session::{DialogueEnd, DialogueSession, format_question, stream_document};

use eyre::Result;

use crate::planner::{Planner, SessionUpdate};

/// Run the dialogue for a session that has just started or been resumed
pub async fn run_interactive(planner: &mut Planner, update: SessionUpdate) -> Result<DialogueEnd> {
    let SessionUpdate { id, outcome } = update;
    let end = DialogueSession::new(planner, id).run(outcome).await;
    planner.shutdown().await;
    end
}
