//! Planning engine
//!
//! ```text
//! feature request ─▶ Orchestrator ──▶ TurnExecutor ──▶ model
//!                      │   ▲   │
//!                      │   │   └──▶ ToolRegistry (ordinary calls)
//!                      │   └─────── ReadinessEvaluator
//!                      └──▶ parser ──▶ PlanningQuestion for the user
//!
//! GenerationReady ─▶ DocumentGenerator ─▶ DecisionDocument
//! ```
//!
//! The human pseudo-tools (`ask-human`, `present-choice`) are intercepted
//! before dispatch and suspend the turn until the user answers.

mod document;
mod error;
mod executor;
mod orchestrator;
pub mod parser;
mod readiness;
mod transcript;

pub use document::DocumentGenerator;
pub use error::PlanningError;
pub use executor::{TurnExecutor, ask_human_definition, present_choice_definition, question_for};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use parser::{PlanningQuestion, QuestionOption};
pub use readiness::{ReadinessEvaluation, ReadinessEvaluator};
