//! Specwright - interactive planning assistant
//!
//! Specwright interviews the user about a feature request, grounded in a
//! packed snapshot of their codebase, until a readiness check says enough is
//! known. It then writes an architecture decision record or product
//! requirements document from the conversation.
//!
//! # Core Concepts
//!
//! - **Turn**: readiness check, model call, tool dispatch, repeated until the
//!   model asks the user something or the interview is ready
//! - **Pseudo-tools**: `ask-human` and `present-choice` suspend the turn
//!   instead of running; the user's answer resumes it
//! - **Sessions**: persisted records that move through a strictly forward
//!   phase sequence and resume after a restart
//! - **Fingerprints**: the codebase is repacked only when the working tree
//!   changed
//!
//! # Modules
//!
//! - [`planner`] - the context value behind every operation
//! - [`planning`] - orchestrator, parser, readiness, document generation
//! - [`session`] - records, phases, lifecycle, storage
//! - [`snapshot`] - codebase packing and fingerprints
//! - [`tools`] - tool registry and MCP providers
//! - [`llm`] - model clients
//! - [`prompts`] - prompt templates
//! - [`config`] - configuration loading
//! - [`cli`] / [`repl`] - terminal surface

pub mod cli;
pub mod config;
pub mod llm;
pub mod planner;
pub mod planning;
pub mod prompts;
pub mod repl;
pub mod session;
pub mod snapshot;
pub mod tools;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message};
pub use planner::{Planner, PlannerDeps, SessionUpdate, StartRequest};
pub use planning::{PlanningError, PlanningQuestion, QuestionOption, ReadinessEvaluation, TurnOutcome};
pub use session::{SessionError, SessionPhase, SessionRecord, SessionStore, WorkflowKind};
pub use snapshot::{Snapshot, SnapshotProvider, SnapshotSummary};
pub use tools::{ToolDescriptor, ToolError, ToolProvider, ToolRegistry, ToolResult};
