//! Tool system for planning sessions
//!
//! External tool providers (MCP servers) are discovered into a flat catalogue
//! that the model can call during a planning turn. Arguments are checked
//! against each tool's declared schema before dispatch, and every failure is
//! turned into an error result the model can read.

mod error;
pub mod mcp;
mod registry;
mod schema;
mod traits;

pub use error::ToolError;
pub use registry::ToolRegistry;
#[cfg(test)]
pub use registry::mock;
pub use traits::{ToolDescriptor, ToolProvider, ToolResult};

/// Pseudo-tool that suspends the dialogue with a free-form question
pub const ASK_HUMAN: &str = "ask-human";

/// Pseudo-tool that suspends the dialogue with a multiple-choice question
pub const PRESENT_CHOICE: &str = "present-choice";

/// Names no provider may claim
pub const RESERVED_TOOL_NAMES: [&str; 2] = [ASK_HUMAN, PRESENT_CHOICE];
