//! Tool error types

use thiserror::Error;

/// Errors that can occur while discovering or invoking tools
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Failed to spawn provider '{provider}': {reason}")]
    SpawnFailed { provider: String, reason: String },

    #[error("Provider '{provider}' initialization failed: {reason}")]
    InitFailed { provider: String, reason: String },

    #[error("Transport error for provider '{provider}': {reason}")]
    Transport { provider: String, reason: String },

    #[error("Provider error [{code}]: {message}")]
    Server { code: i64, message: String },

    #[error("Tool call '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("Provider '{provider}' is not connected")]
    NotConnected { provider: String },

    #[error("Unexpected payload from provider '{provider}': {reason}")]
    InvalidPayload { provider: String, reason: String },
}
