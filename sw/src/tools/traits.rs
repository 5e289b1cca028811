//! ToolProvider trait definition

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::ToolError;
use crate::llm::ToolDefinition;

/// An external source of callable tools
///
/// `connect` must be idempotent: discovery calls it again on refresh.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Stable provider id used to attribute discovered tools
    fn id(&self) -> &str;

    /// Establish the connection (spawn, handshake)
    async fn connect(&mut self) -> Result<(), ToolError>;

    /// List the tools this provider currently offers
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError>;

    /// Invoke a tool by name
    ///
    /// A tool that ran but reported failure returns `Ok` with an error result;
    /// `Err` is reserved for provider or transport failures.
    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, ToolError>;

    /// Release the connection
    async fn disconnect(&mut self) -> Result<(), ToolError>;
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(content: impl Into<String>) -> Self {
        debug!("ToolResult::success: called");
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error result
    pub fn error(content: impl Into<String>) -> Self {
        debug!("ToolResult::error: called");
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// A discovered tool tagged with the provider that owns it
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub provider_id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn from_definition(provider_id: &str, def: ToolDefinition) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            name: def.name,
            description: def.description,
            input_schema: def.input_schema,
        }
    }

    /// Definition handed to the model
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.input_schema.clone())
    }
}
