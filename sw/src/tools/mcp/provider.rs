//! MCP server process as a ToolProvider

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::transport::StdioTransport;
use super::types::{CallToolResult, ListToolsResult, PROTOCOL_VERSION};
use crate::config::McpServerConfig;
use crate::llm::ToolDefinition;
use crate::tools::{ToolError, ToolProvider, ToolResult};

/// Grace period between closing stdin and killing the process
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct Connection {
    child: Child,
    transport: StdioTransport,
}

/// Tool provider backed by an MCP server speaking JSON-RPC over stdio
pub struct McpProvider {
    id: String,
    config: McpServerConfig,
    default_cwd: Option<PathBuf>,
    connection: Option<Connection>,
}

impl McpProvider {
    pub fn new(id: impl Into<String>, config: McpServerConfig) -> Self {
        Self {
            id: id.into(),
            config,
            default_cwd: None,
            connection: None,
        }
    }

    /// Working directory used when the server config does not set one
    pub fn with_default_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.default_cwd = Some(cwd.into());
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn transport(&self) -> Result<&StdioTransport, ToolError> {
        self.connection
            .as_ref()
            .map(|c| &c.transport)
            .ok_or_else(|| ToolError::NotConnected {
                provider: self.id.clone(),
            })
    }

    fn spawn(&self) -> Result<(Child, StdioTransport), ToolError> {
        let spawn_failed = |reason: String| ToolError::SpawnFailed {
            provider: self.id.clone(),
            reason,
        };

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = self.config.cwd.as_ref().or(self.default_cwd.as_ref()) {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| spawn_failed(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_failed("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_failed("failed to capture stdout".to_string()))?;

        // Server diagnostics go to the log, never the terminal
        if let Some(stderr) = child.stderr.take() {
            let id = self.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(provider = %id, stderr = %line, "mcp server output");
                }
            });
        }

        Ok((child, StdioTransport::new(&self.id, stdin, stdout)))
    }

    async fn handshake(transport: &StdioTransport) -> Result<Value, ToolError> {
        let result = transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
            )
            .await?;
        transport.notify("notifications/initialized", None).await?;
        Ok(result)
    }
}

#[async_trait]
impl ToolProvider for McpProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&mut self) -> Result<(), ToolError> {
        debug!(provider = %self.id, command = %self.config.command, "connect: called");
        if self.connection.is_some() {
            return Ok(());
        }

        let (mut child, transport) = self.spawn()?;
        let timeout_ms = self.config.init_timeout_ms;
        let init_failed = |reason: String| ToolError::InitFailed {
            provider: self.id.clone(),
            reason,
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), Self::handshake(&transport)).await {
            Ok(Ok(result)) => {
                let server = result["serverInfo"]["name"].as_str().unwrap_or("unknown");
                info!(provider = %self.id, %server, "connect: MCP server initialized");
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(init_failed(e.to_string()));
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(init_failed(format!("initialization timed out after {timeout_ms}ms")));
            }
        }

        self.connection = Some(Connection { child, transport });
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        debug!(provider = %self.id, "list_tools: called");
        let transport = self.transport()?;
        let timeout_ms = self.config.call_timeout_ms;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let request = transport.request("tools/list", params);
            let raw = tokio::time::timeout(Duration::from_millis(timeout_ms), request)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool: "tools/list".to_string(),
                    timeout_ms,
                })??;
            let page: ListToolsResult = serde_json::from_value(raw).map_err(|e| ToolError::InvalidPayload {
                provider: self.id.clone(),
                reason: e.to_string(),
            })?;

            tools.extend(
                page.tools
                    .into_iter()
                    .map(|t| ToolDefinition::new(t.name, t.description, t.input_schema)),
            );

            match page.next_cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(provider = %self.id, count = tools.len(), "list_tools: done");
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, ToolError> {
        debug!(provider = %self.id, %name, "call_tool: called");
        let transport = self.transport()?;
        let timeout_ms = self.config.call_timeout_ms;

        let request = transport.request("tools/call", Some(json!({ "name": name, "arguments": args })));
        let raw = tokio::time::timeout(Duration::from_millis(timeout_ms), request)
            .await
            .map_err(|_| ToolError::Timeout {
                tool: name.to_string(),
                timeout_ms,
            })??;

        let result: CallToolResult = serde_json::from_value(raw).map_err(|e| ToolError::InvalidPayload {
            provider: self.id.clone(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult {
            content: result.text(),
            is_error: result.is_error,
        })
    }

    async fn disconnect(&mut self) -> Result<(), ToolError> {
        let Some(Connection { mut child, transport }) = self.connection.take() else {
            return Ok(());
        };
        debug!(provider = %self.id, "disconnect: called");

        // Closing stdin is the MCP stdio shutdown signal
        drop(transport);
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => debug!(provider = %self.id, %status, "disconnect: server exited"),
            _ => {
                warn!(provider = %self.id, "disconnect: server did not exit, killing");
                let _ = child.kill().await;
            }
        }
        Ok(())
    }
}
