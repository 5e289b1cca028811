//! Line-delimited JSON-RPC over a child process's stdio

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::tools::ToolError;

/// Bi-directional JSON-RPC transport
pub struct StdioTransport {
    provider: String,
    next_id: AtomicU64,
    writer: Mutex<ChildStdin>,
    reader: Mutex<BufReader<ChildStdout>>,
}

impl StdioTransport {
    pub fn new(provider: &str, stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            provider: provider.to_string(),
            next_id: AtomicU64::new(1),
            writer: Mutex::new(stdin),
            reader: Mutex::new(BufReader::new(stdout)),
        }
    }

    fn transport_error(&self, reason: impl Into<String>) -> ToolError {
        ToolError::Transport {
            provider: self.provider.clone(),
            reason: reason.into(),
        }
    }

    async fn write_line(&self, payload: &impl serde::Serialize) -> Result<(), ToolError> {
        let mut line =
            serde_json::to_string(payload).map_err(|e| self.transport_error(format!("failed to serialize: {e}")))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.transport_error(format!("failed to write to stdin: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| self.transport_error(format!("failed to flush stdin: {e}")))
    }

    /// Send a request and wait for the response carrying the same id
    ///
    /// Lines that are not JSON-RPC responses (server logging, notifications,
    /// server-initiated requests, stale replies) are skipped.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(provider = %self.provider, %id, %method, "request: called");
        self.write_line(&JsonRpcRequest::new(id, method, params)).await?;

        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| self.transport_error(format!("failed to read from stdout: {e}")))?;
            if read == 0 {
                return Err(self.transport_error("server stdout closed"));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match response_for(trimmed, id) {
                Some(resp) => return self.extract_result(resp),
                None => debug!(provider = %self.provider, line = %trimmed, "request: skipping unrelated line"),
            }
        }
    }

    /// Send a notification; no response is expected
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ToolError> {
        debug!(provider = %self.provider, %method, "notify: called");
        self.write_line(&JsonRpcNotification::new(method, params)).await
    }

    fn extract_result(&self, response: JsonRpcResponse) -> Result<Value, ToolError> {
        if let Some(err) = response.error {
            return Err(ToolError::Server {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| self.transport_error("response missing both result and error"))
    }
}

/// Decode `line` as the response to request `id`
///
/// Anything carrying a `method` is a server request or notification, even
/// when its id collides with ours.
fn response_for(line: &str, id: u64) -> Option<JsonRpcResponse> {
    let message: Value = serde_json::from_str(line).ok()?;
    if message.get("method").is_some() {
        return None;
    }
    serde_json::from_value::<JsonRpcResponse>(message)
        .ok()
        .filter(|resp| resp.id == Some(id))
}
