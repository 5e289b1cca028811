//! JSON-RPC 2.0 and MCP payload types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision sent in the initialize handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 response (success or error)
///
/// `id` is optional so that server-initiated notifications interleaved on
/// stdout still decode and can be skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A tool as advertised by `tools/list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object"})
}

/// `tools/list` result page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpTool>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// `tools/call` result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Join the text items; non-text items are summarized by type
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|item| match (&item.kind[..], &item.text) {
                ("text", Some(text)) => text.clone(),
                (kind, _) => format!("[{kind} content omitted]"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One item of a `tools/call` result
#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(7, "tools/list", None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}));
    }

    #[test]
    fn test_notification_has_no_id() {
        let note = JsonRpcNotification::new("notifications/initialized", None);
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_list_tools_defaults_schema() {
        let raw = json!({"tools": [{"name": "ping"}], "nextCursor": "p2"});
        let result: ListToolsResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.tools[0].input_schema, json!({"type": "object"}));
        assert_eq!(result.next_cursor.as_deref(), Some("p2"));
    }

    #[test]
    fn test_call_result_text_joins_items() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "line two"}
            ],
            "isError": true
        });
        let result: CallToolResult = serde_json::from_value(raw).unwrap();
        assert!(result.is_error);
        assert_eq!(result.text(), "line one\n[image content omitted]\nline two");
    }

    #[test]
    fn test_response_without_id_decodes() {
        let raw = r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.id.is_none());
    }
}
