//! Anthropic Claude API client implementation
//!
//! Implements the LlmClient trait for Anthropic's Messages API with
//! support for both blocking and streaming responses.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, Role, StopReason, StreamChunk, TokenUsage,
    ToolCall, retry,
};
use crate::config::LlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, model = %config.model, "from_config: called");
        let api_key = config.get_api_key()?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    fn post(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
    }

    /// Build the request body for the Anthropic API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": convert_messages(&request.messages),
        });

        if !request.tools.is_empty() {
            debug!("build_request_body: tools not empty, adding tools");
            body["tools"] = json!(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_anthropic_schema())
                    .collect::<Vec<_>>()
            );
        }

        body
    }

    /// Parse the Anthropic API response
    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "parse_response: called");
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in api_response.content {
            match block {
                AnthropicContentBlock::Text { text: t } => {
                    text.push_str(&t);
                }
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    debug!(%id, %name, "parse_response: ToolUse block");
                    tool_calls.push(ToolCall { id, name, args: input });
                }
                AnthropicContentBlock::Other => {
                    debug!("parse_response: skipping unsupported block");
                }
            }
        }

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls,
            stop_reason: StopReason::from_anthropic(&api_response.stop_reason),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
                cache_read_tokens: api_response.usage.cache_read_input_tokens.unwrap_or(0),
                cache_creation_tokens: api_response.usage.cache_creation_input_tokens.unwrap_or(0),
            },
        }
    }
}

/// Convert the flat history into Anthropic messages
///
/// System messages travel in the top-level `system` field and are skipped.
/// Consecutive tool messages collapse into one user turn of `tool_result`
/// blocks, which the API requires to directly follow the `tool_use` turn.
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    debug!(message_count = %messages.len(), "convert_messages: called");
    let mut out: Vec<Value> = Vec::new();
    let mut pending_results: Vec<Value> = Vec::new();

    let flush = |out: &mut Vec<Value>, pending: &mut Vec<Value>| {
        if !pending.is_empty() {
            out.push(json!({ "role": "user", "content": std::mem::take(pending) }));
        }
    };

    for msg in messages {
        match msg.role {
            Role::System => continue,
            Role::Tool => {
                pending_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": msg.tool_call_id.as_deref().unwrap_or_default(),
                    "content": msg.content,
                    "is_error": msg.is_error,
                }));
            }
            Role::User => {
                flush(&mut out, &mut pending_results);
                out.push(json!({ "role": "user", "content": msg.content }));
            }
            Role::Assistant => {
                flush(&mut out, &mut pending_results);
                if msg.tool_calls.is_empty() {
                    out.push(json!({ "role": "assistant", "content": msg.content }));
                    continue;
                }
                let mut blocks = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(json!({ "type": "text", "text": msg.content }));
                }
                for call in &msg.tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.args,
                    }));
                }
                out.push(json!({ "role": "assistant", "content": blocks }));
            }
        }
    }
    flush(&mut out, &mut pending_results);

    out
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let response = retry::send_with_retry(|| self.post(&url, &body), self.timeout).await?;
        let api_response: AnthropicResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "stream: called");
        let url = format!("{}/v1/messages", self.base_url);
        let mut body = self.build_request_body(&request);
        body["stream"] = json!(true);

        let mut es = EventSource::new(self.post(&url, &body)).map_err(|e| LlmError::Stream(e.to_string()))?;

        let mut full_content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut current_tool: Option<(String, String, String)> = None; // (id, name, json_acc)
        let mut stop_reason = StopReason::EndTurn;
        let mut usage = TokenUsage::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Message(msg)) => {
                    let data: Value = serde_json::from_str(&msg.data)?;

                    match data["type"].as_str() {
                        Some("message_start") => {
                            if let Some(u) = data["message"].get("usage") {
                                usage.input_tokens = u["input_tokens"].as_u64().unwrap_or(0);
                                usage.cache_read_tokens = u["cache_read_input_tokens"].as_u64().unwrap_or(0);
                                usage.cache_creation_tokens = u["cache_creation_input_tokens"].as_u64().unwrap_or(0);
                                let _ = chunk_tx
                                    .send(StreamChunk::MessageStart {
                                        input_tokens: usage.input_tokens,
                                    })
                                    .await;
                            }
                        }
                        Some("content_block_start") => {
                            if let Some(block) = data.get("content_block")
                                && block["type"] == "tool_use"
                            {
                                let id = block["id"].as_str().unwrap_or_default().to_string();
                                let name = block["name"].as_str().unwrap_or_default().to_string();
                                debug!(%id, %name, "stream: tool_use block started");
                                current_tool = Some((id.clone(), name.clone(), String::new()));
                                let _ = chunk_tx.send(StreamChunk::ToolUseStart { id, name }).await;
                            }
                        }
                        Some("content_block_delta") => {
                            if let Some(delta) = data.get("delta") {
                                if let Some(text) = delta["text"].as_str() {
                                    full_content.push_str(text);
                                    let _ = chunk_tx.send(StreamChunk::TextDelta(text.to_string())).await;
                                }
                                if let Some(fragment) = delta["partial_json"].as_str()
                                    && let Some((ref id, _, ref mut acc)) = current_tool
                                {
                                    acc.push_str(fragment);
                                    let _ = chunk_tx
                                        .send(StreamChunk::ToolUseDelta {
                                            id: id.clone(),
                                            json_delta: fragment.to_string(),
                                        })
                                        .await;
                                }
                            }
                        }
                        Some("content_block_stop") => {
                            if let Some((id, name, acc)) = current_tool.take() {
                                let args: Value = if acc.trim().is_empty() {
                                    json!({})
                                } else {
                                    serde_json::from_str(&acc)?
                                };
                                tool_calls.push(ToolCall {
                                    id: id.clone(),
                                    name,
                                    args,
                                });
                                let _ = chunk_tx.send(StreamChunk::ToolUseEnd { id }).await;
                            }
                        }
                        Some("message_delta") => {
                            if let Some(sr) = data["delta"]["stop_reason"].as_str() {
                                stop_reason = StopReason::from_anthropic(sr);
                            }
                            if let Some(u) = data.get("usage") {
                                usage.output_tokens = u["output_tokens"].as_u64().unwrap_or(0);
                            }
                        }
                        Some("message_stop") => {
                            debug!("stream: message_stop");
                            break;
                        }
                        Some("error") => {
                            let message = data["error"]["message"].as_str().unwrap_or("unknown").to_string();
                            let _ = chunk_tx.send(StreamChunk::Error(message.clone())).await;
                            es.close();
                            return Err(LlmError::Stream(message));
                        }
                        _ => {}
                    }
                }
                Ok(Event::Open) => {
                    debug!("stream: Event::Open");
                }
                Err(e) => {
                    debug!(%e, "stream: Event error");
                    es.close();
                    let _ = chunk_tx.send(StreamChunk::Error(e.to_string())).await;
                    return Err(LlmError::Stream(e.to_string()));
                }
            }
        }
        es.close();

        let _ = chunk_tx
            .send(StreamChunk::MessageDone {
                stop_reason: stop_reason.clone(),
                usage: usage.clone(),
            })
            .await;

        Ok(CompletionResponse {
            content: if full_content.is_empty() { None } else { Some(full_content) },
            tool_calls,
            stop_reason,
            usage,
        })
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: String,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
    cache_read_input_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolDefinition;

    fn client(max_tokens: u32) -> AnthropicClient {
        AnthropicClient {
            model: "claude-sonnet-4".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            http: Client::new(),
            max_tokens,
            timeout: Duration::from_secs(300),
        }
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            args: json!({"q": "x"}),
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let request = CompletionRequest {
            system_prompt: "You are helpful".to_string(),
            messages: vec![Message::user("Hello")],
            tools: vec![],
            max_tokens: 1000,
        };

        let body = client(8192).build_request_body(&request);

        assert_eq!(body["model"], "claude-sonnet-4");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_build_request_body_with_tools() {
        let request = CompletionRequest {
            system_prompt: "You are helpful".to_string(),
            messages: vec![Message::user("Search the docs")],
            tools: vec![ToolDefinition::new(
                "search",
                "Search the docs",
                json!({"type": "object", "properties": {"q": {"type": "string"}}}),
            )],
            max_tokens: 1000,
        };

        let body = client(8192).build_request_body(&request);

        assert!(body["tools"].is_array());
        assert_eq!(body["tools"][0]["name"], "search");
    }

    #[test]
    fn test_max_tokens_capped() {
        let request = CompletionRequest {
            system_prompt: "Test".to_string(),
            messages: vec![],
            tools: vec![],
            max_tokens: 5000,
        };

        let body = client(1000).build_request_body(&request);
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_convert_messages_skips_system() {
        let converted = convert_messages(&[Message::system("framing"), Message::user("hi")]);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0]["role"], "user");
    }

    #[test]
    fn test_convert_messages_merges_tool_results() {
        let history = vec![
            Message::user("plan auth"),
            Message::assistant_with_calls("checking", vec![call("c1", "search"), call("c2", "read")]),
            Message::tool("c1", "found", false),
            Message::tool("c2", "missing", true),
            Message::user("ok"),
        ];

        let converted = convert_messages(&history);
        assert_eq!(converted.len(), 4);

        let assistant = &converted[1];
        assert_eq!(assistant["role"], "assistant");
        assert_eq!(assistant["content"][0]["type"], "text");
        assert_eq!(assistant["content"][1]["type"], "tool_use");
        assert_eq!(assistant["content"][2]["input"]["q"], "x");

        let results = &converted[2];
        assert_eq!(results["role"], "user");
        assert_eq!(results["content"].as_array().unwrap().len(), 2);
        assert_eq!(results["content"][0]["tool_use_id"], "c1");
        assert_eq!(results["content"][1]["is_error"], true);

        assert_eq!(converted[3]["content"], "ok");
    }

    #[test]
    fn test_convert_messages_trailing_tool_results_flushed() {
        let history = vec![
            Message::assistant_with_calls("", vec![call("c1", "search")]),
            Message::tool("c1", "found", false),
        ];
        let converted = convert_messages(&history);
        assert_eq!(converted.len(), 2);
        // Empty text is not sent as a block
        assert_eq!(converted[0]["content"].as_array().unwrap().len(), 1);
        assert_eq!(converted[1]["content"][0]["type"], "tool_result");
    }

    #[test]
    fn test_parse_response_concatenates_text_and_collects_calls() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "Let me "},
                {"type": "text", "text": "look."},
                {"type": "tool_use", "id": "toolu_1", "name": "search", "input": {"q": "auth"}},
                {"type": "thinking", "thinking": "..."}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let api: AnthropicResponse = serde_json::from_value(raw).unwrap();
        let response = client(1000).parse_response(api);

        assert_eq!(response.content.as_deref(), Some("Let me look."));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].args["q"], "auth");
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage.input_tokens, 10);
    }
}
