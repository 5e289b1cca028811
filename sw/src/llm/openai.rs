//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API with
//! support for both blocking and streaming responses.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, Role, StopReason, StreamChunk, TokenUsage,
    ToolCall, retry,
};
use crate::config::LlmConfig;

/// Decode a function-call argument string
///
/// Models occasionally emit an empty string for no-argument calls.
fn parse_arguments(raw: &str) -> Result<Value, LlmError> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    Ok(serde_json::from_str(raw)?)
}

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new client from configuration
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
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
    }

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");

        let mut messages = vec![json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(convert_messages(&request.messages));

        let max_tokens = request.max_tokens.min(self.max_tokens);

        // Reasoning models take max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = json!(max_tokens);
        } else {
            body["max_tokens"] = json!(max_tokens);
        }

        if !request.tools.is_empty() {
            debug!("build_request_body: tools not empty, adding tools");
            body["tools"] = json!(request.tools.iter().map(|t| t.to_openai_schema()).collect::<Vec<_>>());
            body["tool_choice"] = json!("auto");
        }

        body
    }

    /// Parse the OpenAI API response
    fn parse_response(&self, api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                Ok(ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    args: parse_arguments(&tc.function.arguments)?,
                })
            })
            .collect::<Result<Vec<_>, LlmError>>()?;

        let usage = api_response.usage.unwrap_or_default();
        Ok(CompletionResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            stop_reason: StopReason::from_openai(choice.finish_reason.as_deref().unwrap_or("stop")),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                cache_read_tokens: 0,
                cache_creation_tokens: 0,
            },
        })
    }
}

/// Convert the flat history into OpenAI chat messages
///
/// System messages are skipped because the rendered system prompt is
/// always sent first. Tool messages map one-to-one onto `tool` role messages.
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    debug!(message_count = %messages.len(), "convert_messages: called");
    messages
        .iter()
        .filter_map(|msg| match msg.role {
            Role::System => None,
            Role::User => Some(json!({ "role": "user", "content": msg.content })),
            Role::Tool => Some(json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
                "content": msg.content,
            })),
            Role::Assistant if msg.tool_calls.is_empty() => {
                Some(json!({ "role": "assistant", "content": msg.content }))
            }
            Role::Assistant => {
                let calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.args.to_string(),
                            }
                        })
                    })
                    .collect();
                let mut out = json!({ "role": "assistant", "tool_calls": calls });
                if !msg.content.is_empty() {
                    out["content"] = json!(msg.content);
                }
                Some(out)
            }
        })
        .collect()
}

#[async_trait]
impl LlmClient for OpenAIClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = retry::send_with_retry(|| self.post(&url, &body), self.timeout).await?;
        let api_response: OpenAIResponse = response.json().await?;
        self.parse_response(api_response)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "stream: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut body = self.build_request_body(&request);
        body["stream"] = json!(true);
        body["stream_options"] = json!({ "include_usage": true });

        let response = self.post(&url, &body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        let mut stream = response.bytes_stream();
        let mut full_content = String::new();
        // index -> (id, name, args)
        let mut partial_calls: BTreeMap<usize, (String, String, String)> = BTreeMap::new();
        let mut stop_reason = StopReason::EndTurn;
        let mut usage = TokenUsage::default();
        let mut buffer = String::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete SSE lines
            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    continue;
                }

                let chunk_data: OpenAIStreamChunk = serde_json::from_str(data)?;
                if let Some(choice) = chunk_data.choices.first() {
                    if let Some(content) = &choice.delta.content {
                        full_content.push_str(content);
                        let _ = chunk_tx.send(StreamChunk::TextDelta(content.clone())).await;
                    }

                    for tc in choice.delta.tool_calls.iter().flatten() {
                        let entry = partial_calls.entry(tc.index).or_default();

                        if let Some(id) = &tc.id {
                            entry.0 = id.clone();
                        }
                        if let Some(func) = &tc.function {
                            if let Some(name) = &func.name {
                                entry.1 = name.clone();
                                let _ = chunk_tx
                                    .send(StreamChunk::ToolUseStart {
                                        id: entry.0.clone(),
                                        name: name.clone(),
                                    })
                                    .await;
                            }
                            if let Some(args) = &func.arguments {
                                entry.2.push_str(args);
                                let _ = chunk_tx
                                    .send(StreamChunk::ToolUseDelta {
                                        id: entry.0.clone(),
                                        json_delta: args.clone(),
                                    })
                                    .await;
                            }
                        }
                    }

                    if let Some(reason) = &choice.finish_reason {
                        stop_reason = StopReason::from_openai(reason);
                    }
                }

                // Usage arrives in the final chunk when stream_options asks for it
                if let Some(u) = chunk_data.usage {
                    usage.input_tokens = u.prompt_tokens;
                    usage.output_tokens = u.completion_tokens;
                }
            }
        }

        let mut tool_calls = Vec::with_capacity(partial_calls.len());
        for (_, (id, name, args)) in partial_calls {
            tool_calls.push(ToolCall {
                id: id.clone(),
                name,
                args: parse_arguments(&args)?,
            });
            let _ = chunk_tx.send(StreamChunk::ToolUseEnd { id }).await;
        }

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

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

// Streaming types

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<OpenAIStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
