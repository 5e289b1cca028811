//! LlmClient trait definition

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CompletionRequest, CompletionResponse, LlmError, StreamChunk};

/// Stateless LLM client - each call carries the full history it needs
///
/// The planning engine keeps the conversation in the session record and
/// replays it on every call, so clients never hold conversation state.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier, used for cost accounting in logs
    fn model(&self) -> &str;

    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Streaming completion for live terminal output
    ///
    /// Sends chunks to the provided channel as they arrive.
    /// Returns the final complete response.
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    use crate::llm::{StopReason, TokenUsage, ToolCall};

    /// Scripted LLM client for unit tests
    ///
    /// Replays `responses` in order and records every request it receives.
    pub struct MockLlmClient {
        responses: Vec<CompletionResponse>,
        call_count: AtomicUsize,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Plain text response
    pub fn text(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(content.to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    /// Response requesting the given tool calls
    pub fn calls(calls: Vec<(&str, &str, serde_json::Value)>) -> CompletionResponse {
        CompletionResponse {
            content: None,
            tool_calls: calls
                .into_iter()
                .map(|(id, name, args)| ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    args,
                })
                .collect(),
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    /// Readiness verdict response
    pub fn readiness(ready: bool) -> CompletionResponse {
        text(&format!(
            r#"{{"ready": {}, "missingInformation": [], "reasoning": "scripted"}}"#,
            ready
        ))
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        fn model(&self) -> &str {
            "mock-model"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            debug!(%idx, "MockLlmClient::complete: fetching response");
            self.responses
                .get(idx)
                .cloned()
                .ok_or_else(|| LlmError::InvalidResponse("No more mock responses".to_string()))
        }

        async fn stream(
            &self,
            request: CompletionRequest,
            chunk_tx: mpsc::Sender<StreamChunk>,
        ) -> Result<CompletionResponse, LlmError> {
            let response = self.complete(request).await?;
            if let Some(content) = &response.content {
                let _ = chunk_tx.send(StreamChunk::TextDelta(content.clone())).await;
            }
            Ok(response)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn request() -> CompletionRequest {
            CompletionRequest {
                system_prompt: "Test".to_string(),
                messages: vec![],
                tools: vec![],
                max_tokens: 1000,
            }
        }

        #[tokio::test]
        async fn test_mock_client_returns_responses_in_order() {
            let client = MockLlmClient::new(vec![text("Response 1"), text("Response 2")]);

            let resp1 = client.complete(request()).await.unwrap();
            assert_eq!(resp1.content, Some("Response 1".to_string()));

            let resp2 = client.complete(request()).await.unwrap();
            assert_eq!(resp2.content, Some("Response 2".to_string()));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.requests().len(), 2);
        }

        #[tokio::test]
        async fn test_mock_client_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            assert!(client.complete(request()).await.is_err());
        }

        #[tokio::test]
        async fn test_mock_stream_forwards_text() {
            let client = MockLlmClient::new(vec![text("streamed")]);
            let (tx, mut rx) = mpsc::channel(4);
            client.stream(request(), tx).await.unwrap();
            assert!(matches!(rx.recv().await, Some(StreamChunk::TextDelta(t)) if t == "streamed"));
        }
    }
}
