//! Turn executor
//!
//! One model call per planning iteration. The request carries the framing,
//! the current codebase snapshot, the non-system history and every tool the
//! model may call, including the two human pseudo-tools.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use super::parser::{self, PlanningQuestion, QuestionOption};
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, Role, ToolDefinition};
use crate::session::{PendingInteraction, SessionRecord};
use crate::tools::{ASK_HUMAN, PRESENT_CHOICE};

/// Definition of the free-form question pseudo-tool
pub fn ask_human_definition() -> ToolDefinition {
    ToolDefinition::new(
        ASK_HUMAN,
        "Ask the user a free-form question and wait for the answer.",
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "description": "The question, in Markdown"}
            },
            "required": ["question"]
        }),
    )
}

/// Definition of the multiple-choice pseudo-tool
pub fn present_choice_definition() -> ToolDefinition {
    ToolDefinition::new(
        PRESENT_CHOICE,
        "Ask the user to pick one of several options and wait for the choice.",
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string"},
                "options": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": {"type": "string"},
                            "description": {"type": "string"},
                            "recommended": {"type": "boolean"}
                        },
                        "required": ["title"]
                    }
                }
            },
            "required": ["question", "options"]
        }),
    )
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Rebuild the question a suspended pseudo-call asks
///
/// Arguments come straight from the model, so missing fields degrade to
/// empty text instead of failing.
pub fn question_for(pending: &PendingInteraction) -> PlanningQuestion {
    let question = str_field(&pending.args, "question");
    if pending.tool_name != PRESENT_CHOICE {
        return parser::parse(question);
    }

    let options = pending
        .args
        .get("options")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| QuestionOption {
                    id: (i + 1).to_string(),
                    title: item.as_str().unwrap_or_else(|| str_field(item, "title")).to_string(),
                    description: str_field(item, "description").to_string(),
                    recommended: item.get("recommended").and_then(Value::as_bool).unwrap_or(false),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut question = PlanningQuestion {
        header: String::new(),
        body_text: String::new(),
        option_prompt: Some(question.to_string()),
        options,
    };
    question.normalize_recommendation();
    question
}

/// Makes the model call for one planning iteration
pub struct TurnExecutor {
    llm: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl TurnExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    /// Build the request for `record` with the given external tools
    pub fn build_request(&self, record: &SessionRecord, external: Vec<ToolDefinition>) -> CompletionRequest {
        let messages = record.history().messages();

        let mut system_prompt = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        if let Some(content) = &record.codebase_content {
            system_prompt.push_str("\n\n## Codebase\n\n<codebase>\n");
            system_prompt.push_str(content);
            system_prompt.push_str("</codebase>\n");
        }

        let mut tools = vec![ask_human_definition(), present_choice_definition()];
        tools.extend(external);

        CompletionRequest {
            system_prompt,
            messages: messages.iter().filter(|m| m.role != Role::System).cloned().collect(),
            tools,
            max_tokens: self.max_tokens,
        }
    }

    /// Call the model once and return the assistant message
    pub async fn execute(&self, record: &SessionRecord, external: Vec<ToolDefinition>) -> Result<Message, LlmError> {
        debug!(id = %record.id, len = %record.history().len(), "execute: called");
        let request = self.build_request(record, external);
        let response = self.llm.complete(request).await?;
        info!(
            id = %record.id,
            input_tokens = %response.usage.input_tokens,
            output_tokens = %response.usage.output_tokens,
            cost_usd = %format!("{:.4}", response.usage.cost_usd(self.llm.model())),
            tool_calls = %response.tool_calls.len(),
            "Model turn complete"
        );
        Ok(response.into_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::{self, MockLlmClient};
    use crate::session::{FeatureRequest, WorkflowKind};

    fn record() -> SessionRecord {
        let mut record = SessionRecord::new(FeatureRequest::new("add dark mode toggle", "/repo"), WorkflowKind::Adr);
        record.codebase_content = Some("<file path=\"a.rs\">\nfn a() {}\n</file>\n".to_string());
        record.chat_history.append(Message::system("framing"));
        record.chat_history.append(Message::user("add dark mode toggle"));
        record
    }

    #[test]
    fn test_build_request_splits_system_and_injects_codebase() {
        let executor = TurnExecutor::new(Arc::new(MockLlmClient::new(vec![])), 4096);
        let external = vec![ToolDefinition::new("search", "Search docs", json!({"type": "object"}))];

        let request = executor.build_request(&record(), external);

        assert!(request.system_prompt.starts_with("framing"));
        assert!(request.system_prompt.contains("<file path=\"a.rs\">"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        let names: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![ASK_HUMAN, PRESENT_CHOICE, "search"]);
    }

    #[tokio::test]
    async fn test_execute_returns_assistant_message() {
        let llm = Arc::new(MockLlmClient::new(vec![mock::calls(vec![(
            "c1",
            ASK_HUMAN,
            json!({"question": "Per user?"}),
        )])]));
        let executor = TurnExecutor::new(llm.clone(), 4096);

        let message = executor.execute(&record(), vec![]).await.unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.tool_calls[0].id, "c1");
        assert_eq!(llm.call_count(), 1);
    }

    #[test]
    fn test_question_for_present_choice() {
        let pending = PendingInteraction {
            tool_call_id: "c1".to_string(),
            tool_name: PRESENT_CHOICE.to_string(),
            args: json!({
                "question": "Where should the preference live?",
                "options": [
                    {"title": "Local storage"},
                    {"title": "Profile", "description": "syncs", "recommended": true},
                    "System only"
                ]
            }),
            deferred: vec![],
        };

        let q = question_for(&pending);
        assert_eq!(q.option_prompt.as_deref(), Some("Where should the preference live?"));
        assert_eq!(q.options.len(), 3);
        assert_eq!(q.options[2].title, "System only");
        assert!(q.options[1].recommended);
        assert!(!q.options[0].recommended);
        assert_eq!(q.resolve_reply("2"), "Profile");
    }

    #[test]
    fn test_question_for_ask_human_parses_markdown() {
        let pending = PendingInteraction {
            tool_call_id: "c1".to_string(),
            tool_name: ASK_HUMAN.to_string(),
            args: json!({"question": "# Scope\n\nShould the toggle be per user?"}),
            deferred: vec![],
        };
        let q = question_for(&pending);
        assert_eq!(q.header, "Scope");
        assert_eq!(q.body_text, "Should the toggle be per user?");
    }
}
