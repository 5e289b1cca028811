//! Decision document generation

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{PlanningError, transcript};
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, Message, StreamChunk};
use crate::prompts::{PromptContext, PromptLoader};
use crate::session::{DecisionDocument, SessionRecord};

const WRITER_SYSTEM_PROMPT: &str = "You write precise technical documents in Markdown. \
     Output only the document, with no preamble.";

/// Title from the first header, without a leading `ADR:` or `PRD:`
fn extract_title(content: &str, fallback: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix('#'))
        .map(|rest| rest.trim_start_matches('#').trim())
        .map(|title| {
            ["ADR:", "PRD:"]
                .iter()
                .find_map(|prefix| title.strip_prefix(prefix))
                .unwrap_or(title)
                .trim()
                .to_string()
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Renders the document template and asks the model to write it
pub struct DocumentGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl DocumentGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            max_tokens,
        }
    }

    fn request(&self, record: &SessionRecord) -> Result<CompletionRequest, PlanningError> {
        let summary = record
            .codebase_summary
            .as_ref()
            .map(|s| s.describe())
            .unwrap_or_else(|| "No codebase snapshot was taken.".to_string());
        let context = PromptContext::new(&record.feature_data.description, record.workflow_kind)
            .with_transcript(transcript::render(record.history().messages()))
            .with_codebase_summary(summary);
        let prompt = self
            .prompts
            .render(record.workflow_kind.template_name(), &context)
            .map_err(|e| PlanningError::Prompt(e.to_string()))?;

        Ok(CompletionRequest {
            system_prompt: WRITER_SYSTEM_PROMPT.to_string(),
            messages: vec![Message::user(prompt)],
            tools: Vec::new(),
            max_tokens: self.max_tokens,
        })
    }

    fn finish(&self, record: &SessionRecord, response: CompletionResponse) -> DecisionDocument {
        let content = response.content.unwrap_or_default().trim().to_string();
        let title = extract_title(&content, &record.display_name());
        info!(
            id = %record.id,
            kind = %record.workflow_kind,
            %title,
            output_tokens = %response.usage.output_tokens,
            "Document generated"
        );
        DecisionDocument {
            kind: record.workflow_kind,
            title,
            content,
            generated_at: Utc::now(),
        }
    }

    pub async fn generate(&self, record: &SessionRecord) -> Result<DecisionDocument, PlanningError> {
        debug!(id = %record.id, "generate: called");
        let response = self.llm.complete(self.request(record)?).await?;
        Ok(self.finish(record, response))
    }

    /// Like [`generate`](Self::generate), forwarding text deltas to `chunk_tx`
    pub async fn generate_streaming(
        &self,
        record: &SessionRecord,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<DecisionDocument, PlanningError> {
        debug!(id = %record.id, "generate_streaming: called");
        let response = self.llm.stream(self.request(record)?, chunk_tx).await?;
        Ok(self.finish(record, response))
    }
}
