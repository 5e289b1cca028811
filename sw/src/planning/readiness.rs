//! Readiness evaluator
//!
//! Asks the model for a strict JSON verdict on whether the interview has
//! gathered enough to write the document. Verdicts are never cached.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{PlanningError, transcript};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{PromptContext, PromptLoader};
use crate::session::SessionRecord;

/// Missing-information entry used when the verdict cannot be decoded
pub const UNABLE_TO_EVALUATE: &str = "unable to evaluate readiness";

/// The model's verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReadinessEvaluation {
    pub ready: bool,
    pub missing_information: Vec<String>,
    pub reasoning: String,
}

impl ReadinessEvaluation {
    /// Conservative verdict for an undecodable reply
    pub fn undecodable(reason: impl Into<String>) -> Self {
        Self {
            ready: false,
            missing_information: vec![UNABLE_TO_EVALUATE.to_string()],
            reasoning: reason.into(),
        }
    }

    /// Verdict recorded when the user ends the interview
    pub fn forced() -> Self {
        Self {
            ready: true,
            missing_information: Vec::new(),
            reasoning: "marked ready by the user".to_string(),
        }
    }
}

/// Remove an optional surrounding Markdown code fence
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Decode a verdict, falling back to not-ready on any malformed reply
pub fn decode(text: &str) -> ReadinessEvaluation {
    match serde_json::from_str::<ReadinessEvaluation>(strip_code_fence(text)) {
        Ok(evaluation) => evaluation,
        Err(e) => {
            warn!(error = %e, "Readiness verdict could not be decoded");
            ReadinessEvaluation::undecodable(format!("readiness reply was not the expected JSON object: {e}"))
        }
    }
}

/// Runs readiness checks against a session's history
pub struct ReadinessEvaluator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl ReadinessEvaluator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            max_tokens,
        }
    }

    /// Evaluate the full history of `record`
    pub async fn evaluate(&self, record: &SessionRecord) -> Result<ReadinessEvaluation, PlanningError> {
        debug!(id = %record.id, len = %record.history().len(), "evaluate: called");
        let context = PromptContext::new(&record.feature_data.description, record.workflow_kind)
            .with_transcript(transcript::render(record.history().messages()));
        let prompt = self
            .prompts
            .render("readiness", &context)
            .map_err(|e| PlanningError::Prompt(e.to_string()))?;

        let request = CompletionRequest {
            system_prompt: prompt,
            messages: vec![Message::user("Return your verdict as the JSON object described above.")],
            tools: Vec::new(),
            max_tokens: self.max_tokens,
        };
        let response = self.llm.complete(request).await?;
        let evaluation = decode(response.content.as_deref().unwrap_or_default());
        info!(
            id = %record.id,
            ready = %evaluation.ready,
            missing = %evaluation.missing_information.len(),
            "Readiness evaluated"
        );
        Ok(evaluation)
    }
}
