//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::session::WorkflowKind;
use crate::tools::{ASK_HUMAN, PRESENT_CHOICE};

/// Variables available to every template
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    /// The feature request as the user wrote it
    pub feature: String,
    /// Article + document name, e.g. "an architecture decision record"
    pub document_name: String,
    /// Rendered conversation transcript
    pub transcript: String,
    /// One-paragraph codebase summary
    pub codebase_summary: String,
    /// Current date (YYYY-MM-DD)
    pub today: String,
    pub ask_human: String,
    pub present_choice: String,
}

impl PromptContext {
    pub fn new(feature: impl Into<String>, kind: WorkflowKind) -> Self {
        Self {
            feature: feature.into(),
            document_name: kind.document_name().to_string(),
            today: chrono::Local::now().format("%Y-%m-%d").to_string(),
            ask_human: ASK_HUMAN.to_string(),
            present_choice: PRESENT_CHOICE.to_string(),
            ..Default::default()
        }
    }

    pub fn with_transcript(mut self, transcript: String) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_codebase_summary(mut self, summary: String) -> Self {
        self.codebase_summary = summary;
        self
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (`.specwright/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `<worktree>/.specwright/prompts/` first
    pub fn new(worktree: impl AsRef<Path>) -> Self {
        let user_dir = worktree.as_ref().join(".specwright/prompts");
        let exists = user_dir.is_dir();
        debug!(?user_dir, %exists, "PromptLoader::new: called");

        Self {
            hbs: Self::engine(),
            user_dir: exists.then_some(user_dir),
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Plain-text prompts, no HTML escaping
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `.specwright/prompts/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}
