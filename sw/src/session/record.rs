//! Persisted session record

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SessionPhase;
use crate::llm::{Message, Role, ToolCall};
use crate::snapshot::SnapshotSummary;

/// Which decision document a session produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    /// Architecture decision record
    #[default]
    Adr,
    /// Product requirements document
    Prd,
}

impl WorkflowKind {
    /// Name with article, used in prompts
    pub fn document_name(&self) -> &'static str {
        match self {
            Self::Adr => "an architecture decision record",
            Self::Prd => "a product requirements document",
        }
    }

    /// Template rendered to generate the document
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Adr => "document-adr",
            Self::Prd => "document-prd",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adr => f.write_str("adr"),
            Self::Prd => f.write_str("prd"),
        }
    }
}

impl FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adr" => Ok(Self::Adr),
            "prd" => Ok(Self::Prd),
            other => Err(format!("unknown workflow kind '{other}' (expected adr or prd)")),
        }
    }
}

/// What the user asked to plan, and where
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRequest {
    pub description: String,

    /// Absolute root of the working tree the session was started in
    pub root: PathBuf,

    /// Optional subdirectory of `root` to pack instead of the whole tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
}

impl FeatureRequest {
    pub fn new(description: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            description: description.into(),
            root: root.into(),
            subpath: None,
        }
    }

    pub fn with_subpath(mut self, subpath: Option<String>) -> Self {
        self.subpath = subpath.filter(|s| !s.trim().is_empty());
        self
    }

    /// Directory packed and fingerprinted for this request
    pub fn snapshot_dir(&self) -> PathBuf {
        match &self.subpath {
            Some(sub) => self.root.join(sub),
            None => self.root.clone(),
        }
    }
}

/// Ordered conversation history that only grows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<Message>);

impl History {
    pub fn append(&mut self, message: Message) {
        self.0.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.0.last()
    }

    /// Number of messages with the given role
    pub fn count(&self, role: Role) -> usize {
        self.0.iter().filter(|m| m.role == role).count()
    }
}

/// A reserved pseudo-tool call waiting for the human
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInteraction {
    /// Call id the human's reply answers
    pub tool_call_id: String,

    /// `ask-human` or `present-choice`
    pub tool_name: String,

    /// Arguments as the model sent them
    pub args: Value,

    /// Calls from the same batch that come after the pseudo-call
    #[serde(default)]
    pub deferred: Vec<ToolCall>,
}

/// Generated decision document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionDocument {
    pub kind: WorkflowKind,
    pub title: String,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

/// One self-describing JSON document per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub feature_data: FeatureRequest,
    #[serde(default)]
    pub workflow_kind: WorkflowKind,
    #[serde(default)]
    pub chat_history: History,
    pub machine_state: SessionPhase,
    #[serde(default)]
    pub codebase_content: Option<String>,
    #[serde(default)]
    pub codebase_hash: Option<String>,
    #[serde(default)]
    pub codebase_summary: Option<SnapshotSummary>,
    #[serde(default)]
    pub pending: Option<PendingInteraction>,
    #[serde(default)]
    pub document: Option<DecisionDocument>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl SessionRecord {
    /// Create an empty record in the `Fresh` phase
    pub fn new(feature: FeatureRequest, workflow_kind: WorkflowKind) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            feature_data: feature,
            workflow_kind,
            chat_history: History::default(),
            machine_state: SessionPhase::Fresh,
            codebase_content: None,
            codebase_hash: None,
            codebase_summary: None,
            pending: None,
            document: None,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine_state
    }

    pub fn history(&self) -> &History {
        &self.chat_history
    }

    /// Short label for listings: the feature request's first line, truncated
    pub fn display_name(&self) -> String {
        const MAX_CHARS: usize = 60;
        let first_line = self.feature_data.description.lines().next().unwrap_or_default().trim();
        if first_line.chars().count() > MAX_CHARS {
            let truncated: String = first_line.chars().take(MAX_CHARS - 3).collect();
            format!("{truncated}...")
        } else {
            first_line.to_string()
        }
    }
}
