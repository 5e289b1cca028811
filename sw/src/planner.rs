//! Planner - the context value every planning operation runs through
//!
//! Holds the model client, session store, snapshot provider, tool registry
//! and prompt loader. Nothing is global; tests build a `Planner` from their
//! own [`PlannerDeps`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{Config, PlanningConfig};
use crate::llm::{self, LlmClient, Message, Role, StreamChunk};
use crate::planning::{
    DocumentGenerator, Orchestrator, PlanningQuestion, ReadinessEvaluation, ReadinessEvaluator, TurnExecutor,
    TurnOutcome, parser, question_for,
};
use crate::prompts::{PromptContext, PromptLoader};
use crate::session::{
    DecisionDocument, FeatureRequest, FileSessionStore, SessionError, SessionLifecycle, SessionListing,
    SessionPhase, SessionRecord, SessionStore, WorkflowKind,
};
use crate::snapshot::{Fingerprinter, SnapshotProvider, WalkdirPacker};
use crate::tools::{ToolDescriptor, ToolRegistry};

/// Tool result recorded for a question the user never answered
const UNANSWERED: &str = "The user ended the interview without answering.";

/// Everything a [`Planner`] depends on
pub struct PlannerDeps {
    pub llm: Arc<dyn LlmClient>,
    pub store: Arc<dyn SessionStore>,
    pub snapshots: Arc<dyn SnapshotProvider>,
    pub fingerprinter: Arc<Fingerprinter>,
    pub tools: ToolRegistry,
    pub prompts: Arc<PromptLoader>,
}

/// A new planning request
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub feature: String,
    /// Subdirectory of the working tree to pack
    pub subpath: Option<String>,
    /// Defaults to the configured workflow
    pub kind: Option<WorkflowKind>,
}

impl StartRequest {
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            subpath: None,
            kind: None,
        }
    }
}

/// Result of a planning call: which session, and where it stands
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub id: String,
    pub outcome: TurnOutcome,
}

/// Where a session stands before document generation
enum Generation {
    Ready(SessionLifecycle),
    Done(DecisionDocument),
}

pub struct Planner {
    root: PathBuf,
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn SessionStore>,
    snapshots: Arc<dyn SnapshotProvider>,
    fingerprinter: Arc<Fingerprinter>,
    prompts: Arc<PromptLoader>,
    tools: ToolRegistry,
    tools_discovered: bool,
    executor: TurnExecutor,
    readiness: ReadinessEvaluator,
    documents: DocumentGenerator,
    max_turns: usize,
    default_kind: WorkflowKind,
}

impl Planner {
    /// Build a planner from explicit dependencies
    ///
    /// `root` is the working tree new sessions are started in.
    pub fn new(deps: PlannerDeps, planning: &PlanningConfig, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "Planner::new: called");
        Self {
            executor: TurnExecutor::new(deps.llm.clone(), planning.turn_max_tokens),
            readiness: ReadinessEvaluator::new(deps.llm.clone(), deps.prompts.clone(), planning.readiness_max_tokens),
            documents: DocumentGenerator::new(deps.llm.clone(), deps.prompts.clone(), planning.document_max_tokens),
            root,
            llm: deps.llm,
            store: deps.store,
            snapshots: deps.snapshots,
            fingerprinter: deps.fingerprinter,
            prompts: deps.prompts,
            tools: deps.tools,
            tools_discovered: false,
            max_turns: planning.max_turns as usize,
            default_kind: planning.workflow,
        }
    }

    /// Build the production planner: configured model, file store, walkdir
    /// packer and MCP servers
    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        let llm = llm::create_client(&config.llm).context("Failed to create LLM client")?;
        let deps = PlannerDeps {
            llm,
            store: Arc::new(FileSessionStore::new(config.storage.sessions_path())),
            snapshots: Arc::new(WalkdirPacker::from_config(&config.snapshot).context("Invalid snapshot config")?),
            fingerprinter: Arc::new(Fingerprinter::from_config(&config.snapshot).context("Invalid snapshot config")?),
            tools: ToolRegistry::from_config(&config.tools, root),
            prompts: Arc::new(PromptLoader::new(root)),
        };
        Ok(Self::new(deps, &config.planning, root))
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(&self.executor, &self.readiness, &self.tools, self.max_turns)
    }

    fn framing(&self, record: &SessionRecord) -> Result<String> {
        let context = PromptContext::new(&record.feature_data.description, record.workflow_kind);
        self.prompts.render("system", &context)
    }

    fn lifecycle(&self, record: SessionRecord) -> Result<SessionLifecycle> {
        let framing = self.framing(&record)?;
        Ok(SessionLifecycle::new(
            record,
            self.store.clone(),
            self.snapshots.clone(),
            self.fingerprinter.clone(),
            framing,
        ))
    }

    async fn ensure_tools(&mut self) {
        if !self.tools_discovered {
            let count = self.tools.discover().await.len();
            info!(tools = %count, providers = %self.tools.provider_count(), "Tool catalogue discovered");
            self.tools_discovered = true;
        }
    }

    /// Load a stored record without touching it
    pub async fn load_session(&self, id: &str) -> Result<SessionRecord> {
        let record = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
        Ok(record)
    }

    /// Load a session and bring its snapshot up to date
    ///
    /// The snapshot is only repacked when the working-tree fingerprint no
    /// longer matches the stored one.
    async fn open(&self, id: &str) -> Result<SessionLifecycle> {
        let record = self.load_session(id).await?;
        let mut session = self.lifecycle(record)?;

        if session.phase() < SessionPhase::ChatInitialized {
            seed(&mut session).await?;
        } else if session.phase() < SessionPhase::GenerationReady && session.sync_snapshot().await? {
            session.checkpoint().await?;
        }
        Ok(session)
    }

    /// Start a new session and run its first turn
    pub async fn start_session(&mut self, request: StartRequest) -> Result<SessionUpdate> {
        debug!(feature = %request.feature, "start_session: called");
        let kind = request.kind.unwrap_or(self.default_kind);
        let feature = FeatureRequest::new(request.feature.trim(), self.root.clone()).with_subpath(request.subpath);
        let record = SessionRecord::new(feature, kind);
        info!(id = %record.id, %kind, "Starting planning session");

        let mut session = self.lifecycle(record)?;
        seed(&mut session).await?;

        self.ensure_tools().await;
        let outcome = self.orchestrator().run_turn(&mut session).await?;
        Ok(SessionUpdate {
            id: session.id().to_string(),
            outcome,
        })
    }

    /// Feed the user's reply into a session and run the next turn
    ///
    /// A numeric reply to a question with options selects that option.
    pub async fn continue_session(&mut self, id: &str, reply: &str) -> Result<SessionUpdate> {
        debug!(%id, "continue_session: called");
        let mut session = self.open(id).await?;
        self.ensure_tools().await;

        let outcome = match session.pending() {
            Some(pending) => {
                let answer = question_for(pending).resolve_reply(reply);
                self.orchestrator().resume(&mut session, &answer).await?
            }
            None => {
                let answer = last_question(session.record())
                    .map(|q| q.resolve_reply(reply))
                    .unwrap_or_else(|| reply.trim().to_string());
                session.append(Message::user(answer))?;
                session.checkpoint().await?;
                self.orchestrator().run_turn(&mut session).await?
            }
        };

        Ok(SessionUpdate {
            id: id.to_string(),
            outcome,
        })
    }

    /// Reopen a stored session and report where it stands
    ///
    /// A session interrupted before the model answered runs its turn again
    /// from the stored history.
    pub async fn resume_session(&mut self, id: &str) -> Result<SessionUpdate> {
        debug!(%id, "resume_session: called");
        let mut session = self.open(id).await?;

        let outcome = if let Some(pending) = session.pending() {
            TurnOutcome::Question(question_for(pending))
        } else if session.phase() >= SessionPhase::GenerationReady {
            TurnOutcome::ReadyForGeneration(ReadinessEvaluation {
                ready: true,
                missing_information: Vec::new(),
                reasoning: format!("session is {}", session.phase()),
            })
        } else if let Some(question) = last_question(session.record()) {
            TurnOutcome::Question(question)
        } else {
            self.ensure_tools().await;
            self.orchestrator().run_turn(&mut session).await?
        };

        Ok(SessionUpdate {
            id: id.to_string(),
            outcome,
        })
    }

    /// End the interview on the user's request
    ///
    /// An open question is answered with a fixed note so every tool call keeps
    /// its result.
    pub async fn mark_ready(&mut self, id: &str) -> Result<ReadinessEvaluation> {
        debug!(%id, "mark_ready: called");
        let mut session = self.open(id).await?;
        if session.phase() >= SessionPhase::GenerationReady {
            return Ok(ReadinessEvaluation::forced());
        }

        if let Some(pending) = session.take_pending()? {
            session.append(Message::tool(pending.tool_call_id, UNANSWERED, false))?;
            for call in pending.deferred {
                session.append(Message::tool(call.id, "Skipped: the interview ended.", true))?;
            }
        }
        session.transition_to(SessionPhase::GenerationReady).await?;
        info!(%id, "Session marked ready by user");
        Ok(ReadinessEvaluation::forced())
    }

    async fn prepare_generation(&self, id: &str) -> Result<Generation> {
        let record = self.load_session(id).await?;
        if record.phase() == SessionPhase::Completed {
            let document = record.document.clone().ok_or_else(|| SessionError::Corruption {
                id: id.to_string(),
                reason: "completed session has no document".to_string(),
            })?;
            return Ok(Generation::Done(document));
        }
        if record.phase() < SessionPhase::GenerationReady {
            return Err(SessionError::NotReady {
                id: id.to_string(),
                phase: record.phase(),
            }
            .into());
        }
        Ok(Generation::Ready(self.lifecycle(record)?))
    }

    async fn complete(&self, mut session: SessionLifecycle, document: DecisionDocument) -> Result<DecisionDocument> {
        session.set_document(document.clone())?;
        session.transition_to(SessionPhase::Completed).await?;
        info!(id = %session.id(), title = %document.title, "Session completed");
        Ok(document)
    }

    /// Write the decision document for a ready session
    ///
    /// A completed session returns its stored document without a model call.
    pub async fn generate_document(&self, id: &str) -> Result<DecisionDocument> {
        debug!(%id, "generate_document: called");
        let session = match self.prepare_generation(id).await? {
            Generation::Ready(session) => session,
            Generation::Done(existing) => return Ok(existing),
        };
        let document = self.documents.generate(session.record()).await?;
        self.complete(session, document).await
    }

    /// Like [`generate_document`](Self::generate_document), streaming text
    /// deltas to `chunk_tx` as they arrive
    pub async fn generate_document_streaming(
        &self,
        id: &str,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<DecisionDocument> {
        debug!(%id, "generate_document_streaming: called");
        let session = match self.prepare_generation(id).await? {
            Generation::Ready(session) => session,
            Generation::Done(existing) => {
                let _ = chunk_tx.send(StreamChunk::TextDelta(existing.content.clone())).await;
                return Ok(existing);
            }
        };
        let document = self.documents.generate_streaming(session.record(), chunk_tx).await?;
        self.complete(session, document).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionListing>> {
        Ok(self.store.list().await?)
    }

    /// Re-run tool discovery against every provider
    pub async fn refresh_tools(&mut self) -> Vec<ToolDescriptor> {
        self.tools_discovered = true;
        self.tools.refresh().await.to_vec()
    }

    /// Disconnect tool providers
    pub async fn shutdown(&mut self) {
        self.tools.shutdown().await;
    }
}

/// Pack, frame and open the conversation with the feature request
async fn seed(session: &mut SessionLifecycle) -> Result<()> {
    session.transition_to(SessionPhase::ChatInitialized).await?;
    if session.record().history().count(Role::User) == 0 {
        let description = session.record().feature_data.description.clone();
        session.append(Message::user(description))?;
        session.checkpoint().await?;
    }
    Ok(())
}

/// The question in the last assistant message, if the history ends with one
fn last_question(record: &SessionRecord) -> Option<PlanningQuestion> {
    record
        .history()
        .last()
        .filter(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
        .map(|m| parser::parse(&m.content))
}
