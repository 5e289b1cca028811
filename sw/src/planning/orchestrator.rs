//! Conversation orchestrator
//!
//! Drives one planning turn: readiness check, model call, tool dispatch,
//! repeated until the model asks the user something, the interview is ready,
//! or the turn budget runs out.

use tracing::{debug, info, warn};

use super::executor::{self, TurnExecutor};
use super::parser::{self, PlanningQuestion};
use super::readiness::{ReadinessEvaluation, ReadinessEvaluator};
use super::PlanningError;
use crate::llm::{Message, ToolCall};
use crate::session::{PendingInteraction, SessionLifecycle, SessionPhase};
use crate::tools::{RESERVED_TOOL_NAMES, ToolRegistry};

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The user has to answer before planning continues
    Question(PlanningQuestion),

    /// Enough is known; the session is in `GenerationReady`
    ReadyForGeneration(ReadinessEvaluation),
}

/// Borrowed view over the pieces one turn needs
pub struct Orchestrator<'a> {
    executor: &'a TurnExecutor,
    readiness: &'a ReadinessEvaluator,
    tools: &'a ToolRegistry,
    max_turns: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        executor: &'a TurnExecutor,
        readiness: &'a ReadinessEvaluator,
        tools: &'a ToolRegistry,
        max_turns: usize,
    ) -> Self {
        Self {
            executor,
            readiness,
            tools,
            max_turns,
        }
    }

    /// Run iterations until a question, readiness, or the budget is reached
    ///
    /// The record is checkpointed after every iteration, so a
    /// `MaxTurnsExceeded` error leaves the last consistent state persisted.
    pub async fn run_turn(&self, session: &mut SessionLifecycle) -> Result<TurnOutcome, PlanningError> {
        debug!(id = %session.id(), phase = %session.phase(), "run_turn: called");
        if session.pending().is_some() {
            return Err(PlanningError::AwaitingAnswer {
                id: session.id().to_string(),
            });
        }
        if session.phase() >= SessionPhase::GenerationReady {
            return Ok(TurnOutcome::ReadyForGeneration(ReadinessEvaluation {
                ready: true,
                missing_information: Vec::new(),
                reasoning: "session is already ready for generation".to_string(),
            }));
        }
        session.transition_to(SessionPhase::Planning).await?;

        for iteration in 1..=self.max_turns {
            debug!(%iteration, "run_turn: iteration");

            let evaluation = self.readiness.evaluate(session.record()).await?;
            if evaluation.ready {
                session.transition_to(SessionPhase::GenerationReady).await?;
                info!(id = %session.id(), %iteration, "Interview ready for generation");
                return Ok(TurnOutcome::ReadyForGeneration(evaluation));
            }

            let message = self.executor.execute(session.record(), self.tools.definitions()).await?;
            let calls = message.tool_calls.clone();
            let content = message.content.clone();
            session.append(message)?;

            if calls.is_empty() {
                session.checkpoint().await?;
                return Ok(TurnOutcome::Question(parser::parse(&content)));
            }

            if let Some(question) = self.dispatch(session, calls).await? {
                return Ok(TurnOutcome::Question(question));
            }
            session.checkpoint().await?;
        }

        warn!(id = %session.id(), turns = %self.max_turns, "Turn budget exhausted");
        Err(PlanningError::MaxTurnsExceeded { turns: self.max_turns })
    }

    /// Answer the suspended pseudo-call with `reply` and keep planning
    pub async fn resume(&self, session: &mut SessionLifecycle, reply: &str) -> Result<TurnOutcome, PlanningError> {
        debug!(id = %session.id(), "resume: called");
        let pending = session.take_pending()?.ok_or_else(|| PlanningError::NothingPending {
            id: session.id().to_string(),
        })?;

        session.append(Message::tool(&pending.tool_call_id, reply, false))?;
        if let Some(question) = self.dispatch(session, pending.deferred).await? {
            return Ok(TurnOutcome::Question(question));
        }
        session.checkpoint().await?;

        self.run_turn(session).await
    }

    /// Run `calls` in order, suspending at the first pseudo-call
    ///
    /// Returns the question when suspended. Calls after the pseudo-call are
    /// stored with it and dispatched on resume.
    async fn dispatch(
        &self,
        session: &mut SessionLifecycle,
        calls: Vec<ToolCall>,
    ) -> Result<Option<PlanningQuestion>, PlanningError> {
        let mut calls = calls.into_iter();
        while let Some(call) = calls.next() {
            if RESERVED_TOOL_NAMES.contains(&call.name.as_str()) {
                let pending = PendingInteraction {
                    tool_call_id: call.id,
                    tool_name: call.name,
                    args: call.args,
                    deferred: calls.collect(),
                };
                let question = executor::question_for(&pending);
                info!(
                    id = %session.id(),
                    tool = %pending.tool_name,
                    deferred = %pending.deferred.len(),
                    "Suspending for user input"
                );
                session.set_pending(pending)?;
                session.checkpoint().await?;
                return Ok(Some(question));
            }

            debug!(tool = %call.name, id = %call.id, "dispatch: invoking tool");
            let result = self.tools.invoke(&call.name, call.args).await;
            session.append(Message::tool(call.id, result.content, result.is_error))?;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::SnapshotConfig;
    use crate::llm::client::mock::{self, MockLlmClient};
    use crate::llm::{CompletionResponse, Role};
    use crate::prompts::PromptLoader;
    use crate::session::{FeatureRequest, FileSessionStore, SessionRecord, SessionStore, WorkflowKind};
    use crate::snapshot::Fingerprinter;
    use crate::snapshot::mock::MockSnapshotProvider;
    use crate::tools::mock::MockToolProvider;
    use crate::tools::{ASK_HUMAN, PRESENT_CHOICE};

    const QUESTION: &str = "\
# Theme storage

**Where should the preference live?**

1. **Local storage** - per browser
2. **User profile** - syncs
3. **System only** - nothing stored
";

    struct Harness {
        _tree: tempfile::TempDir,
        _store_dir: tempfile::TempDir,
        store: Arc<FileSessionStore>,
        llm: Arc<MockLlmClient>,
        executor: TurnExecutor,
        readiness: ReadinessEvaluator,
        tools: ToolRegistry,
        session: SessionLifecycle,
    }

    async fn harness(responses: Vec<CompletionResponse>) -> Harness {
        let tree = tempfile::tempdir().unwrap();
        std::fs::write(tree.path().join("app.js"), "export const theme = 'light';\n").unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileSessionStore::new(store_dir.path()));

        let llm = Arc::new(MockLlmClient::new(responses));
        let prompts = Arc::new(PromptLoader::embedded_only());

        let mut tools = ToolRegistry::new();
        tools.add_provider(Box::new(
            MockToolProvider::new("docs")
                .tool(
                    "search",
                    json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": ["q"]}),
                    "found: theme.css",
                )
                .failing_tool("broken", "backend down"),
        ));
        tools.discover().await;

        let record = SessionRecord::new(FeatureRequest::new("add dark mode toggle", tree.path()), WorkflowKind::Adr);
        let mut session = SessionLifecycle::new(
            record,
            store.clone(),
            Arc::new(MockSnapshotProvider::new("packed")),
            Arc::new(Fingerprinter::from_config(&SnapshotConfig::default()).unwrap()),
            "framing".to_string(),
        );
        session.transition_to(SessionPhase::ChatInitialized).await.unwrap();
        session.append(Message::user("add dark mode toggle")).unwrap();

        Harness {
            executor: TurnExecutor::new(llm.clone(), 4096),
            readiness: ReadinessEvaluator::new(llm.clone(), prompts, 1024),
            _tree: tree,
            _store_dir: store_dir,
            store,
            llm,
            tools,
            session,
        }
    }

    /// Every tool call id is answered exactly once
    fn assert_calls_answered(messages: &[Message]) {
        let calls: Vec<&str> = messages
            .iter()
            .flat_map(|m| m.tool_calls.iter().map(|c| c.id.as_str()))
            .collect();
        let answers: Vec<&str> = messages.iter().filter_map(|m| m.tool_call_id.as_deref()).collect();
        assert_eq!(calls.len(), answers.len());
        assert_eq!(
            calls.iter().collect::<HashSet<_>>(),
            answers.iter().collect::<HashSet<_>>()
        );
    }

    #[tokio::test]
    async fn test_first_turn_returns_parsed_question() {
        let mut h = harness(vec![mock::readiness(false), mock::text(QUESTION)]).await;
        let orchestrator = Orchestrator::new(&h.executor, &h.readiness, &h.tools, 10);

        let outcome = orchestrator.run_turn(&mut h.session).await.unwrap();

        let TurnOutcome::Question(q) = outcome else {
            panic!("expected a question");
        };
        assert_eq!(q.header, "Theme storage");
        assert_eq!(q.options.len(), 3);
        assert!(q.options[0].recommended);
        assert_eq!(h.session.record().history().count(Role::Assistant), 1);
        assert_eq!(h.session.phase(), SessionPhase::Planning);
    }

    #[tokio::test]
    async fn test_ordinary_tools_run_in_order_then_continue() {
        let mut h = harness(vec![
            mock::readiness(false),
            mock::calls(vec![
                ("c1", "search", json!({"q": "theme"})),
                ("c2", "broken", json!({})),
                ("c3", "search", json!({"q": 5})),
                ("c4", "missing", json!({})),
            ]),
            mock::readiness(false),
            mock::text("Which browsers matter?"),
        ])
        .await;
        let orchestrator = Orchestrator::new(&h.executor, &h.readiness, &h.tools, 10);

        orchestrator.run_turn(&mut h.session).await.unwrap();

        let messages = h.session.record().history().messages();
        let results: Vec<&Message> = messages.iter().filter(|m| m.role == Role::Tool).collect();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(results[0].content, "found: theme.css");
        assert!(!results[0].is_error);
        assert!(results[1].is_error);
        assert!(results[2].content.starts_with("Invalid arguments for 'search'"));
        assert_eq!(results[3].content, "Tool not found: missing");
        assert_calls_answered(messages);
    }

    #[tokio::test]
    async fn test_pseudo_call_suspends_and_defers_rest() {
        let mut h = harness(vec![
            mock::readiness(false),
            mock::calls(vec![
                ("c1", "search", json!({"q": "theme"})),
                ("c2", PRESENT_CHOICE, json!({"question": "Where?", "options": [{"title": "Local"}, {"title": "Profile"}]})),
                ("c3", "search", json!({"q": "css"})),
            ]),
            mock::readiness(false),
            mock::text("Anything else?"),
        ])
        .await;
        let orchestrator = Orchestrator::new(&h.executor, &h.readiness, &h.tools, 10);

        let outcome = orchestrator.run_turn(&mut h.session).await.unwrap();
        let TurnOutcome::Question(q) = outcome else {
            panic!("expected a question");
        };
        assert_eq!(q.option_prompt.as_deref(), Some("Where?"));
        assert_eq!(h.llm.call_count(), 2);

        // Suspended state is persisted with the deferred call
        let stored = h.store.load(h.session.id()).await.unwrap().unwrap();
        let pending = stored.pending.unwrap();
        assert_eq!(pending.tool_call_id, "c2");
        assert_eq!(pending.deferred.len(), 1);
        assert_eq!(pending.deferred[0].id, "c3");

        // A new turn is refused while suspended
        assert!(matches!(
            orchestrator.run_turn(&mut h.session).await,
            Err(PlanningError::AwaitingAnswer { .. })
        ));

        let outcome = orchestrator.resume(&mut h.session, "Profile").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Question(ref q) if q.body_text == "Anything else?"));

        let messages = h.session.record().history().messages();
        let ids: Vec<_> = messages.iter().filter_map(|m| m.tool_call_id.as_deref()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(messages.iter().find(|m| m.tool_call_id.as_deref() == Some("c2")).unwrap().content, "Profile");
        assert_calls_answered(messages);
        assert!(h.session.pending().is_none());
    }

    #[tokio::test]
    async fn test_ready_stops_before_model_turn() {
        let mut h = harness(vec![mock::readiness(true), mock::text("should never be requested")]).await;
        let orchestrator = Orchestrator::new(&h.executor, &h.readiness, &h.tools, 10);

        let outcome = orchestrator.run_turn(&mut h.session).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::ReadyForGeneration(ref e) if e.ready));
        assert_eq!(h.llm.call_count(), 1);
        assert_eq!(h.session.phase(), SessionPhase::GenerationReady);

        // Further turns do not call the model
        orchestrator.run_turn(&mut h.session).await.unwrap();
        assert_eq!(h.llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_fatal_and_persisted() {
        let mut responses = Vec::new();
        for i in 0..3 {
            responses.push(mock::readiness(false));
            let id = format!("c{i}");
            responses.push(mock::calls(vec![(id.as_str(), "search", json!({"q": "x"}))]));
        }
        let mut h = harness(responses).await;
        let orchestrator = Orchestrator::new(&h.executor, &h.readiness, &h.tools, 3);

        let err = orchestrator.run_turn(&mut h.session).await.unwrap_err();
        assert!(matches!(err, PlanningError::MaxTurnsExceeded { turns: 3 }));

        let stored = h.store.load(h.session.id()).await.unwrap().unwrap();
        assert_eq!(stored.history(), h.session.record().history());
        assert_eq!(stored.history().count(Role::Tool), 3);
    }

    #[tokio::test]
    async fn test_resume_without_pending() {
        let mut h = harness(vec![]).await;
        let orchestrator = Orchestrator::new(&h.executor, &h.readiness, &h.tools, 10);
        let err = orchestrator.resume(&mut h.session, "hi").await.unwrap_err();
        assert!(matches!(err, PlanningError::NothingPending { .. }));
    }

    #[tokio::test]
    async fn test_ask_human_reply_matches_plain_user_input() {
        // Suspend on ask-human, then answer
        let mut h = harness(vec![
            mock::readiness(false),
            mock::calls(vec![("c1", ASK_HUMAN, json!({"question": "Per user?"}))]),
            mock::readiness(true),
        ])
        .await;
        let orchestrator = Orchestrator::new(&h.executor, &h.readiness, &h.tools, 10);

        orchestrator.run_turn(&mut h.session).await.unwrap();
        let outcome = orchestrator.resume(&mut h.session, "yes").await.unwrap();

        assert!(matches!(outcome, TurnOutcome::ReadyForGeneration(_)));
        let last = h.session.record().history().last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.content, "yes");
    }
}
