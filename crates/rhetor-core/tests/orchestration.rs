//! End-to-end runs with scripted in-process agents (no network)

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use rhetor_core::logic::LogicError;
use rhetor_core::orchestrator::ErrorCause;
use rhetor_core::tools::{informal_registry, logic_registry};
use rhetor_core::{
    Agent, AgentError, AgentId, AgentReply, LogicKind, LogicSolver, Orchestrator, QueryOutcome,
    RunState, TerminationReason, ToolRegistry, TurnContext,
};

const SWANS: &str = "Every swan I have ever seen is white. I have seen hundreds of swans. \
Therefore all swans are white.";

type Step = Vec<(&'static str, Value)>;

/// Agent that replays one list of tool calls per turn, then idles
struct ScriptedAgent {
    id: AgentId,
    registry: ToolRegistry,
    script: Mutex<VecDeque<Step>>,
    cancel_after_turn: Option<CancellationToken>,
    fail_with: Option<AgentError>,
}

impl ScriptedAgent {
    fn new(id: AgentId, script: Vec<Step>) -> Self {
        let registry = match id {
            AgentId::InformalFallacy => informal_registry(),
            AgentId::PropositionalLogic => logic_registry(),
        }
        .unwrap();
        Self {
            id,
            registry,
            script: Mutex::new(script.into()),
            cancel_after_turn: None,
            fail_with: None,
        }
    }

    fn idle(id: AgentId) -> Self {
        Self::new(id, vec![])
    }

    fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_after_turn = Some(token);
        self
    }

    fn failing(mut self, error: AgentError) -> Self {
        self.fail_with = Some(error);
        self
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    async fn take_turn(&self, ctx: &mut TurnContext<'_>) -> Result<AgentReply, AgentError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        let step = self.script.lock().unwrap().pop_front().unwrap_or_default();
        let mut notes = Vec::new();
        for (name, args) in step {
            notes.push(ctx.invoke(&self.registry, name, args).await?);
        }
        if let Some(token) = &self.cancel_after_turn {
            token.cancel();
        }
        Ok(AgentReply::new(format!("turn {}: {}", ctx.turn(), notes.join(" | "))))
    }
}

/// Rejects every query; everything is consistent
struct SkepticSolver;

#[async_trait]
impl LogicSolver for SkepticSolver {
    async fn query(&self, _logic: LogicKind, _belief_set: &str, _query: &str) -> Result<String, LogicError> {
        Ok("REJECTED".to_string())
    }

    async fn consistency(&self, _logic: LogicKind, _belief_set: &str) -> Result<(bool, String), LogicError> {
        Ok((true, "consistent".to_string()))
    }
}

fn swans_informal() -> ScriptedAgent {
    ScriptedAgent::new(
        AgentId::InformalFallacy,
        vec![
            vec![
                (
                    "add_argument",
                    json!({"description": "Every observed swan is white, so all swans are white"}),
                ),
                (
                    "add_fallacy",
                    json!({
                        "fallacy_type": "hasty_generalization",
                        "justification": "Concludes about all swans from the swans observed",
                        "target_argument_id": "arg_1",
                        "quote": "Therefore all swans are white",
                        "confidence": 0.9
                    }),
                ),
            ],
            vec![(
                "mark_complete",
                json!({"conclusion": "The argument generalizes hastily and is not logically valid"}),
            )],
        ],
    )
}

fn swans_logic() -> ScriptedAgent {
    ScriptedAgent::new(
        AgentId::PropositionalLogic,
        vec![vec![
            (
                "build_propositional_belief_set",
                json!({
                    "propositions": ["observed_swans_white", "all_swans_white"],
                    "formulas": ["observed_swans_white"]
                }),
            ),
            ("execute_query", json!({"belief_set_id": "bs_1", "query": "all_swans_white"})),
        ]],
    )
}

#[tokio::test]
async fn swans_run_completes_with_hasty_generalization() {
    let orchestrator = Orchestrator::new(Box::new(swans_informal()), Box::new(swans_logic()))
        .with_limits(4, 2)
        .with_solver(Arc::new(SkepticSolver));

    let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;

    assert_eq!(outcome.reason, TerminationReason::Complete);
    assert_eq!(outcome.final_state, RunState::TerminatedComplete);
    assert!(outcome.turns() <= 4);
    assert!(outcome.state.is_complete());
    assert!(!outcome.state.arguments().is_empty());

    let hasty_turn = outcome
        .transcript
        .records()
        .iter()
        .find(|r| {
            r.delta.fallacies_added.iter().any(|id| {
                outcome
                    .state
                    .fallacies()
                    .iter()
                    .any(|f| &f.id == id && f.fallacy_type == "hasty_generalization")
            })
        })
        .map(|r| r.turn);
    assert!(matches!(hasty_turn, Some(t) if t <= 2));

    let result = &outcome.state.logic_results()[0];
    assert_eq!(result.outcome, QueryOutcome::Rejected);

    let agents: Vec<AgentId> = outcome.transcript.records().iter().map(|r| r.agent).collect();
    assert_eq!(
        agents,
        vec![AgentId::InformalFallacy, AgentId::PropositionalLogic, AgentId::InformalFallacy]
    );
}

#[tokio::test]
async fn budget_of_one_exhausts_after_one_turn() {
    let informal = ScriptedAgent::new(
        AgentId::InformalFallacy,
        vec![vec![("add_argument", json!({"description": "swans are white"}))]],
    );
    let orchestrator = Orchestrator::new(
        Box::new(informal),
        Box::new(ScriptedAgent::idle(AgentId::PropositionalLogic)),
    )
    .with_limits(1, 2);

    let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;

    assert_eq!(outcome.reason, TerminationReason::BudgetExhausted);
    assert_eq!(outcome.final_state, RunState::TerminatedBudgetExhausted);
    assert_eq!(outcome.turns(), 1);
    assert_eq!(outcome.transcript.len(), 1);
}

#[tokio::test]
async fn turn_counter_never_exceeds_budget() {
    for budget in 1..=5 {
        let informal = ScriptedAgent::new(
            AgentId::InformalFallacy,
            (0..5)
                .map(|i| vec![("add_argument", json!({"description": format!("claim {}", i)}))])
                .collect(),
        );
        let logic = ScriptedAgent::new(
            AgentId::PropositionalLogic,
            (0..5)
                .map(|i| vec![("add_argument", json!({"description": format!("premise {}", i)}))])
                .collect(),
        );
        let orchestrator = Orchestrator::new(Box::new(informal), Box::new(logic)).with_limits(budget, 2);
        let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;
        assert!(outcome.turns() <= budget);
        assert_eq!(outcome.reason, TerminationReason::BudgetExhausted);
    }
}

#[tokio::test]
async fn cancellation_after_first_turn() {
    let token = CancellationToken::new();
    let informal = ScriptedAgent::new(
        AgentId::InformalFallacy,
        vec![vec![("add_argument", json!({"description": "swans are white"}))]],
    )
    .cancelling(token.clone());
    let orchestrator = Orchestrator::new(
        Box::new(informal),
        Box::new(ScriptedAgent::idle(AgentId::PropositionalLogic)),
    )
    .with_limits(4, 2);

    let outcome = orchestrator.run(SWANS, &token).await;

    assert_eq!(outcome.final_state, RunState::TerminatedError);
    assert!(matches!(
        outcome.reason,
        TerminationReason::Error { cause: ErrorCause::Cancelled, .. }
    ));
    assert_eq!(outcome.transcript.len(), 1);
    assert!(outcome.transcript.records().iter().all(|r| r.turn <= 1));
}

#[tokio::test]
async fn idle_agents_stall() {
    let orchestrator = Orchestrator::new(
        Box::new(ScriptedAgent::idle(AgentId::InformalFallacy)),
        Box::new(ScriptedAgent::idle(AgentId::PropositionalLogic)),
    )
    .with_limits(10, 2);

    let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;

    assert_eq!(outcome.reason, TerminationReason::Stalled);
    assert_eq!(outcome.final_state, RunState::TerminatedStalled);
    assert_eq!(outcome.turns(), 2);
}

#[tokio::test]
async fn premature_completion_is_fatal() {
    let informal = ScriptedAgent::new(AgentId::InformalFallacy, vec![vec![("mark_complete", json!({}))]]);
    let orchestrator = Orchestrator::new(
        Box::new(informal),
        Box::new(ScriptedAgent::idle(AgentId::PropositionalLogic)),
    );

    let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;

    assert_eq!(outcome.final_state, RunState::TerminatedError);
    assert!(matches!(
        outcome.reason,
        TerminationReason::Error { cause: ErrorCause::StateTransition, .. }
    ));
    assert!(!outcome.state.is_complete());
    let record = outcome.transcript.last().unwrap();
    assert_eq!(record.turn, 1);
    assert!(record.error.is_some());
}

#[tokio::test]
async fn recoverable_tool_error_keeps_running() {
    let informal = ScriptedAgent::new(
        AgentId::InformalFallacy,
        vec![
            vec![
                ("add_fallacy", json!({"fallacy_type": "not_a_fallacy", "justification": "?"})),
                ("add_argument", json!({"description": "swans are white"})),
            ],
            vec![("mark_complete", json!({}))],
        ],
    );
    let orchestrator = Orchestrator::new(
        Box::new(informal),
        Box::new(ScriptedAgent::idle(AgentId::PropositionalLogic)),
    );

    let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;

    assert_eq!(outcome.reason, TerminationReason::Complete);
    let first = &outcome.transcript.records()[0];
    assert!(first.partial);
    assert!(!first.tool_calls[0].ok);
    assert!(first.tool_calls[1].ok);
}

#[tokio::test]
async fn external_failure_terminates_with_error() {
    let informal = ScriptedAgent::idle(AgentId::InformalFallacy)
        .failing(AgentError::ExternalService("503 from provider".to_string()));
    let orchestrator = Orchestrator::new(
        Box::new(informal),
        Box::new(ScriptedAgent::idle(AgentId::PropositionalLogic)),
    );

    let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;

    assert!(matches!(
        outcome.reason,
        TerminationReason::Error { cause: ErrorCause::ExternalService, .. }
    ));
    assert_eq!(outcome.turns(), 1);
}

#[tokio::test]
async fn empty_text_fails_before_any_turn() {
    let orchestrator = Orchestrator::new(
        Box::new(ScriptedAgent::idle(AgentId::InformalFallacy)),
        Box::new(ScriptedAgent::idle(AgentId::PropositionalLogic)),
    );

    let outcome = orchestrator.run("   ", &CancellationToken::new()).await;

    assert!(matches!(
        outcome.reason,
        TerminationReason::Error { cause: ErrorCause::Initialization, .. }
    ));
    assert_eq!(outcome.turns(), 0);
    assert!(outcome.transcript.is_empty());
}

#[tokio::test]
async fn transcript_is_mirrored_to_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(Box::new(swans_informal()), Box::new(swans_logic()))
        .with_limits(4, 2)
        .with_solver(Arc::new(SkepticSolver))
        .with_transcript_dir(dir.path());

    let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;

    let path = dir.path().join(format!("{}.jsonl", outcome.run_id));
    let data = tokio::fs::read_to_string(path).await.unwrap();
    assert_eq!(data.lines().count(), outcome.transcript.len());

    let reports = rhetor_core::write_reports(&outcome, Some("demo-swans"), &dir.path().join("reports"))
        .await
        .unwrap();
    let md = tokio::fs::read_to_string(reports.markdown).await.unwrap();
    assert!(md.contains("hasty_generalization"));
    assert!(md.contains("- Termination: complete"));
}

#[tokio::test]
async fn logic_agent_can_open_the_run() {
    let orchestrator = Orchestrator::new(Box::new(swans_informal()), Box::new(swans_logic()))
        .with_limits(4, 2)
        .with_first_agent(AgentId::PropositionalLogic)
        .with_solver(Arc::new(SkepticSolver));

    let outcome = orchestrator.run(SWANS, &CancellationToken::new()).await;

    let agents: Vec<AgentId> = outcome.transcript.records().iter().map(|r| r.agent).collect();
    assert_eq!(
        agents,
        vec![
            AgentId::PropositionalLogic,
            AgentId::InformalFallacy,
            AgentId::PropositionalLogic,
            AgentId::InformalFallacy
        ]
    );
    assert_eq!(outcome.reason, TerminationReason::Complete);
    assert_eq!(outcome.state.logic_results()[0].outcome, QueryOutcome::Rejected);
}
