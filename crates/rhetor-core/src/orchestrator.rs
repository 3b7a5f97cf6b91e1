//! Conversation orchestrator
//!
//! Drives one analysis run: loads the text into a fresh state, asks the
//! strategy who acts next, hands that agent the state for one turn, records
//! the turn, and repeats until a termination signal, an error or
//! cancellation. Every run state change goes through [`StateMachine`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::{Agent, AgentError, AgentId, TurnContext};
use crate::config::AnalysisConfig;
use crate::logic::LogicSolver;
use crate::state::{AnalysisState, StateError};
use crate::strategy::{AlternatingStrategy, LastTurn, Selection, TerminationSignal, TurnStrategy};
use crate::taxonomy::FallacyTaxonomy;
use crate::transcript::{Transcript, TranscriptLog, TurnRecord};

/// Run states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Initializing,
    AwaitingAgentTurn,
    ProcessingTurn,
    TerminatedComplete,
    TerminatedBudgetExhausted,
    TerminatedStalled,
    TerminatedError,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::TerminatedComplete
                | Self::TerminatedBudgetExhausted
                | Self::TerminatedStalled
                | Self::TerminatedError
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing"),
            Self::AwaitingAgentTurn => write!(f, "AwaitingAgentTurn"),
            Self::ProcessingTurn => write!(f, "ProcessingTurn"),
            Self::TerminatedComplete => write!(f, "TerminatedComplete"),
            Self::TerminatedBudgetExhausted => write!(f, "TerminatedBudgetExhausted"),
            Self::TerminatedStalled => write!(f, "TerminatedStalled"),
            Self::TerminatedError => write!(f, "TerminatedError"),
        }
    }
}

/// Legal transitions between run states.
///
/// ```text
/// Initializing → AwaitingAgentTurn
/// AwaitingAgentTurn → ProcessingTurn | TerminatedComplete
///                   | TerminatedBudgetExhausted | TerminatedStalled
/// ProcessingTurn → AwaitingAgentTurn | TerminatedComplete
/// any non-terminal → TerminatedError
/// ```
fn is_legal_transition(from: RunState, to: RunState) -> bool {
    use RunState::*;

    if to == TerminatedError && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Initializing, AwaitingAgentTurn)
            | (AwaitingAgentTurn, ProcessingTurn)
            | (AwaitingAgentTurn, TerminatedComplete)
            | (AwaitingAgentTurn, TerminatedBudgetExhausted)
            | (AwaitingAgentTurn, TerminatedStalled)
            | (ProcessingTurn, AwaitingAgentTurn)
            | (ProcessingTurn, TerminatedComplete)
    )
}

/// A single recorded state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RunState,
    pub to: RunState,
    /// Turn counter at the time of the transition (0 before the first turn)
    pub turn: u32,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Tracks the run state and refuses transitions outside the table
pub struct StateMachine {
    current: RunState,
    turn: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: RunState::Initializing,
            turn: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> RunState {
        self.current
    }

    pub fn set_turn(&mut self, turn: u32) {
        self.turn = turn;
    }

    pub fn advance(&mut self, to: RunState, reason: Option<&str>) -> Result<(), StateError> {
        if !is_legal_transition(self.current, to) {
            return Err(StateError::InvalidStateTransition(format!(
                "{} → {}",
                self.current, to
            )));
        }
        tracing::debug!(from = %self.current, to = %to, turn = self.turn, "run state transition");
        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            turn: self.turn,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCause {
    Cancelled,
    /// A mutation was attempted that the state or run does not allow
    StateTransition,
    /// LLM or solver failure
    ExternalService,
    Agent,
    Initialization,
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::StateTransition => write!(f, "state_transition"),
            Self::ExternalService => write!(f, "external_service"),
            Self::Agent => write!(f, "agent"),
            Self::Initialization => write!(f, "initialization"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    Complete,
    BudgetExhausted,
    Stalled,
    Error { cause: ErrorCause, message: String },
}

impl TerminationReason {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::BudgetExhausted => write!(f, "budget exhausted"),
            Self::Stalled => write!(f, "stalled"),
            Self::Error { cause, message } => write!(f, "error ({}): {}", cause, message),
        }
    }
}

/// Everything a run produced, whatever way it ended
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub final_state: RunState,
    pub reason: TerminationReason,
    pub state: AnalysisState,
    pub transcript: Transcript,
    pub transitions: Vec<TransitionRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn turns(&self) -> u32 {
        self.state.turn_counter()
    }
}

struct Failure {
    cause: ErrorCause,
    message: String,
}

impl From<StateError> for Failure {
    fn from(e: StateError) -> Self {
        Self {
            cause: ErrorCause::StateTransition,
            message: e.to_string(),
        }
    }
}

impl From<AgentError> for Failure {
    fn from(e: AgentError) -> Self {
        let cause = match &e {
            AgentError::ExternalService(_) => ErrorCause::ExternalService,
            AgentError::State(s) if s.is_fatal() => ErrorCause::StateTransition,
            _ => ErrorCause::Agent,
        };
        Self {
            cause,
            message: e.to_string(),
        }
    }
}

/// Per-run driver. Holds both agents and what their tools need; owns no
/// state between runs.
pub struct Orchestrator {
    informal: Box<dyn Agent>,
    logic: Box<dyn Agent>,
    taxonomy: Arc<FallacyTaxonomy>,
    solver: Option<Arc<dyn LogicSolver>>,
    max_turns: u32,
    stall_limit: u32,
    first_agent: AgentId,
    transcript_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(informal: Box<dyn Agent>, logic: Box<dyn Agent>) -> Self {
        let defaults = AnalysisConfig::default();
        Self {
            informal,
            logic,
            taxonomy: Arc::new(FallacyTaxonomy::builtin()),
            solver: None,
            max_turns: defaults.max_turns,
            stall_limit: defaults.stall_limit,
            first_agent: defaults.first_agent,
            transcript_dir: None,
        }
    }

    /// Turn limits, first agent and transcript directory from `config`
    pub fn with_config(mut self, config: &AnalysisConfig) -> Self {
        self.max_turns = config.max_turns;
        self.stall_limit = config.stall_limit;
        self.first_agent = config.first_agent;
        self.transcript_dir = Some(config.transcript_dir());
        self
    }

    pub fn with_limits(mut self, max_turns: u32, stall_limit: u32) -> Self {
        self.max_turns = max_turns;
        self.stall_limit = stall_limit;
        self
    }

    pub fn with_first_agent(mut self, agent: AgentId) -> Self {
        self.first_agent = agent;
        self
    }

    pub fn with_taxonomy(mut self, taxonomy: Arc<FallacyTaxonomy>) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn with_solver(mut self, solver: Arc<dyn LogicSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Mirror turn records to `<dir>/<run_id>.jsonl` as they happen
    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    fn agent(&self, id: AgentId) -> &dyn Agent {
        match id {
            AgentId::InformalFallacy => self.informal.as_ref(),
            AgentId::PropositionalLogic => self.logic.as_ref(),
        }
    }

    /// Analyse `text` with the alternating strategy
    pub async fn run(&self, text: &str, cancel: &CancellationToken) -> RunOutcome {
        let strategy =
            AlternatingStrategy::new(self.max_turns, self.stall_limit).starting_with(self.first_agent);
        self.run_with_strategy(text, strategy, cancel).await
    }

    pub async fn run_with_strategy<S: TurnStrategy>(
        &self,
        text: &str,
        mut strategy: S,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, max_turns = self.max_turns, "analysis run starting");

        let mut sm = StateMachine::new();
        let mut state = AnalysisState::new();
        let mut transcript = Transcript::new(run_id);

        let log = match &self.transcript_dir {
            Some(dir) => match TranscriptLog::create(dir, run_id).await {
                Ok(log) => Some(log),
                Err(e) => {
                    tracing::warn!(%run_id, error = %e, "transcript log unavailable, continuing without it");
                    None
                }
            },
            None => None,
        };

        let driven = self
            .drive(text, &mut sm, &mut state, &mut transcript, &mut strategy, log.as_ref(), cancel)
            .await;

        let reason = match driven {
            Ok(reason) => reason,
            Err(failure) => {
                if !sm.is_terminal() {
                    if let Err(e) = sm.advance(RunState::TerminatedError, Some(&failure.message)) {
                        tracing::error!(%run_id, error = %e, "could not record error termination");
                    }
                }
                TerminationReason::Error {
                    cause: failure.cause,
                    message: failure.message,
                }
            }
        };

        match &reason {
            TerminationReason::Error { cause, message } => {
                tracing::error!(%run_id, turn = state.turn_counter(), %cause, %message, "analysis run failed")
            }
            _ => tracing::info!(
                %run_id,
                turns = state.turn_counter(),
                arguments = state.arguments().len(),
                fallacies = state.fallacies().len(),
                %reason,
                "analysis run finished"
            ),
        }

        RunOutcome {
            run_id,
            final_state: sm.current(),
            reason,
            state,
            transcript,
            transitions: sm.into_transitions(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive<S: TurnStrategy>(
        &self,
        text: &str,
        sm: &mut StateMachine,
        state: &mut AnalysisState,
        transcript: &mut Transcript,
        strategy: &mut S,
        log: Option<&TranscriptLog>,
        cancel: &CancellationToken,
    ) -> Result<TerminationReason, Failure> {
        let run_id = transcript.run_id;
        state.set_raw_text(text).map_err(|e| Failure {
            cause: ErrorCause::Initialization,
            message: e.to_string(),
        })?;
        sm.advance(RunState::AwaitingAgentTurn, Some("text loaded"))?;

        let mut last: Option<LastTurn> = None;
        loop {
            if cancel.is_cancelled() {
                tracing::info!(%run_id, turn = state.turn_counter(), "run cancelled");
                return Err(Failure {
                    cause: ErrorCause::Cancelled,
                    message: "run cancelled".to_string(),
                });
            }

            let agent_id = match strategy.select(state, last) {
                Selection::Terminate(signal) => {
                    let (to, reason) = match signal {
                        TerminationSignal::Complete => (RunState::TerminatedComplete, TerminationReason::Complete),
                        TerminationSignal::BudgetExhausted => {
                            tracing::warn!(%run_id, turns = state.turn_counter(), "turn budget exhausted");
                            (RunState::TerminatedBudgetExhausted, TerminationReason::BudgetExhausted)
                        }
                        TerminationSignal::Stalled => {
                            tracing::warn!(%run_id, turns = state.turn_counter(), "no progress, stopping");
                            (RunState::TerminatedStalled, TerminationReason::Stalled)
                        }
                    };
                    sm.advance(to, Some(&signal.to_string()))?;
                    return Ok(reason);
                }
                Selection::Next(agent_id) => agent_id,
            };

            sm.advance(RunState::ProcessingTurn, Some(agent_id.name()))?;
            let turn = state.begin_turn();
            sm.set_turn(turn);
            tracing::info!(%run_id, turn, agent = %agent_id, "turn starting");

            let before = state.snapshot();
            let (result, tool_calls, partial) = {
                let mut ctx = TurnContext::new(
                    turn,
                    agent_id,
                    &mut *state,
                    self.taxonomy.as_ref(),
                    self.solver.as_deref(),
                    transcript.records(),
                );
                let result = self.agent(agent_id).take_turn(&mut ctx).await;
                let (calls, partial) = ctx.into_calls();
                (result, calls, partial)
            };
            let delta = state.delta_since(&before);

            let record = TurnRecord {
                turn,
                agent: agent_id,
                reasoning: result.as_ref().map(|r| r.reasoning.clone()).unwrap_or_default(),
                tool_calls,
                delta: delta.clone(),
                partial,
                error: result.as_ref().err().map(|e| e.to_string()),
                timestamp: Utc::now(),
            };
            if let Some(log) = log {
                if let Err(e) = log.append(&record).await {
                    tracing::warn!(%run_id, turn, error = %e, "failed to append transcript record");
                }
            }
            transcript.push(record);

            if let Err(e) = result {
                tracing::error!(%run_id, turn, agent = %agent_id, error = %e, "agent turn failed");
                return Err(e.into());
            }

            tracing::info!(
                %run_id,
                turn,
                agent = %agent_id,
                partial,
                arguments = delta.arguments_added.len(),
                fallacies = delta.fallacies_added.len(),
                logic_results = delta.logic_results_added.len(),
                "turn finished"
            );

            if state.is_complete() {
                sm.advance(RunState::TerminatedComplete, Some("completion flag set"))?;
                return Ok(TerminationReason::Complete);
            }
            sm.advance(RunState::AwaitingAgentTurn, None)?;
            last = Some(LastTurn {
                agent: agent_id,
                progressed: delta.made_progress(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), RunState::Initializing);
        assert!(!sm.is_terminal());
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut sm = StateMachine::new();
        sm.advance(RunState::AwaitingAgentTurn, Some("text loaded")).unwrap();
        sm.set_turn(1);
        sm.advance(RunState::ProcessingTurn, None).unwrap();
        sm.advance(RunState::AwaitingAgentTurn, None).unwrap();
        sm.set_turn(2);
        sm.advance(RunState::ProcessingTurn, None).unwrap();
        sm.advance(RunState::TerminatedComplete, None).unwrap();

        assert!(sm.is_terminal());
        assert_eq!(sm.transitions().len(), 5);
        assert_eq!(sm.transitions()[4].turn, 2);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut sm = StateMachine::new();
        let err = sm.advance(RunState::ProcessingTurn, None).unwrap_err();
        assert!(matches!(err, StateError::InvalidStateTransition(_)));
        assert!(err.is_fatal());

        sm.advance(RunState::AwaitingAgentTurn, None).unwrap();
        sm.advance(RunState::ProcessingTurn, None).unwrap();
        // budget and stall are only decided between turns
        assert!(sm.advance(RunState::TerminatedBudgetExhausted, None).is_err());
        assert!(sm.advance(RunState::TerminatedStalled, None).is_err());
        assert_eq!(sm.current(), RunState::ProcessingTurn);
    }

    #[test]
    fn test_error_from_any_non_terminal() {
        for path in [
            vec![],
            vec![RunState::AwaitingAgentTurn],
            vec![RunState::AwaitingAgentTurn, RunState::ProcessingTurn],
        ] {
            let mut sm = StateMachine::new();
            for s in path {
                sm.advance(s, None).unwrap();
            }
            sm.advance(RunState::TerminatedError, Some("boom")).unwrap();
            assert!(sm.is_terminal());
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut sm = StateMachine::new();
        sm.advance(RunState::AwaitingAgentTurn, None).unwrap();
        sm.advance(RunState::TerminatedStalled, None).unwrap();
        assert!(sm.advance(RunState::TerminatedError, None).is_err());
        assert!(sm.advance(RunState::AwaitingAgentTurn, None).is_err());
    }

    #[test]
    fn test_reason_serialization() {
        let reason = TerminationReason::Error {
            cause: ErrorCause::Cancelled,
            message: "run cancelled".to_string(),
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["cause"], "cancelled");
        assert_eq!(
            serde_json::to_value(TerminationReason::BudgetExhausted).unwrap()["kind"],
            "budget_exhausted"
        );
    }
}
