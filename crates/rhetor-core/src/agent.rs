//! Agents and the per-turn tool loop
//!
//! An agent gets one turn at a time through a [`TurnContext`]: it can read
//! the state and the history, and change the state only by invoking tools
//! from its registry. Agents never call each other.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{LlmClient, LlmError};
use crate::logic::LogicSolver;
use crate::prompts;
use crate::state::{AnalysisState, StateError};
use crate::taxonomy::FallacyTaxonomy;
use crate::tools::{ToolContext, ToolError, ToolRegistry};
use crate::transcript::{ToolCallRecord, TurnRecord};

/// Maximum tool call rounds in one turn before the agent must yield
pub const MAX_TOOL_ROUNDS: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    InformalFallacy,
    PropositionalLogic,
}

impl AgentId {
    pub fn other(self) -> Self {
        match self {
            Self::InformalFallacy => Self::PropositionalLogic,
            Self::PropositionalLogic => Self::InformalFallacy,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::InformalFallacy => "informal_fallacy",
            Self::PropositionalLogic => "propositional_logic",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum AgentError {
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Tool error: {0}")]
    Tool(ToolError),

    /// The agent broke its contract, e.g. a model answer that cannot be used
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<ToolError> for AgentError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::State(s) => Self::State(s),
            ToolError::ExternalService(msg) => Self::ExternalService(msg),
            other => Self::Tool(other),
        }
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        Self::ExternalService(e.to_string())
    }
}

/// What an agent hands back at the end of its turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    pub reasoning: String,
}

impl AgentReply {
    pub fn new(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
        }
    }
}

/// Everything an agent can see and do during one turn
pub struct TurnContext<'a> {
    turn: u32,
    agent: AgentId,
    tools: ToolContext<'a>,
    history: &'a [TurnRecord],
    calls: Vec<ToolCallRecord>,
    partial: bool,
}

impl<'a> TurnContext<'a> {
    pub fn new(
        turn: u32,
        agent: AgentId,
        state: &'a mut AnalysisState,
        taxonomy: &'a FallacyTaxonomy,
        solver: Option<&'a dyn LogicSolver>,
        history: &'a [TurnRecord],
    ) -> Self {
        Self {
            turn,
            agent,
            tools: ToolContext {
                state,
                taxonomy,
                solver,
            },
            history,
            calls: Vec::new(),
            partial: false,
        }
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn state(&self) -> &AnalysisState {
        &*self.tools.state
    }

    pub fn history(&self) -> &[TurnRecord] {
        self.history
    }

    pub fn calls(&self) -> &[ToolCallRecord] {
        &self.calls
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Run a tool and log the call.
    ///
    /// Recoverable failures mark the turn partial and come back as `Ok` with
    /// the error text, so the model can correct itself. Fatal ones end the
    /// turn with `Err`.
    pub async fn invoke(&mut self, registry: &ToolRegistry, name: &str, args: Value) -> Result<String, AgentError> {
        tracing::debug!(turn = self.turn, agent = %self.agent, tool = name, "tool call");
        let result = registry.dispatch(name, args.clone(), &mut self.tools).await;
        match result {
            Ok(output) => {
                self.calls.push(ToolCallRecord {
                    name: name.to_string(),
                    arguments: args,
                    output: output.clone(),
                    ok: true,
                });
                Ok(output)
            }
            Err(e) => {
                self.calls.push(ToolCallRecord {
                    name: name.to_string(),
                    arguments: args,
                    output: e.to_string(),
                    ok: false,
                });
                if e.is_fatal() {
                    tracing::error!(turn = self.turn, agent = %self.agent, tool = name, error = %e, "fatal tool error");
                    return Err(e.into());
                }
                tracing::warn!(turn = self.turn, agent = %self.agent, tool = name, error = %e, "tool call failed");
                self.partial = true;
                Ok(format!("Error: {}", e))
            }
        }
    }

    pub(crate) fn into_calls(self) -> (Vec<ToolCallRecord>, bool) {
        (self.calls, self.partial)
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> AgentId;

    async fn take_turn(&self, ctx: &mut TurnContext<'_>) -> Result<AgentReply, AgentError>;
}

/// Chat-completions backed agent
pub struct LlmAgent {
    id: AgentId,
    client: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    system_prompt: &'static str,
    max_tool_rounds: usize,
}

impl LlmAgent {
    pub fn new(id: AgentId, client: Arc<dyn LlmClient>, registry: ToolRegistry) -> Self {
        Self {
            id,
            client,
            registry,
            system_prompt: prompts::system_prompt(id),
            max_tool_rounds: MAX_TOOL_ROUNDS,
        }
    }

    /// Informal-fallacy agent with its standard tools
    pub fn informal(client: Arc<dyn LlmClient>) -> Result<Self, ToolError> {
        Ok(Self::new(AgentId::InformalFallacy, client, crate::tools::informal_registry()?))
    }

    /// Propositional-logic agent with its standard tools
    pub fn logic(client: Arc<dyn LlmClient>) -> Result<Self, ToolError> {
        Ok(Self::new(AgentId::PropositionalLogic, client, crate::tools::logic_registry()?))
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    async fn take_turn(&self, ctx: &mut TurnContext<'_>) -> Result<AgentReply, AgentError> {
        let schemas = self.registry.schemas();
        let user = prompts::turn_prompt(ctx.turn(), self.id, ctx.state(), ctx.history());
        let mut messages = vec![
            serde_json::json!({"role": "system", "content": self.system_prompt}),
            serde_json::json!({"role": "user", "content": user}),
        ];
        let mut reasoning = Vec::new();

        // Tool loop: keep going until the model gives a text response or we hit max rounds
        for round in 0..self.max_tool_rounds {
            let resp = self.client.complete(&messages, &schemas).await?;
            if let Some(text) = resp.content.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                reasoning.push(text.to_string());
            }
            if resp.tool_calls.is_empty() {
                return Ok(AgentReply::new(reasoning.join("\n")));
            }

            tracing::debug!(turn = ctx.turn(), agent = %self.id, round, calls = resp.tool_calls.len(), "model requested tools");
            messages.push(resp.raw_message.clone());
            for call in &resp.tool_calls {
                let output = ctx.invoke(&self.registry, &call.name, call.arguments.clone()).await?;
                messages.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": output,
                }));
            }
            if ctx.state().is_complete() {
                break;
            }
        }

        if !ctx.state().is_complete() {
            tracing::warn!(turn = ctx.turn(), agent = %self.id, "tool round limit reached");
        }
        if reasoning.is_empty() {
            reasoning.push("Yielding after tool calls.".to_string());
        }
        Ok(AgentReply::new(reasoning.join("\n")))
    }
}
