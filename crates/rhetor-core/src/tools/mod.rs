//! Tool definitions and dispatch
//!
//! Tools are the only way an agent can change the analysis state. Each one
//! is a typed handler with `serde` arguments; the registry erases the types
//! and exposes OpenAI-compatible function schemas to the model.

pub mod informal;
pub mod logic;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::coherence::CoherenceAnalyzer;
use crate::logic::LogicSolver;
use crate::state::{AnalysisState, StateError};
use crate::taxonomy::FallacyTaxonomy;

static TOOL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").expect("TOOL_NAME regex should compile"));

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool ran but refused the request; the model can retry
    #[error("{tool} failed: {reason}")]
    Invocation { tool: String, reason: String },

    #[error(transparent)]
    State(#[from] StateError),

    /// LLM or solver failure
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Tool registration error: {0}")]
    Registration(String),
}

impl ToolError {
    /// Fatal errors end the run; the rest are reported back to the model
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::State(e) => e.is_fatal(),
            Self::ExternalService(_) | Self::Registration(_) => true,
            _ => false,
        }
    }

    pub(crate) fn invocation(tool: &str, reason: impl Into<String>) -> Self {
        Self::Invocation {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// What a tool may touch during one call
pub struct ToolContext<'a> {
    pub state: &'a mut AnalysisState,
    pub taxonomy: &'a FallacyTaxonomy,
    pub solver: Option<&'a dyn LogicSolver>,
}

/// A typed tool
#[async_trait]
pub trait Tool: Send + Sync {
    type Args: DeserializeOwned + Send;

    const NAME: &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of `Args`; must be an object schema
    fn parameters(&self) -> Value;

    async fn call(&self, args: Self::Args, ctx: &mut ToolContext<'_>) -> Result<String, ToolError>;
}

#[async_trait]
trait ErasedTool: Send + Sync {
    fn schema(&self) -> Value;

    async fn call_json(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<String, ToolError>;
}

struct Typed<T>(T);

#[async_trait]
impl<T: Tool> ErasedTool for Typed<T> {
    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": T::NAME,
                "description": self.0.description(),
                "parameters": self.0.parameters(),
            }
        })
    }

    async fn call_json(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        // Models send `null` or nothing for argument-less calls
        let args = match args {
            Value::Null => serde_json::json!({}),
            Value::Object(_) => args,
            other => {
                return Err(ToolError::InvalidArguments {
                    tool: T::NAME.to_string(),
                    reason: format!("expected a JSON object, got {}", other),
                })
            }
        };
        let args: T::Args = serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
            tool: T::NAME.to_string(),
            reason: e.to_string(),
        })?;
        self.0.call(args, ctx).await
    }
}

/// Name -> tool table for one agent
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Box<dyn ErasedTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names must be unique and match `[a-zA-Z0-9_-]{1,64}`.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), ToolError> {
        if !TOOL_NAME.is_match(T::NAME) {
            return Err(ToolError::Registration(format!("invalid tool name {:?}", T::NAME)));
        }
        if self.tools.contains_key(T::NAME) {
            return Err(ToolError::Registration(format!("duplicate tool name {}", T::NAME)));
        }
        if tool.parameters()["type"] != "object" {
            return Err(ToolError::Registration(format!(
                "parameters of {} must be an object schema",
                T::NAME
            )));
        }
        self.tools.insert(T::NAME, Box::new(Typed(tool)));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function schemas in chat-completions format
    pub fn schemas(&self) -> Vec<Value> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call_json(args, ctx).await
    }
}

/// Tools for the informal-fallacy agent, with default coherence settings
pub fn informal_registry() -> Result<ToolRegistry, ToolError> {
    informal_registry_with(CoherenceAnalyzer::default())
}

pub fn informal_registry_with(coherence: CoherenceAnalyzer) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(informal::ListFallacyCategories)?;
    registry.register(informal::DescribeFallacy)?;
    registry.register(informal::AssessCoherence::new(coherence))?;
    registry.register(informal::AddArgument)?;
    registry.register(informal::AddFallacy)?;
    registry.register(informal::MarkComplete)?;
    Ok(registry)
}

/// Tools for the propositional-logic agent
pub fn logic_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(logic::BuildPropositionalBeliefSet)?;
    registry.register(logic::BuildFolBeliefSet)?;
    registry.register(logic::PlanQueries)?;
    registry.register(logic::ExecuteQuery)?;
    registry.register(logic::CheckConsistency)?;
    registry.register(informal::AddArgument)?;
    registry.register(informal::MarkComplete)?;
    Ok(registry)
}
