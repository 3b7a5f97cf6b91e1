//! Rhetor Core - Agent conversation orchestration
//!
//! Two LLM-backed agents, an informal-fallacy analyst and a
//! propositional-logic analyst, take turns on a shared analysis state.
//! The orchestrator picks who goes next, records every turn, and stops on
//! completion, turn budget, stall, error or cancellation.

pub mod agent;
pub mod coherence;
pub mod config;
pub mod llm;
pub mod logic;
pub mod orchestrator;
pub mod prompts;
pub mod report;
pub mod state;
pub mod strategy;
pub mod taxonomy;
pub mod tools;
pub mod transcript;

pub use agent::{Agent, AgentError, AgentId, AgentReply, LlmAgent, TurnContext};
pub use coherence::{CoherenceAnalyzer, CoherenceConfig, CoherenceReport, Interpretation};
pub use config::{AnalysisConfig, ConfigError};
pub use llm::{LlmClient, LlmConfig, LlmError, LlmResponse, OpenAiCompatibleClient, ToolCall};
pub use logic::{HttpLogicSolver, LogicError, LogicKind, LogicSolver, QueryOutcome};
pub use orchestrator::{ErrorCause, Orchestrator, RunOutcome, RunState, TerminationReason};
pub use report::{write_reports, AnalysisReport, ReportError, ReportPaths};
pub use state::{AnalysisState, StateDelta, StateError};
pub use strategy::{AlternatingStrategy, Selection, TerminationSignal, TurnStrategy};
pub use taxonomy::{FallacyTaxonomy, TaxonomyEntry, TaxonomyError};
pub use tools::{ToolError, ToolRegistry};
pub use transcript::{Transcript, TurnRecord};
