//! Shared analysis state
//!
//! One `AnalysisState` lives for exactly one run. Agents never touch it
//! directly: every mutation goes through a registered tool, and the
//! orchestrator hands `&mut` access to one turn at a time.

use serde::{Deserialize, Serialize};

use crate::logic::{LogicKind, QueryOutcome};

/// Errors raised by state mutations
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StateError {
    /// The mutation is not allowed in the current state. Fatal to the run.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// The mutation was rejected because its input is malformed; the state
    /// is unchanged and the run can continue.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown argument id: {0}")]
    UnknownArgument(String),

    #[error("Unknown belief set id: {0}")]
    UnknownBeliefSet(String),
}

impl StateError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidStateTransition(_))
    }
}

/// Byte range into the analysed text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Argument {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fallacy {
    pub id: String,
    /// Taxonomy key, e.g. `hasty_generalization`
    pub fallacy_type: String,
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_argument_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<TextSpan>,
    pub confidence: f64,
}

/// Input for [`AnalysisState::add_fallacy`]
#[derive(Debug, Clone, Default)]
pub struct NewFallacy {
    pub fallacy_type: String,
    pub justification: String,
    pub target_argument_id: Option<String>,
    pub span: Option<TextSpan>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeliefSetRecord {
    pub id: String,
    pub logic: LogicKind,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogicResult {
    pub id: String,
    pub belief_set_id: String,
    pub query: String,
    pub outcome: QueryOutcome,
    /// Raw solver answer
    pub raw: String,
}

/// Counts taken before a turn, used to compute what the turn added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    arguments: usize,
    fallacies: usize,
    belief_sets: usize,
    logic_results: usize,
    complete: bool,
}

/// What a single turn added to the state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments_added: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallacies_added: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub belief_sets_added: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logic_results_added: Vec<String>,
    #[serde(default)]
    pub completed: bool,
}

impl StateDelta {
    /// Whether the turn produced any new finding
    pub fn made_progress(&self) -> bool {
        !self.arguments_added.is_empty()
            || !self.fallacies_added.is_empty()
            || !self.belief_sets_added.is_empty()
            || !self.logic_results_added.is_empty()
            || self.completed
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisState {
    raw_text: Option<String>,
    arguments: Vec<Argument>,
    fallacies: Vec<Fallacy>,
    belief_sets: Vec<BeliefSetRecord>,
    logic_results: Vec<LogicResult>,
    complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conclusion: Option<String>,
    turn_counter: u32,
}

impl AnalysisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything, including the text
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Set the text under analysis. Allowed once per run.
    pub fn set_raw_text(&mut self, text: impl Into<String>) -> Result<(), StateError> {
        if self.raw_text.is_some() {
            return Err(StateError::InvalidStateTransition(
                "text is already set for this run".to_string(),
            ));
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(StateError::InvalidInput("text to analyse is empty".to_string()));
        }
        self.raw_text = Some(text);
        Ok(())
    }

    pub fn raw_text(&self) -> &str {
        self.raw_text.as_deref().unwrap_or("")
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn fallacies(&self) -> &[Fallacy] {
        &self.fallacies
    }

    pub fn belief_sets(&self) -> &[BeliefSetRecord] {
        &self.belief_sets
    }

    pub fn logic_results(&self) -> &[LogicResult] {
        &self.logic_results
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn conclusion(&self) -> Option<&str> {
        self.conclusion.as_deref()
    }

    pub fn turn_counter(&self) -> u32 {
        self.turn_counter
    }

    pub fn belief_set(&self, id: &str) -> Option<&BeliefSetRecord> {
        self.belief_sets.iter().find(|b| b.id == id)
    }

    /// Start a new turn and return its 1-based index
    pub(crate) fn begin_turn(&mut self) -> u32 {
        self.turn_counter += 1;
        self.turn_counter
    }

    pub fn add_argument(&mut self, description: &str) -> Result<String, StateError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(StateError::InvalidInput("argument description is empty".to_string()));
        }
        let id = format!("arg_{}", self.arguments.len() + 1);
        self.arguments.push(Argument {
            id: id.clone(),
            description: description.to_string(),
        });
        Ok(id)
    }

    pub fn add_fallacy(&mut self, fallacy: NewFallacy) -> Result<String, StateError> {
        if fallacy.fallacy_type.trim().is_empty() {
            return Err(StateError::InvalidInput("fallacy type is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&fallacy.confidence) {
            return Err(StateError::InvalidInput(format!(
                "confidence {} outside [0, 1]",
                fallacy.confidence
            )));
        }
        if let Some(target) = &fallacy.target_argument_id {
            if !self.arguments.iter().any(|a| &a.id == target) {
                return Err(StateError::UnknownArgument(target.clone()));
            }
        }
        if let Some(span) = fallacy.span {
            let text = self.raw_text();
            let in_bounds = span.start <= span.end
                && span.end <= text.len()
                && text.is_char_boundary(span.start)
                && text.is_char_boundary(span.end);
            if !in_bounds {
                return Err(StateError::InvalidInput(format!(
                    "span {}..{} is outside the text ({} bytes)",
                    span.start,
                    span.end,
                    text.len()
                )));
            }
        }

        let id = format!("fallacy_{}", self.fallacies.len() + 1);
        self.fallacies.push(Fallacy {
            id: id.clone(),
            fallacy_type: fallacy.fallacy_type,
            justification: fallacy.justification,
            target_argument_id: fallacy.target_argument_id,
            span: fallacy.span,
            confidence: fallacy.confidence,
        });
        Ok(id)
    }

    pub fn add_belief_set(&mut self, logic: LogicKind, content: String) -> Result<String, StateError> {
        if content.trim().is_empty() {
            return Err(StateError::InvalidInput("belief set is empty".to_string()));
        }
        let id = format!("bs_{}", self.belief_sets.len() + 1);
        self.belief_sets.push(BeliefSetRecord {
            id: id.clone(),
            logic,
            content,
        });
        Ok(id)
    }

    pub fn record_logic_result(
        &mut self,
        belief_set_id: &str,
        query: &str,
        outcome: QueryOutcome,
        raw: &str,
    ) -> Result<String, StateError> {
        if self.belief_set(belief_set_id).is_none() {
            return Err(StateError::UnknownBeliefSet(belief_set_id.to_string()));
        }
        let id = format!("logic_{}", self.logic_results.len() + 1);
        self.logic_results.push(LogicResult {
            id: id.clone(),
            belief_set_id: belief_set_id.to_string(),
            query: query.to_string(),
            outcome,
            raw: raw.to_string(),
        });
        Ok(id)
    }

    /// Flag the analysis as finished.
    ///
    /// Refused until at least one argument has been recorded, so an empty
    /// analysis can never terminate as complete.
    pub fn mark_complete(&mut self, conclusion: Option<String>) -> Result<(), StateError> {
        if self.arguments.is_empty() {
            return Err(StateError::InvalidStateTransition(
                "cannot mark the analysis complete before any argument is recorded".to_string(),
            ));
        }
        self.complete = true;
        if conclusion.is_some() {
            self.conclusion = conclusion;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            arguments: self.arguments.len(),
            fallacies: self.fallacies.len(),
            belief_sets: self.belief_sets.len(),
            logic_results: self.logic_results.len(),
            complete: self.complete,
        }
    }

    /// Everything appended since `before` was taken
    pub fn delta_since(&self, before: &StateSnapshot) -> StateDelta {
        fn ids<T>(items: &[T], from: usize, id: impl Fn(&T) -> &str) -> Vec<String> {
            items.iter().skip(from).map(|i| id(i).to_string()).collect()
        }
        StateDelta {
            arguments_added: ids(&self.arguments, before.arguments, |a| a.id.as_str()),
            fallacies_added: ids(&self.fallacies, before.fallacies, |f| f.id.as_str()),
            belief_sets_added: ids(&self.belief_sets, before.belief_sets, |b| b.id.as_str()),
            logic_results_added: ids(&self.logic_results, before.logic_results, |r| r.id.as_str()),
            completed: self.complete && !before.complete,
        }
    }

    /// Compact plain-text view for agent prompts
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Turn: {}\n", self.turn_counter));

        out.push_str(&format!("Arguments ({}):\n", self.arguments.len()));
        for a in &self.arguments {
            out.push_str(&format!("- {}: {}\n", a.id, a.description));
        }

        out.push_str(&format!("Fallacies ({}):\n", self.fallacies.len()));
        for f in &self.fallacies {
            let target = f.target_argument_id.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "- {}: {} (target {}, confidence {:.2}) {}\n",
                f.id, f.fallacy_type, target, f.confidence, f.justification
            ));
        }

        out.push_str(&format!("Belief sets ({}):\n", self.belief_sets.len()));
        for b in &self.belief_sets {
            out.push_str(&format!("- {} [{}]:\n{}\n", b.id, b.logic, b.content));
        }

        out.push_str(&format!("Logic results ({}):\n", self.logic_results.len()));
        for r in &self.logic_results {
            out.push_str(&format!(
                "- {}: {} on {} -> {}\n",
                r.id, r.query, r.belief_set_id, r.outcome
            ));
        }

        out.push_str(&format!("Complete: {}\n", self.complete));
        out
    }
}
