//! Logic toolkit for the propositional-logic agent
//!
//! Belief sets are built and validated here; deciding entailment and
//! consistency is left to an external solver behind [`LogicSolver`].

pub mod belief_set;
pub mod json;
pub mod solver;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use belief_set::{
    normalize_identifier, Declarations, KnowledgeBase, PredicateDecl, PropositionalBeliefSet,
    QueryIdea,
};
pub use json::extract_json_block;
pub use solver::{HttpLogicSolver, LogicSolver};

/// Which logic a belief set is written in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogicKind {
    Propositional,
    FirstOrder,
}

impl fmt::Display for LogicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propositional => write!(f, "propositional"),
            Self::FirstOrder => write!(f, "first_order"),
        }
    }
}

/// Solver verdict on a query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    Accepted,
    Rejected,
    /// Error text or an answer that was neither accepted nor rejected
    Unknown,
}

impl QueryOutcome {
    /// Interpret a raw solver answer.
    ///
    /// Anything mentioning `error` in any case is unknown, even with a
    /// verdict keyword. The verdicts themselves only count in upper case.
    pub fn from_raw(raw: &str) -> Self {
        if raw.to_uppercase().contains("ERROR") {
            Self::Unknown
        } else if raw.contains("ACCEPTED") {
            Self::Accepted
        } else if raw.contains("REJECTED") {
            Self::Rejected
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum LogicError {
    /// The belief set or query is malformed; recoverable by the agent
    #[error("Invalid belief set: {0}")]
    InvalidBeliefSet(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The solver could not be reached or answered with an error status
    #[error("Solver unavailable: {0}")]
    SolverUnavailable(String),
}
