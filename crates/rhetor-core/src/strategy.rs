//! Turn selection
//!
//! Decides, before each turn, which agent acts next or whether the
//! conversation is over.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::state::AnalysisState;

/// Why the strategy ended the conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationSignal {
    Complete,
    BudgetExhausted,
    Stalled,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::BudgetExhausted => write!(f, "budget_exhausted"),
            Self::Stalled => write!(f, "stalled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Next(AgentId),
    Terminate(TerminationSignal),
}

/// Outcome of the turn that just ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastTurn {
    pub agent: AgentId,
    /// Whether the turn added anything to the state
    pub progressed: bool,
}

pub trait TurnStrategy: Send {
    /// Called once before every turn. `last` is `None` before the first turn.
    fn select(&mut self, state: &AnalysisState, last: Option<LastTurn>) -> Selection;
}

/// Informal-fallacy agent, then propositional-logic agent, and so on.
///
/// Checks, in order: completion flag, turn budget, stall (`stall_limit`
/// consecutive turns without progress; 0 disables it).
#[derive(Debug, Clone)]
pub struct AlternatingStrategy {
    max_turns: u32,
    stall_limit: u32,
    first: AgentId,
    idle_streak: u32,
}

impl AlternatingStrategy {
    pub fn new(max_turns: u32, stall_limit: u32) -> Self {
        Self {
            max_turns,
            stall_limit,
            first: AgentId::InformalFallacy,
            idle_streak: 0,
        }
    }

    pub fn starting_with(mut self, agent: AgentId) -> Self {
        self.first = agent;
        self
    }

    pub fn idle_streak(&self) -> u32 {
        self.idle_streak
    }
}

impl TurnStrategy for AlternatingStrategy {
    fn select(&mut self, state: &AnalysisState, last: Option<LastTurn>) -> Selection {
        if let Some(last) = last {
            if last.progressed {
                self.idle_streak = 0;
            } else {
                self.idle_streak += 1;
            }
        }

        if state.is_complete() {
            return Selection::Terminate(TerminationSignal::Complete);
        }
        if state.turn_counter() >= self.max_turns {
            return Selection::Terminate(TerminationSignal::BudgetExhausted);
        }
        if self.stall_limit > 0 && self.idle_streak >= self.stall_limit {
            return Selection::Terminate(TerminationSignal::Stalled);
        }

        match last {
            Some(last) => Selection::Next(last.agent.other()),
            None => Selection::Next(self.first),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AnalysisState {
        let mut s = AnalysisState::new();
        s.set_raw_text("text").unwrap();
        s
    }

    fn idle(agent: AgentId) -> Option<LastTurn> {
        Some(LastTurn {
            agent,
            progressed: false,
        })
    }

    fn busy(agent: AgentId) -> Option<LastTurn> {
        Some(LastTurn {
            agent,
            progressed: true,
        })
    }

    #[test]
    fn test_alternates_starting_with_informal() {
        let mut s = state();
        let mut strategy = AlternatingStrategy::new(10, 2);
        assert_eq!(strategy.select(&s, None), Selection::Next(AgentId::InformalFallacy));
        s.begin_turn();
        assert_eq!(
            strategy.select(&s, busy(AgentId::InformalFallacy)),
            Selection::Next(AgentId::PropositionalLogic)
        );
        s.begin_turn();
        assert_eq!(
            strategy.select(&s, busy(AgentId::PropositionalLogic)),
            Selection::Next(AgentId::InformalFallacy)
        );
    }

    #[test]
    fn test_alternates_starting_with_logic() {
        let mut s = state();
        let mut strategy = AlternatingStrategy::new(10, 2).starting_with(AgentId::PropositionalLogic);
        assert_eq!(strategy.select(&s, None), Selection::Next(AgentId::PropositionalLogic));
        s.begin_turn();
        assert_eq!(
            strategy.select(&s, busy(AgentId::PropositionalLogic)),
            Selection::Next(AgentId::InformalFallacy)
        );
    }

    #[test]
    fn test_budget() {
        let mut s = state();
        let mut strategy = AlternatingStrategy::new(1, 2);
        assert_eq!(strategy.select(&s, None), Selection::Next(AgentId::InformalFallacy));
        s.begin_turn();
        assert_eq!(
            strategy.select(&s, busy(AgentId::InformalFallacy)),
            Selection::Terminate(TerminationSignal::BudgetExhausted)
        );
    }

    #[test]
    fn test_completion_wins_over_budget() {
        let mut s = state();
        s.add_argument("a").unwrap();
        s.mark_complete(None).unwrap();
        s.begin_turn();
        let mut strategy = AlternatingStrategy::new(1, 2);
        assert_eq!(
            strategy.select(&s, busy(AgentId::InformalFallacy)),
            Selection::Terminate(TerminationSignal::Complete)
        );
    }

    #[test]
    fn test_stall_after_idle_turns() {
        let mut s = state();
        let mut strategy = AlternatingStrategy::new(10, 2);
        strategy.select(&s, None);
        s.begin_turn();
        assert_eq!(
            strategy.select(&s, idle(AgentId::InformalFallacy)),
            Selection::Next(AgentId::PropositionalLogic)
        );
        s.begin_turn();
        assert_eq!(
            strategy.select(&s, idle(AgentId::PropositionalLogic)),
            Selection::Terminate(TerminationSignal::Stalled)
        );
    }

    #[test]
    fn test_progress_resets_stall() {
        let mut s = state();
        let mut strategy = AlternatingStrategy::new(10, 2);
        strategy.select(&s, None);
        s.begin_turn();
        strategy.select(&s, idle(AgentId::InformalFallacy));
        s.begin_turn();
        strategy.select(&s, busy(AgentId::PropositionalLogic));
        assert_eq!(strategy.idle_streak(), 0);
        s.begin_turn();
        assert!(matches!(
            strategy.select(&s, idle(AgentId::InformalFallacy)),
            Selection::Next(_)
        ));
    }

    #[test]
    fn test_zero_stall_limit_disables_stall() {
        let mut s = state();
        let mut strategy = AlternatingStrategy::new(10, 0);
        strategy.select(&s, None);
        for agent in [AgentId::InformalFallacy, AgentId::PropositionalLogic, AgentId::InformalFallacy] {
            s.begin_turn();
            assert!(matches!(strategy.select(&s, idle(agent)), Selection::Next(_)));
        }
    }
}
