//! System and per-turn prompts

use crate::agent::AgentId;
use crate::state::AnalysisState;
use crate::transcript::TurnRecord;

/// How many earlier turns are replayed into the prompt
const HISTORY_WINDOW: usize = 4;

const REASONING_PREVIEW: usize = 600;

pub const INFORMAL_SYSTEM_PROMPT: &str = "You are the informal-fallacy analyst in a two-agent argumentation analysis. A propositional-logic analyst works on the same text and shares the same analysis state.

YOUR JOB:
• Identify the arguments in the text and record each one with add_argument
• Find fallacies and record them with add_fallacy, using taxonomy keys only
• Quote the offending passage exactly so it can be located in the text
• Give a confidence between 0 and 1

GUIDELINES:
• Use list_fallacy_categories and describe_fallacy when unsure of a key
• Don't record the same argument or fallacy twice; check the state first
• Call mark_complete with a short conclusion once arguments, fallacies and any logic results cover the text
• Keep your final message to a few sentences of reasoning";

pub const LOGIC_SYSTEM_PROMPT: &str = "You are the propositional-logic analyst in a two-agent argumentation analysis. An informal-fallacy analyst works on the same text and shares the same analysis state.

YOUR JOB:
• Translate the recorded arguments into a belief set (build_propositional_belief_set, or build_fol_belief_set when quantifiers matter)
• Check the belief set with check_consistency
• Test whether each conclusion follows from its premises with execute_query
• For first-order belief sets, use plan_queries to turn ideas into valid queries

GUIDELINES:
• Atoms and constants are lowercase snake_case; predicates are Capitalised
• A REJECTED conclusion is evidence the argument is invalid; say so
• Record a missing argument with add_argument if the other analyst skipped one
• Call mark_complete when the logic results settle the analysis
• Keep your final message to a few sentences of reasoning";

pub fn system_prompt(agent: AgentId) -> &'static str {
    match agent {
        AgentId::InformalFallacy => INFORMAL_SYSTEM_PROMPT,
        AgentId::PropositionalLogic => LOGIC_SYSTEM_PROMPT,
    }
}

fn preview(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// User message for one turn: the text, the current findings and the most
/// recent turns of both agents
pub fn turn_prompt(turn: u32, agent: AgentId, state: &AnalysisState, history: &[TurnRecord]) -> String {
    let mut out = format!("Turn {} ({}).\n\nTEXT UNDER ANALYSIS:\n{}\n\n", turn, agent, state.raw_text());
    out.push_str("CURRENT STATE:\n");
    out.push_str(&state.summary());

    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    if !recent.is_empty() {
        out.push_str("\nRECENT TURNS:\n");
        for r in recent {
            let tools: Vec<&str> = r.tool_calls.iter().map(|c| c.name.as_str()).collect();
            out.push_str(&format!(
                "- turn {} {} [{}]: {}\n",
                r.turn,
                r.agent,
                tools.join(", "),
                preview(r.reasoning.trim(), REASONING_PREVIEW)
            ));
        }
    }
    out.push_str("\nContinue the analysis with your tools.");
    out
}
