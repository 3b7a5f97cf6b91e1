//! Final reports
//!
//! Every run, however it ended, produces a JSON report, a markdown report
//! and the JSONL transcript.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orchestrator::{RunOutcome, RunState, TerminationReason, TransitionRecord};
use crate::state::{Argument, BeliefSetRecord, Fallacy, LogicResult};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub final_state: RunState,
    pub reason: TerminationReason,
    pub turns: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub text: String,
    pub arguments: Vec<Argument>,
    pub fallacies: Vec<Fallacy>,
    pub belief_sets: Vec<BeliefSetRecord>,
    pub logic_results: Vec<LogicResult>,
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    pub partial_turns: Vec<u32>,
    pub transitions: Vec<TransitionRecord>,
}

/// Where [`write_reports`] put its files
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub transcript: PathBuf,
}

impl AnalysisReport {
    pub fn from_outcome(outcome: &RunOutcome, source: Option<&str>) -> Self {
        let state = &outcome.state;
        Self {
            run_id: outcome.run_id,
            source: source.map(str::to_string),
            final_state: outcome.final_state,
            reason: outcome.reason.clone(),
            turns: state.turn_counter(),
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            text: state.raw_text().to_string(),
            arguments: state.arguments().to_vec(),
            fallacies: state.fallacies().to_vec(),
            belief_sets: state.belief_sets().to_vec(),
            logic_results: state.logic_results().to_vec(),
            complete: state.is_complete(),
            conclusion: state.conclusion().map(str::to_string),
            partial_turns: outcome
                .transcript
                .records()
                .iter()
                .filter(|r| r.partial)
                .map(|r| r.turn)
                .collect(),
            transitions: outcome.transitions.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn quote(&self, fallacy: &Fallacy) -> Option<&str> {
        let span = fallacy.span?;
        self.text.get(span.start..span.end)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# Argumentation analysis report\n\n");
        md.push_str(&format!("- Run: `{}`\n", self.run_id));
        if let Some(source) = &self.source {
            md.push_str(&format!("- Source: {}\n", source));
        }
        md.push_str(&format!("- Final state: {}\n", self.final_state));
        md.push_str(&format!("- Termination: {}\n", self.reason));
        md.push_str(&format!("- Turns: {}\n", self.turns));
        md.push_str(&format!(
            "- Duration: {} s\n",
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
        ));
        if !self.partial_turns.is_empty() {
            let turns: Vec<String> = self.partial_turns.iter().map(u32::to_string).collect();
            md.push_str(&format!("- Partial turns: {}\n", turns.join(", ")));
        }

        if let Some(conclusion) = &self.conclusion {
            md.push_str(&format!("\n## Conclusion\n\n{}\n", conclusion));
        }

        md.push_str("\n## Text\n\n");
        for line in self.text.lines() {
            md.push_str(&format!("> {}\n", line));
        }

        md.push_str(&format!("\n## Arguments ({})\n\n", self.arguments.len()));
        if self.arguments.is_empty() {
            md.push_str("_None identified._\n");
        }
        for a in &self.arguments {
            md.push_str(&format!("- **{}**: {}\n", a.id, a.description));
        }

        md.push_str(&format!("\n## Fallacies ({})\n\n", self.fallacies.len()));
        if self.fallacies.is_empty() {
            md.push_str("_None detected._\n");
        }
        for f in &self.fallacies {
            md.push_str(&format!(
                "### {}: {}\n\n- Confidence: {:.2}\n",
                f.id, f.fallacy_type, f.confidence
            ));
            if let Some(target) = &f.target_argument_id {
                md.push_str(&format!("- Argument: {}\n", target));
            }
            if let Some(quote) = self.quote(f) {
                md.push_str(&format!("- Passage: \"{}\"\n", quote));
            }
            md.push_str(&format!("\n{}\n\n", f.justification));
        }

        if !self.belief_sets.is_empty() {
            md.push_str(&format!("\n## Belief sets ({})\n\n", self.belief_sets.len()));
            for b in &self.belief_sets {
                md.push_str(&format!("**{}** ({})\n\n```\n{}\n```\n\n", b.id, b.logic, b.content));
            }
        }

        if !self.logic_results.is_empty() {
            md.push_str("\n## Logic results\n\n| Id | Belief set | Query | Outcome |\n|---|---|---|---|\n");
            for r in &self.logic_results {
                md.push_str(&format!(
                    "| {} | {} | `{}` | {} |\n",
                    r.id, r.belief_set_id, r.query, r.outcome
                ));
            }
        }

        md
    }
}

/// Write `<run_id>.json`, `<run_id>.md` and `<run_id>.transcript.jsonl`
/// into `dir`
pub async fn write_reports(
    outcome: &RunOutcome,
    source: Option<&str>,
    dir: &Path,
) -> Result<ReportPaths, ReportError> {
    tokio::fs::create_dir_all(dir).await?;
    let report = AnalysisReport::from_outcome(outcome, source);
    let paths = ReportPaths {
        json: dir.join(format!("{}.json", outcome.run_id)),
        markdown: dir.join(format!("{}.md", outcome.run_id)),
        transcript: dir.join(format!("{}.transcript.jsonl", outcome.run_id)),
    };
    tokio::fs::write(&paths.json, report.to_json()?).await?;
    tokio::fs::write(&paths.markdown, report.to_markdown()).await?;
    tokio::fs::write(&paths.transcript, outcome.transcript.to_jsonl()?).await?;
    tracing::info!(run_id = %outcome.run_id, dir = %dir.display(), "reports written");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;
    use crate::orchestrator::ErrorCause;
    use crate::state::{AnalysisState, NewFallacy, StateDelta, TextSpan};
    use crate::transcript::{Transcript, TurnRecord};

    const TEXT: &str = "All swans I have seen are white. So all swans are white.";

    fn outcome(reason: TerminationReason, final_state: RunState) -> RunOutcome {
        let mut state = AnalysisState::new();
        state.set_raw_text(TEXT).unwrap();
        state.begin_turn();
        state.add_argument("All swans are white").unwrap();
        let start = TEXT.find("all swans are white").unwrap();
        state
            .add_fallacy(NewFallacy {
                fallacy_type: "hasty_generalization".to_string(),
                justification: "Too few swans".to_string(),
                target_argument_id: Some("arg_1".to_string()),
                span: Some(TextSpan {
                    start,
                    end: start + "all swans are white".len(),
                }),
                confidence: 0.8,
            })
            .unwrap();
        let run_id = Uuid::new_v4();
        let mut transcript = Transcript::new(run_id);
        transcript.push(TurnRecord {
            turn: 1,
            agent: AgentId::InformalFallacy,
            reasoning: "found it".to_string(),
            tool_calls: vec![],
            delta: StateDelta::default(),
            partial: true,
            error: None,
            timestamp: Utc::now(),
        });
        RunOutcome {
            run_id,
            final_state,
            reason,
            state,
            transcript,
            transitions: vec![],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_markdown_contents() {
        let o = outcome(TerminationReason::BudgetExhausted, RunState::TerminatedBudgetExhausted);
        let md = AnalysisReport::from_outcome(&o, Some("demo-swans")).to_markdown();
        assert!(md.contains("- Termination: budget exhausted"));
        assert!(md.contains("- Source: demo-swans"));
        assert!(md.contains("### fallacy_1: hasty_generalization"));
        assert!(md.contains("- Passage: \"all swans are white\""));
        assert!(md.contains("- Partial turns: 1"));
    }

    #[test]
    fn test_error_reason_in_json() {
        let o = outcome(
            TerminationReason::Error {
                cause: ErrorCause::Cancelled,
                message: "run cancelled".to_string(),
            },
            RunState::TerminatedError,
        );
        let report = AnalysisReport::from_outcome(&o, None);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["final_state"], "terminated_error");
        assert_eq!(json["reason"]["cause"], "cancelled");
        assert_eq!(json["fallacies"][0]["fallacy_type"], "hasty_generalization");
        assert!(json.get("source").is_none());
    }

    #[tokio::test]
    async fn test_write_reports() {
        let dir = tempfile::tempdir().unwrap();
        let o = outcome(TerminationReason::Complete, RunState::TerminatedComplete);
        let paths = write_reports(&o, None, &dir.path().join("reports")).await.unwrap();
        assert!(paths.json.exists());
        assert!(paths.markdown.exists());
        let transcript = tokio::fs::read_to_string(&paths.transcript).await.unwrap();
        assert_eq!(transcript.lines().count(), 1);
    }
}
