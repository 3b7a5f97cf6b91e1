//! Informal-fallacy tools: taxonomy lookup, coherence, arguments and fallacies

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolError};
use crate::coherence::CoherenceAnalyzer;
use crate::state::{NewFallacy, TextSpan};

/// Confidence recorded when the model gives none
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Deserialize)]
pub struct NoArgs {}

pub struct ListFallacyCategories;

#[async_trait]
impl Tool for ListFallacyCategories {
    type Args = NoArgs;
    const NAME: &'static str = "list_fallacy_categories";

    fn description(&self) -> &'static str {
        "List the fallacy taxonomy grouped by category, with the key of every fallacy"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _args: NoArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        let mut out = String::new();
        for (category, keys) in ctx.taxonomy.categories() {
            out.push_str(&format!("{}: {}\n", category, keys.join(", ")));
        }
        Ok(out)
    }
}

pub struct DescribeFallacy;

#[derive(Debug, Deserialize)]
pub struct DescribeFallacyArgs {
    pub key: String,
}

#[async_trait]
impl Tool for DescribeFallacy {
    type Args = DescribeFallacyArgs;
    const NAME: &'static str = "describe_fallacy";

    fn description(&self) -> &'static str {
        "Get the definition and an example of a fallacy by its taxonomy key"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Taxonomy key, e.g. hasty_generalization" }
            },
            "required": ["key"]
        })
    }

    async fn call(&self, args: DescribeFallacyArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        match ctx.taxonomy.get(&args.key) {
            Some(e) => Ok(format!(
                "{} ({}, category {})\n{}\nExample: {}",
                e.name, e.key, e.category, e.description, e.example
            )),
            None => {
                let close: Vec<&str> = ctx
                    .taxonomy
                    .search(&args.key.replace('_', " "))
                    .into_iter()
                    .map(|e| e.key.as_str())
                    .collect();
                Err(ToolError::invocation(
                    Self::NAME,
                    format!("no fallacy with key '{}'; similar: [{}]", args.key, close.join(", ")),
                ))
            }
        }
    }
}

pub struct AddArgument;

#[derive(Debug, Deserialize)]
pub struct AddArgumentArgs {
    pub description: String,
}

#[async_trait]
impl Tool for AddArgument {
    type Args = AddArgumentArgs;
    const NAME: &'static str = "add_argument";

    fn description(&self) -> &'static str {
        "Record an argument identified in the text. Returns its id (arg_N)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": { "type": "string", "description": "The argument, premises and conclusion, in one or two sentences" }
            },
            "required": ["description"]
        })
    }

    async fn call(&self, args: AddArgumentArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        let id = ctx.state.add_argument(&args.description)?;
        tracing::debug!(%id, "argument recorded");
        Ok(format!("Recorded argument {}", id))
    }
}

pub struct AddFallacy;

#[derive(Debug, Deserialize)]
pub struct AddFallacyArgs {
    pub fallacy_type: String,
    pub justification: String,
    #[serde(default)]
    pub target_argument_id: Option<String>,
    /// Exact passage of the text the fallacy occurs in
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[async_trait]
impl Tool for AddFallacy {
    type Args = AddFallacyArgs;
    const NAME: &'static str = "add_fallacy";

    fn description(&self) -> &'static str {
        "Record a fallacy. fallacy_type must be a taxonomy key. Returns its id (fallacy_N)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "fallacy_type": { "type": "string", "description": "Taxonomy key of the fallacy" },
                "justification": { "type": "string", "description": "Why this passage commits the fallacy" },
                "target_argument_id": { "type": "string", "description": "Id of the argument it belongs to (arg_N)" },
                "quote": { "type": "string", "description": "Exact quote of the offending passage" },
                "confidence": { "type": "number", "description": "Confidence between 0 and 1" }
            },
            "required": ["fallacy_type", "justification"]
        })
    }

    async fn call(&self, args: AddFallacyArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        if !ctx.taxonomy.contains(&args.fallacy_type) {
            return Err(ToolError::invocation(
                Self::NAME,
                format!(
                    "'{}' is not a taxonomy key; call list_fallacy_categories",
                    args.fallacy_type
                ),
            ));
        }

        let mut note = String::new();
        let span = match args.quote.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(quote) => match ctx.state.raw_text().find(quote) {
                Some(start) => Some(TextSpan {
                    start,
                    end: start + quote.len(),
                }),
                None => {
                    note = " (quote not found in text, recorded without span)".to_string();
                    None
                }
            },
            None => None,
        };

        let id = ctx.state.add_fallacy(NewFallacy {
            fallacy_type: args.fallacy_type,
            justification: args.justification,
            target_argument_id: args.target_argument_id,
            span,
            confidence: args.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        })?;
        tracing::debug!(%id, "fallacy recorded");
        Ok(format!("Recorded fallacy {}{}", id, note))
    }
}

pub struct AssessCoherence {
    analyzer: CoherenceAnalyzer,
}

impl AssessCoherence {
    pub fn new(analyzer: CoherenceAnalyzer) -> Self {
        Self { analyzer }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssessCoherenceArgs {
    /// Defaults to the whole text under analysis
    #[serde(default)]
    pub passage: Option<String>,
    #[serde(default)]
    pub previous_summary: Option<String>,
}

#[async_trait]
impl Tool for AssessCoherence {
    type Args = AssessCoherenceArgs;
    const NAME: &'static str = "assess_coherence";

    fn description(&self) -> &'static str {
        "Heuristic coherence score (0 to 1) of the text or a passage of it, from transitions, \
         recurring keywords, contradictions and topic drift"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "passage": { "type": "string", "description": "Passage to score; omit for the whole text" },
                "previous_summary": { "type": "string", "description": "Summary of what came before, to detect topic changes" }
            }
        })
    }

    async fn call(&self, args: AssessCoherenceArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        let text = match args.passage.as_deref() {
            Some(passage) => passage,
            None => ctx.state.raw_text(),
        };
        let report = self
            .analyzer
            .analyze(text, args.previous_summary.as_deref())
            .map_err(|e| ToolError::invocation(Self::NAME, e.to_string()))?;
        let s = &report.signals;
        let mut out = format!(
            "Coherence {:.2} ({})\ntransition ratio {:.3} over {} words, {} sentences",
            report.score, report.interpretation, s.transition_ratio, s.words, s.sentences
        );
        if !s.repeated_keywords.is_empty() {
            out.push_str(&format!("\nrecurring keywords: {}", s.repeated_keywords.join(", ")));
        }
        for (a, b) in &s.contradictions {
            out.push_str(&format!("\ncontradiction: '{}' vs '{}'", a, b));
        }
        if s.topic_change {
            out.push_str("\ntopic change from the previous summary");
        }
        Ok(out)
    }
}

pub struct MarkComplete;

#[derive(Debug, Deserialize)]
pub struct MarkCompleteArgs {
    #[serde(default)]
    pub conclusion: Option<String>,
}

#[async_trait]
impl Tool for MarkComplete {
    type Args = MarkCompleteArgs;
    const NAME: &'static str = "mark_complete";

    fn description(&self) -> &'static str {
        "Declare the analysis finished. Only allowed once at least one argument is recorded."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "conclusion": { "type": "string", "description": "Short overall verdict on the text" }
            }
        })
    }

    async fn call(&self, args: MarkCompleteArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        ctx.state.mark_complete(args.conclusion)?;
        Ok("Analysis marked complete".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AnalysisState, StateError};
    use crate::taxonomy::FallacyTaxonomy;
    use crate::tools::informal_registry;

    const SWANS: &str = "Every swan I have ever seen is white. Therefore all swans are white.";

    fn state() -> AnalysisState {
        let mut s = AnalysisState::new();
        s.set_raw_text(SWANS).unwrap();
        s
    }

    #[tokio::test]
    async fn test_add_fallacy_locates_quote() {
        let registry = informal_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: None,
        };

        registry
            .dispatch("add_argument", json!({"description": "All swans are white"}), &mut ctx)
            .await
            .unwrap();
        let out = registry
            .dispatch(
                "add_fallacy",
                json!({
                    "fallacy_type": "hasty_generalization",
                    "justification": "Generalizes from observed swans",
                    "target_argument_id": "arg_1",
                    "quote": "all swans are white"
                }),
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(out, "Recorded fallacy fallacy_1");

        let f = &state.fallacies()[0];
        assert_eq!(f.confidence, DEFAULT_CONFIDENCE);
        let span = f.span.unwrap();
        assert_eq!(&SWANS[span.start..span.end], "all swans are white");
    }

    #[tokio::test]
    async fn test_add_fallacy_rejects_unknown_type() {
        let registry = informal_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: None,
        };
        let err = registry
            .dispatch(
                "add_fallacy",
                json!({"fallacy_type": "made_up", "justification": "x"}),
                &mut ctx,
            )
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(state.fallacies().is_empty());
    }

    #[tokio::test]
    async fn test_missing_quote_is_recorded_without_span() {
        let registry = informal_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: None,
        };
        let out = registry
            .dispatch(
                "add_fallacy",
                json!({"fallacy_type": "hasty_generalization", "justification": "x", "quote": "black swan", "confidence": 0.9}),
                &mut ctx,
            )
            .await
            .unwrap();
        assert!(out.contains("without span"));
        assert!(state.fallacies()[0].span.is_none());
    }

    #[tokio::test]
    async fn test_mark_complete_needs_argument() {
        let registry = informal_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: None,
        };
        let err = registry
            .dispatch("mark_complete", json!({}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::State(StateError::InvalidStateTransition(_))));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_describe_and_list() {
        let registry = informal_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: None,
        };
        let listing = registry
            .dispatch("list_fallacy_categories", Value::Null, &mut ctx)
            .await
            .unwrap();
        assert!(listing.contains("induction: hasty_generalization"));
        let described = registry
            .dispatch("describe_fallacy", json!({"key": "straw_man"}), &mut ctx)
            .await
            .unwrap();
        assert!(described.starts_with("Straw man"));
    }

    #[tokio::test]
    async fn test_assess_coherence() {
        let registry = informal_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: None,
        };

        // Whole text: two sentences and one transition word
        let out = registry
            .dispatch("assess_coherence", Value::Null, &mut ctx)
            .await
            .unwrap();
        assert!(out.starts_with("Coherence 0.80 (very coherent)"), "{}", out);

        let out = registry
            .dispatch(
                "assess_coherence",
                json!({"passage": "I like chocolate. But sometimes I don't like chocolate at all."}),
                &mut ctx,
            )
            .await
            .unwrap();
        assert!(out.starts_with("Coherence 0.20 (incoherent)"), "{}", out);
        assert!(out.contains("contradiction: 'i like' vs 'i don't like'"));

        let err = registry
            .dispatch("assess_coherence", json!({"passage": "  "}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Invocation { .. }));
        assert!(!err.is_fatal());
    }
}
