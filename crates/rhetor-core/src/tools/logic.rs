//! Logic tools: belief sets, queries and consistency checks

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolError};
use crate::logic::{
    Declarations, KnowledgeBase, LogicError, LogicKind, LogicSolver, PropositionalBeliefSet,
    QueryIdea, QueryOutcome,
};
use crate::state::BeliefSetRecord;

/// Query text under which consistency verdicts are recorded
pub const CONSISTENCY_QUERY: &str = "consistency";

fn logic_error(tool: &str, e: LogicError) -> ToolError {
    match e {
        LogicError::SolverUnavailable(msg) => ToolError::ExternalService(msg),
        other => ToolError::invocation(tool, other.to_string()),
    }
}

fn require_solver<'a>(tool: &str, ctx: &ToolContext<'a>) -> Result<&'a dyn LogicSolver, ToolError> {
    ctx.solver
        .ok_or_else(|| ToolError::invocation(tool, "no logic solver is configured"))
}

fn belief_set(tool: &str, ctx: &ToolContext<'_>, id: &str) -> Result<BeliefSetRecord, ToolError> {
    ctx.state
        .belief_set(id)
        .cloned()
        .ok_or_else(|| ToolError::invocation(tool, format!("unknown belief set id '{}'", id)))
}

pub struct BuildPropositionalBeliefSet;

#[async_trait]
impl Tool for BuildPropositionalBeliefSet {
    type Args = PropositionalBeliefSet;
    const NAME: &'static str = "build_propositional_belief_set";

    fn description(&self) -> &'static str {
        "Translate claims into a propositional belief set. Atoms are lowercase identifiers; connectives are ! && || => <=>. Returns its id (bs_N)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "propositions": {
                    "type": "array", "items": { "type": "string" },
                    "description": "Atoms used by the formulas, e.g. sees_white_swans"
                },
                "formulas": {
                    "type": "array", "items": { "type": "string" },
                    "description": "Formulas over the atoms, e.g. sees_white_swans => all_swans_white"
                }
            },
            "required": ["propositions", "formulas"]
        })
    }

    async fn call(&self, args: PropositionalBeliefSet, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        args.validate().map_err(|e| logic_error(Self::NAME, e))?;
        let content = args.render();
        let id = ctx.state.add_belief_set(LogicKind::Propositional, content)?;
        tracing::debug!(%id, formulas = args.formulas.len(), "propositional belief set recorded");
        Ok(format!("Recorded belief set {}", id))
    }
}

pub struct BuildFolBeliefSet;

#[derive(Debug, Deserialize)]
pub struct BuildFolBeliefSetArgs {
    /// Knowledge base as free text; the first JSON object in it is used
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(flatten)]
    pub knowledge_base: KnowledgeBase,
}

impl BuildFolBeliefSetArgs {
    fn into_knowledge_base(self) -> Result<KnowledgeBase, LogicError> {
        match self.raw {
            Some(_) if self.knowledge_base != KnowledgeBase::default() => Err(LogicError::InvalidBeliefSet(
                "give either raw or sorts/predicates/formulas, not both".to_string(),
            )),
            Some(raw) => KnowledgeBase::from_model_output(&raw),
            None => Ok(self.knowledge_base),
        }
    }
}

#[async_trait]
impl Tool for BuildFolBeliefSet {
    type Args = BuildFolBeliefSetArgs;
    const NAME: &'static str = "build_fol_belief_set";

    fn description(&self) -> &'static str {
        "Translate claims into a first-order belief set from sorts, predicates and formulas, or from a raw JSON answer holding them. Formulas using undeclared constants are dropped. Returns its id (bs_N) and the rendered belief set."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sorts": {
                    "type": "object",
                    "additionalProperties": { "type": "array", "items": { "type": "string" } },
                    "description": "Sort name to its constants, e.g. {\"person\": [\"socrates\"]}"
                },
                "predicates": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "args": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["name"]
                    },
                    "description": "Capitalised predicate names with the sort of each argument"
                },
                "formulas": {
                    "type": "array", "items": { "type": "string" },
                    "description": "e.g. forall X: (Human(X) => Mortal(X))"
                },
                "raw": {
                    "type": "string",
                    "description": "Instead of the fields above: text containing a JSON object with sorts, predicates and formulas"
                }
            }
        })
    }

    async fn call(&self, args: BuildFolBeliefSetArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        let content = args
            .into_knowledge_base()
            .and_then(|kb| kb.prepare())
            .map_err(|e| logic_error(Self::NAME, e))?;
        let id = ctx.state.add_belief_set(LogicKind::FirstOrder, content.clone())?;
        Ok(format!("Recorded belief set {}:\n{}", id, content))
    }
}

pub struct PlanQueries;

#[derive(Debug, Deserialize)]
pub struct PlanQueriesArgs {
    pub belief_set_id: String,
    #[serde(default)]
    pub query_ideas: Vec<QueryIdea>,
}

#[async_trait]
impl Tool for PlanQueries {
    type Args = PlanQueriesArgs;
    const NAME: &'static str = "plan_queries";

    fn description(&self) -> &'static str {
        "Turn query ideas (predicate + constants) into valid queries for a first-order belief set. Invalid ideas are reported and skipped."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "belief_set_id": { "type": "string" },
                "query_ideas": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "predicate_name": { "type": "string" },
                            "constants": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["predicate_name"]
                    }
                }
            },
            "required": ["belief_set_id", "query_ideas"]
        })
    }

    async fn call(&self, args: PlanQueriesArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        let bs = belief_set(Self::NAME, ctx, &args.belief_set_id)?;
        if bs.logic != LogicKind::FirstOrder {
            return Err(ToolError::invocation(
                Self::NAME,
                format!("{} is not a first-order belief set", bs.id),
            ));
        }
        let decl = Declarations::parse(&bs.content);

        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        for idea in &args.query_ideas {
            match idea.to_query(&decl) {
                Ok(q) => valid.push(q),
                Err(e) => {
                    tracing::info!(predicate = %idea.predicate_name, error = %e, "query idea rejected");
                    rejected.push(e.to_string());
                }
            }
        }
        tracing::info!(valid = valid.len(), total = args.query_ideas.len(), "planned queries");

        let mut out = format!("Valid queries: [{}]", valid.join("; "));
        if !rejected.is_empty() {
            out.push_str(&format!("\nRejected: {}", rejected.join("; ")));
        }
        Ok(out)
    }
}

pub struct ExecuteQuery;

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryArgs {
    pub belief_set_id: String,
    pub query: String,
}

#[async_trait]
impl Tool for ExecuteQuery {
    type Args = ExecuteQueryArgs;
    const NAME: &'static str = "execute_query";

    fn description(&self) -> &'static str {
        "Ask the logic solver whether a belief set entails a query and record the result (ACCEPTED, REJECTED or UNKNOWN)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "belief_set_id": { "type": "string" },
                "query": { "type": "string", "description": "Formula in the belief set's logic" }
            },
            "required": ["belief_set_id", "query"]
        })
    }

    async fn call(&self, args: ExecuteQueryArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        let bs = belief_set(Self::NAME, ctx, &args.belief_set_id)?;
        let query = args.query.trim();
        let checked = match bs.logic {
            LogicKind::Propositional => PropositionalBeliefSet::check_query(&bs.content, query),
            LogicKind::FirstOrder => Declarations::parse(&bs.content).check_query(query),
        };
        checked.map_err(|e| logic_error(Self::NAME, e))?;

        let solver = require_solver(Self::NAME, ctx)?;
        let raw = solver
            .query(bs.logic, &bs.content, query)
            .await
            .map_err(|e| logic_error(Self::NAME, e))?;
        let outcome = QueryOutcome::from_raw(&raw);
        let id = ctx.state.record_logic_result(&bs.id, query, outcome, &raw)?;
        tracing::info!(%id, %query, %outcome, "query executed");
        Ok(format!("{}: {} -> {} ({})", id, query, outcome, raw.trim()))
    }
}

pub struct CheckConsistency;

#[derive(Debug, Deserialize)]
pub struct CheckConsistencyArgs {
    pub belief_set_id: String,
}

#[async_trait]
impl Tool for CheckConsistency {
    type Args = CheckConsistencyArgs;
    const NAME: &'static str = "check_consistency";

    fn description(&self) -> &'static str {
        "Ask the logic solver whether a belief set is consistent and record the verdict."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "belief_set_id": { "type": "string" }
            },
            "required": ["belief_set_id"]
        })
    }

    async fn call(&self, args: CheckConsistencyArgs, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
        let bs = belief_set(Self::NAME, ctx, &args.belief_set_id)?;
        let solver = require_solver(Self::NAME, ctx)?;
        let (consistent, message) = solver
            .consistency(bs.logic, &bs.content)
            .await
            .map_err(|e| logic_error(Self::NAME, e))?;
        let outcome = if consistent {
            QueryOutcome::Accepted
        } else {
            QueryOutcome::Rejected
        };
        let id = ctx
            .state
            .record_logic_result(&bs.id, CONSISTENCY_QUERY, outcome, &message)?;
        let verdict = if consistent { "consistent" } else { "inconsistent" };
        Ok(format!("{}: {} is {} {}", id, bs.id, verdict, message).trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AnalysisState;
    use crate::taxonomy::FallacyTaxonomy;
    use crate::tools::logic_registry;

    /// Accepts any query whose text appears verbatim as a line of the belief set
    struct LookupSolver;

    #[async_trait]
    impl LogicSolver for LookupSolver {
        async fn query(&self, _logic: LogicKind, belief_set: &str, query: &str) -> Result<String, LogicError> {
            if belief_set.lines().any(|l| l.trim() == query) {
                Ok("ACCEPTED".to_string())
            } else {
                Ok("REJECTED".to_string())
            }
        }

        async fn consistency(&self, _logic: LogicKind, _belief_set: &str) -> Result<(bool, String), LogicError> {
            Ok((true, String::new()))
        }
    }

    struct DownSolver;

    #[async_trait]
    impl LogicSolver for DownSolver {
        async fn query(&self, _: LogicKind, _: &str, _: &str) -> Result<String, LogicError> {
            Err(LogicError::SolverUnavailable("connection refused".to_string()))
        }

        async fn consistency(&self, _: LogicKind, _: &str) -> Result<(bool, String), LogicError> {
            Err(LogicError::SolverUnavailable("connection refused".to_string()))
        }
    }

    fn state() -> AnalysisState {
        let mut s = AnalysisState::new();
        s.set_raw_text("All men are mortal. Socrates is a man.").unwrap();
        s
    }

    fn fol_kb() -> Value {
        json!({
            "sorts": {"person": ["socrates"]},
            "predicates": [{"name": "Man", "args": ["person"]}, {"name": "Mortal", "args": ["person"]}],
            "formulas": ["Man(socrates)", "forall X: (Man(X) => Mortal(X))"]
        })
    }

    #[tokio::test]
    async fn test_fol_pipeline() {
        let registry = logic_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let solver = LookupSolver;
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: Some(&solver),
        };

        let out = registry.dispatch("build_fol_belief_set", fol_kb(), &mut ctx).await.unwrap();
        assert!(out.starts_with("Recorded belief set bs_1"));

        let plan = registry
            .dispatch(
                "plan_queries",
                json!({"belief_set_id": "bs_1", "query_ideas": [
                    {"predicate_name": "Man", "constants": ["socrates"]},
                    {"predicate_name": "Mortal", "constants": ["plato"]}
                ]}),
                &mut ctx,
            )
            .await
            .unwrap();
        assert!(plan.starts_with("Valid queries: [Man(socrates)]"));
        assert!(plan.contains("plato"));

        let out = registry
            .dispatch("execute_query", json!({"belief_set_id": "bs_1", "query": "Man(socrates)"}), &mut ctx)
            .await
            .unwrap();
        assert!(out.starts_with("logic_1: Man(socrates) -> ACCEPTED"));

        let out = registry
            .dispatch("check_consistency", json!({"belief_set_id": "bs_1"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, "logic_2: bs_1 is consistent");

        assert_eq!(state.logic_results().len(), 2);
        assert_eq!(state.logic_results()[0].outcome, QueryOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_fol_belief_set_from_raw_answer() {
        let registry = logic_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: None,
        };

        // Fenced and cut off before the closing brace
        let raw = "Here is the base:\n```json\n{\"sorts\": {\"person\": [\"socrates\"]}, \
                   \"predicates\": [{\"name\": \"Man\", \"args\": [\"person\"]}], \
                   \"formulas\": [\"Man(socrates)\", \"Man(plato)\"]";
        let out = registry
            .dispatch("build_fol_belief_set", json!({ "raw": raw }), &mut ctx)
            .await
            .unwrap();
        assert!(out.starts_with("Recorded belief set bs_1"), "{}", out);
        assert!(out.contains("Man(socrates)"));
        assert!(!out.contains("plato"));

        let err = registry
            .dispatch("build_fol_belief_set", json!({"raw": "no knowledge base here"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Invocation { .. }));

        let mut both = fol_kb();
        both["raw"] = json!(raw);
        let err = registry.dispatch("build_fol_belief_set", both, &mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("not both"));
        assert_eq!(state.belief_sets().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_fatal() {
        let registry = logic_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: None,
        };

        let err = registry
            .dispatch(
                "build_propositional_belief_set",
                json!({"propositions": ["rain"], "formulas": ["rain => wet"]}),
                &mut ctx,
            )
            .await
            .unwrap_err();
        assert!(!err.is_fatal());

        registry
            .dispatch(
                "build_propositional_belief_set",
                json!({"propositions": ["rain", "wet"], "formulas": ["rain => wet", "rain"]}),
                &mut ctx,
            )
            .await
            .unwrap();

        // solver missing
        let err = registry
            .dispatch("execute_query", json!({"belief_set_id": "bs_1", "query": "wet"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Invocation { .. }));

        // unknown belief set
        let err = registry
            .dispatch("execute_query", json!({"belief_set_id": "bs_9", "query": "wet"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_solver_failure_is_fatal() {
        let registry = logic_registry().unwrap();
        let taxonomy = FallacyTaxonomy::builtin();
        let solver = DownSolver;
        let mut state = state();
        let mut ctx = ToolContext {
            state: &mut state,
            taxonomy: &taxonomy,
            solver: Some(&solver),
        };
        registry
            .dispatch(
                "build_propositional_belief_set",
                json!({"propositions": ["rain", "wet"], "formulas": ["rain => wet"]}),
                &mut ctx,
            )
            .await
            .unwrap();
        let err = registry
            .dispatch("execute_query", json!({"belief_set_id": "bs_1", "query": "wet"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExternalService(_)));
        assert!(err.is_fatal());
    }
}
