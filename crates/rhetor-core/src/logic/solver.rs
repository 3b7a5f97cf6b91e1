//! External logic solver

use async_trait::async_trait;
use serde_json::Value;

use super::{LogicError, LogicKind};

/// Something that decides queries and consistency over a belief set
#[async_trait]
pub trait LogicSolver: Send + Sync {
    /// Raw solver answer for `query`, to be read with
    /// [`QueryOutcome::from_raw`](super::QueryOutcome::from_raw)
    async fn query(&self, logic: LogicKind, belief_set: &str, query: &str) -> Result<String, LogicError>;

    /// Whether the belief set is consistent, plus the solver's message
    async fn consistency(&self, logic: LogicKind, belief_set: &str) -> Result<(bool, String), LogicError>;
}

/// Solver service spoken to over HTTP JSON.
///
/// `POST {base}/query` with `{logic, belief_set, query}` answers `{result}`;
/// `POST {base}/consistency` with `{logic, belief_set}` answers
/// `{consistent, message}`.
pub struct HttpLogicSolver {
    base_url: String,
    http: reqwest::Client,
}

impl HttpLogicSolver {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn post(&self, op: &str, body: Value) -> Result<Value, LogicError> {
        let url = format!("{}/{}", self.base_url, op);
        tracing::debug!(%url, "solver request");
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LogicError::SolverUnavailable(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        let json: Value = resp
            .json()
            .await
            .map_err(|e| LogicError::SolverUnavailable(format!("unreadable solver response: {}", e)))?;

        if !status.is_success() {
            let msg = json["error"].as_str().unwrap_or("unknown solver error");
            return Err(LogicError::SolverUnavailable(format!("{}: {}", status, msg)));
        }
        Ok(json)
    }
}

#[async_trait]
impl LogicSolver for HttpLogicSolver {
    async fn query(&self, logic: LogicKind, belief_set: &str, query: &str) -> Result<String, LogicError> {
        let json = self
            .post(
                "query",
                serde_json::json!({ "logic": logic, "belief_set": belief_set, "query": query }),
            )
            .await?;
        // A solver-side parse failure comes back as text, not as a status
        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            return Ok(format!("ERROR: {}", err));
        }
        json["result"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LogicError::SolverUnavailable("solver answer has no result".to_string()))
    }

    async fn consistency(&self, logic: LogicKind, belief_set: &str) -> Result<(bool, String), LogicError> {
        let json = self
            .post(
                "consistency",
                serde_json::json!({ "logic": logic, "belief_set": belief_set }),
            )
            .await?;
        let consistent = json["consistent"]
            .as_bool()
            .ok_or_else(|| LogicError::SolverUnavailable("solver answer has no verdict".to_string()))?;
        let message = json["message"].as_str().unwrap_or_default().to_string();
        Ok((consistent, message))
    }
}
