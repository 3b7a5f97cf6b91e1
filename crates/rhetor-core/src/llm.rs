//! LLM provider abstraction

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Default chat-completions endpoint
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed API response: {0}")]
    Malformed(String),
}

/// A tool call requested by the LLM
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A response from the LLM
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Assistant message as returned, for replaying into the conversation
    pub raw_message: Value,
}

impl LlmResponse {
    /// Plain text answer without tool calls
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            raw_message: serde_json::json!({ "role": "assistant", "content": content }),
            content: Some(content),
            tool_calls: Vec::new(),
        }
    }

    /// Answer consisting of tool calls only
    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        let raw_calls: Vec<Value> = calls
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "type": "function",
                    "function": { "name": c.name, "arguments": c.arguments.to_string() }
                })
            })
            .collect();
        Self {
            raw_message: serde_json::json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": raw_calls,
            }),
            content: None,
            tool_calls: calls,
        }
    }
}

/// Trait for chat-completion providers
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the conversation and the available tool schemas
    async fn complete(&self, messages: &[Value], tools: &[Value]) -> Result<LlmResponse, LlmError>;

    fn model(&self) -> &str;
}

/// Configuration for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub temperature: f64,
}

/// Any chat-completions API speaking the OpenAI wire format (OpenRouter by
/// default)
pub struct OpenAiCompatibleClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: LlmConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// HTTP client with the request timeout used for LLM calls
    pub fn default_http(timeout: Duration) -> Result<reqwest::Client, LlmError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))
    }
}

/// Pull text and tool calls out of a chat-completions response body
pub fn parse_response(json: &Value) -> Result<LlmResponse, LlmError> {
    if let Some(err) = json.get("error") {
        let msg = err["message"].as_str().unwrap_or("Unknown API error");
        return Err(LlmError::Api(msg.to_string()));
    }

    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LlmError::Malformed("no choices[0].message".to_string()))?;

    let tool_calls = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|calls| {
            calls
                .iter()
                .map(|tc| {
                    let name = tc["function"]["name"].as_str().unwrap_or("").to_string();
                    // Arguments arrive as a JSON string; unparseable ones stay a
                    // string and are refused at dispatch
                    let arguments = match &tc["function"]["arguments"] {
                        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|e| {
                            tracing::warn!(tool = %name, error = %e, "tool arguments are not valid JSON");
                            Value::String(s.clone())
                        }),
                        Value::Null => serde_json::json!({}),
                        other => other.clone(),
                    };
                    ToolCall {
                        id: tc["id"].as_str().unwrap_or("").to_string(),
                        name,
                        arguments,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        content: message["content"].as_str().map(str::to_string),
        tool_calls,
        raw_message: message.clone(),
    })
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[Value], tools: &[Value]) -> Result<LlmResponse, LlmError> {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
            body["tool_choice"] = Value::String("auto".to_string());
        }

        let resp = self
            .http
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let json: Value = resp
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("Failed to parse API response: {}", e)))?;

        let parsed = parse_response(&json);
        if let Err(e) = &parsed {
            tracing::error!(
                model = %self.config.model,
                error = %e,
                response = %serde_json::to_string(&json).unwrap_or_default(),
                "LLM call failed"
            );
        }
        parsed
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
