//! OpenAI-compatible chat completions oracle.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::context::ReviewContext;
use crate::error::{OracleError, OracleResult};
use crate::oracle::DecisionOracle;

const DEFAULT_ENDPOINT: &str = "http://localhost:5273/v1/chat/completions";
const DEFAULT_MODEL: &str = "phi-4-mini";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Connection settings for [`HttpOracle`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HttpOracleConfig {
    /// Base URL or full `/chat/completions` URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer key, if the server needs one
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Honor HTTP(S)_PROXY from the environment
    #[serde(default)]
    pub use_system_proxy: bool,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            use_system_proxy: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Decision oracle backed by an OpenAI-compatible LLM server.
pub struct HttpOracle {
    client: Client,
    url: String,
    api_key: Option<String>,
    config: HttpOracleConfig,
    identifier: String,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> OracleResult<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| OracleError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let api_key = match config.api_key_env.as_deref() {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                OracleError::Configuration(format!("environment variable {var} is not set"))
            })?),
            None => None,
        };

        Ok(Self {
            client,
            url: resolve_chat_endpoint(&config.endpoint),
            api_key,
            identifier: format!("http:{}", config.model),
            config,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }
}

#[async_trait]
impl DecisionOracle for HttpOracle {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn decide(&self, context: &ReviewContext) -> OracleResult<String> {
        let mut request = self.client.post(&self.url).json(&self.payload(&context.prompt));
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        debug!(url = %self.url, prompt_chars = context.prompt.len(), "Calling decision oracle");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(self.config.request_timeout_secs.saturating_mul(1000))
            } else {
                OracleError::Unavailable(format!("request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Http {
                status,
                body: truncate(&body, 320),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("invalid chat response: {e}")))?;

        let choice = body
            .choices
            .first()
            .ok_or_else(|| OracleError::InvalidResponse("response did not include choices".into()))?;

        Ok(extract_text(&choice.message.content).trim().to_string())
    }
}

fn resolve_chat_endpoint(endpoint: &str) -> String {
    if endpoint.contains("/chat/completions") {
        endpoint.to_string()
    } else {
        format!("{}/chat/completions", endpoint.trim_end_matches('/'))
    }
}

fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}
