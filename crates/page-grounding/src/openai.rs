//! Client for the local model host's OpenAI-compatible API (Ollama serves one
//! under `/v1`).
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::env::env_parse;
use crate::error::GroundingError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(5_000),
            max_error_body_bytes: 8 * 1024,
        }
    }
}

impl OpenAiClientConfig {
    /// Optional:
    /// - `OPENAI_BASE_URL` (default: "http://localhost:11434/v1")
    /// - `OPENAI_TIMEOUT_SECS`, `OPENAI_MAX_RETRIES`
    /// - `OPENAI_RETRY_INITIAL_MS`, `OPENAI_RETRY_MAX_MS`
    /// - `OPENAI_MAX_ERROR_BODY_BYTES`
    pub fn from_env() -> Result<Self, GroundingError> {
        let defaults = Self::default();
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| defaults.base_url.clone());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout: env_parse("OPENAI_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            max_retries: env_parse("OPENAI_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            initial_backoff: env_parse("OPENAI_RETRY_INITIAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            max_backoff: env_parse("OPENAI_RETRY_MAX_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            max_error_body_bytes: env_parse("OPENAI_MAX_ERROR_BODY_BYTES")?
                .unwrap_or(defaults.max_error_body_bytes),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("response had no assistant content")]
    EmptyCompletion,
}

#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, OpenAiClientError> {
        let http = reqwest::Client::builder()
            .user_agent("page-assistant")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiClientConfig {
        &self.config
    }

    pub async fn list_models(&self) -> Result<ModelListResponse, OpenAiClientError> {
        let url = format!("{}/models", self.config.base_url);
        self.with_retry(|| async {
            let resp = self
                .http
                .get(&url)
                .timeout(self.config.default_timeout)
                .send()
                .await?;
            self.parse_json(resp).await
        })
        .await
    }

    pub async fn chat_completions(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiClientError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        self.with_retry(|| async {
            let resp = self
                .http
                .post(&url)
                .timeout(self.config.default_timeout)
                .json(request)
                .send()
                .await?;
            self.parse_json(resp).await
        })
        .await
    }

    /// Run a chat completion and return the first choice's assistant text.
    pub async fn complete_text(
        &self,
        model: &str,
        messages: Vec<Message>,
    ) -> Result<String, OpenAiClientError> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: Some(0.2),
            max_tokens: None,
            stream: None,
        };
        let response = self.chat_completions(&request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(OpenAiClientError::EmptyCompletion)
    }

    async fn parse_json<T: for<'de> Deserialize<'de>>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, OpenAiClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }
        let body = read_limited_text(resp, self.config.max_error_body_bytes).await;
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => Err(OpenAiClientError::Upstream {
                status,
                message: envelope
                    .error
                    .message
                    .unwrap_or_else(|| "unknown upstream error".to_string()),
            }),
            Err(_) => Err(OpenAiClientError::UpstreamBody { status, body }),
        }
    }

    async fn with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, OpenAiClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, OpenAiClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt <= self.config.max_retries && is_retryable(&e) => {
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "model request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(err: &OpenAiClientError) -> bool {
    match err {
        OpenAiClientError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        OpenAiClientError::Upstream { status, .. }
        | OpenAiClientError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        OpenAiClientError::EmptyCompletion => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let capped_ms = initial
        .as_millis()
        .saturating_mul(mult)
        .min(max.as_millis()) as u64;
    let jitter_cap = (capped_ms / 4).max(1);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms(jitter_cap)))
}

fn jitter_ms(max_inclusive: u64) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % (max_inclusive + 1)
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(bytes) => {
            let end = bytes.len().min(max_bytes);
            String::from_utf8_lossy(&bytes[..end]).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorObject,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModelListResponse {
    pub object: Option<String>,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModelInfo {
    pub id: String,
    pub object: Option<String>,
    pub created: Option<i64>,
    pub owned_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}
