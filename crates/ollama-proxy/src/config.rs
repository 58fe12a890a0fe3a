use std::time::Duration;

use page_grounding::env::env_parse;

use crate::error::AppError;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5001";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1/chat/completions";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Largest request body accepted from the browser.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// Full chat-completions URL that request bodies are forwarded to.
    pub upstream_url: String,
    /// Applies to non-streaming requests only; streams run until upstream closes.
    pub timeout: Duration,
    pub rate_limit_rps: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            upstream_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            rate_limit_rps: None,
        }
    }
}

impl Config {
    /// Optional:
    /// - `PROXY_LISTEN_ADDR` (default: 127.0.0.1:5001)
    /// - `OLLAMA_URL` (default: http://localhost:11434/v1/chat/completions)
    /// - `OLLAMA_TIMEOUT_SECS` (default: 120)
    /// - `RATE_LIMIT_RPS` (0 or unset disables)
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let upstream_url = non_empty_var("OLLAMA_URL").unwrap_or(defaults.upstream_url);
        if !upstream_url.starts_with("http://") && !upstream_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "OLLAMA_URL must be an http(s) URL, got {upstream_url:?}"
            )));
        }

        let timeout_secs = env_parse::<u64>("OLLAMA_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(AppError::Config(
                "OLLAMA_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            listen_addr: non_empty_var("PROXY_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            upstream_url,
            timeout: Duration::from_secs(timeout_secs),
            rate_limit_rps: env_parse::<u32>("RATE_LIMIT_RPS")?.filter(|&n| n > 0),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
