use std::time::Duration;

use page_grounding::answer::AnswerConfig;
use page_grounding::conversation::DEFAULT_REPLY_DELAY;
use page_grounding::env::env_parse;
use page_grounding::openai::OpenAiClientConfig;
use page_grounding::prompt::DEFAULT_CONTEXT_MAX_CHARS;

use crate::error::AppError;
use crate::sessions::DEFAULT_SESSION_TTL;

/// Server configuration loaded from environment variables.
///
/// Everything is optional; unset values fall back to the defaults below and a
/// value that is set but unparseable is a configuration error.
#[derive(Debug, Clone)]
pub struct Config {
    pub answer: AnswerConfig,
    /// Pause before a conversation reply is produced. Zero disables it.
    pub reply_delay: Duration,
    /// Idle time after which a chat session is discarded.
    pub session_ttl: Duration,
    /// Character budget for page text sent to the local model.
    pub context_max_chars: usize,
    pub openai: OpenAiClientConfig,
    /// Serve MCP over TCP on this address instead of stdio.
    pub tcp_listen_addr: Option<String>,
    /// Token-bucket rate for model calls; `None` disables limiting.
    pub rate_limit_rps: Option<u32>,
}

impl Config {
    /// Optional:
    /// - `GROUNDING_*` (see [`AnswerConfig::from_env`])
    /// - `CHAT_REPLY_DELAY_MS` (default: 400)
    /// - `CHAT_SESSION_TTL_SECS` (default: 86400)
    /// - `CHAT_CONTEXT_MAX_CHARS` (default: 12000)
    /// - `OPENAI_*` (see [`OpenAiClientConfig::from_env`])
    /// - `MCP_TCP_LISTEN_ADDR`
    /// - `RATE_LIMIT_RPS` (0 or unset disables)
    pub fn from_env() -> Result<Self, AppError> {
        let context_max_chars =
            env_parse("CHAT_CONTEXT_MAX_CHARS")?.unwrap_or(DEFAULT_CONTEXT_MAX_CHARS);
        if context_max_chars == 0 {
            return Err(AppError::Config(
                "CHAT_CONTEXT_MAX_CHARS must be greater than zero".to_string(),
            ));
        }

        let session_ttl = env_parse::<u64>("CHAT_SESSION_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SESSION_TTL);
        if session_ttl.is_zero() {
            return Err(AppError::Config(
                "CHAT_SESSION_TTL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            answer: AnswerConfig::from_env()?,
            reply_delay: env_parse("CHAT_REPLY_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_REPLY_DELAY),
            session_ttl,
            context_max_chars,
            openai: OpenAiClientConfig::from_env()?,
            tcp_listen_addr: std::env::var("MCP_TCP_LISTEN_ADDR")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            rate_limit_rps: env_parse::<u32>("RATE_LIMIT_RPS")?.filter(|&n| n > 0),
        })
    }
}
