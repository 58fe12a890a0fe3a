mod config;
mod error;
mod server;
mod sessions;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use page_grounding::answer::AnswerEngine;
use page_grounding::openai::OpenAiClient;
use page_grounding::rate_limit::RateLimiter;

use config::Config;
use server::PageAssistantServer;
use sessions::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting page-assistant MCP server");

    let config = Config::from_env()?;
    info!(
        max_matches = config.answer.max_matches,
        min_sentence_chars = config.answer.min_sentence_chars,
        reply_delay_ms = config.reply_delay.as_millis(),
        session_ttl_secs = config.session_ttl.as_secs(),
        model_base_url = %config.openai.base_url,
        rate_limit_rps = config.rate_limit_rps,
        "configuration loaded"
    );

    let openai = Arc::new(OpenAiClient::new(config.openai.clone())?);
    let sessions =
        SessionStore::new(config.answer.clone(), config.reply_delay, config.session_ttl);
    let limiter = config.rate_limit_rps.map(RateLimiter::new);

    let server = PageAssistantServer::new(
        AnswerEngine::new(config.answer.clone()),
        sessions,
        openai,
        limiter,
        config.context_max_chars,
    );

    if let Some(addr) = config.tcp_listen_addr.as_deref() {
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let Some((stream, peer)) = accepted(listener.accept().await) else {
                continue;
            };
            let server = server.clone();
            tokio::spawn(async move {
                info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}

/// A failed accept is logged and skipped; the listener keeps serving.
fn accepted<T>(result: std::io::Result<T>) -> Option<T> {
    result
        .inspect_err(|e| warn!(error = %e, "failed to accept MCP client"))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn accept_errors_are_skipped() {
        let failed: io::Result<u8> = Err(io::Error::other("too many open files"));
        assert_eq!(accepted(failed), None);
        assert_eq!(accepted(Ok(7u8)), Some(7));
    }
}
