mod config;
mod error;
mod routes;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use routes::{router, ProxyState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = Config::from_env()?;
    info!(
        upstream = %config.upstream_url,
        timeout_secs = config.timeout.as_secs(),
        rate_limit_rps = config.rate_limit_rps,
        "configuration loaded"
    );

    let app = router(ProxyState::new(&config)?);
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "ollama proxy ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;
    Ok(())
}
