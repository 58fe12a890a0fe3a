#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Grounding(#[from] page_grounding::error::GroundingError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}
