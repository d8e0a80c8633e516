use platforms_fetcher::fetcher::FetchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("No enabled platform supports {0}")]
    UnsupportedLink(String),

    #[error("Timeout error: Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Login was not completed in time")]
    LoginExpired,

    #[error("Login flow ended without a result")]
    LoginAborted,
}

impl CliError {
    pub fn unsupported_link(url: impl Into<String>) -> Self {
        Self::UnsupportedLink(url.into())
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
