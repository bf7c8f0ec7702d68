use thiserror::Error;

#[derive(Error, Debug)]
pub enum CIWatchError {
    #[error("Invalid GitLab URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid response from GitLab: {0}")]
    InvalidResponse(String),

    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("Access denied -- check token scopes")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("Rate limited -- try again later")]
    RateLimited,

    #[error("HTTP error {0}")]
    Http(u16),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CIWatchError>;
