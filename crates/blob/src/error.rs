use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlobError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    /// Caller sent something that cannot be stored or addressed.
    #[error("invalid blob input: {0}")]
    InvalidInput(String),

    /// Storage is unconfigured, unreachable, timed out or refused the request.
    /// Safe to retry after backoff.
    #[error("blob storage unavailable: {0}")]
    Unavailable(String),

    #[error("blob not found: {0}")]
    NotFound(String),

    /// Connection settings could not be understood.
    #[error("invalid blob storage configuration: {0}")]
    Config(String),
}

impl BlobError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<reqwest::Error> for BlobError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Unavailable(format!("request timed out: {}", err))
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
