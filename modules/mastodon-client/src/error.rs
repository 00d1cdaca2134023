use thiserror::Error;

pub type Result<T> = std::result::Result<T, MastodonError>;

#[derive(Debug, Error)]
pub enum MastodonError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<String> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for MastodonError {
    fn from(err: reqwest::Error) -> Self {
        // A body that fails to decode is a malformed response, not a transport failure.
        if err.is_decode() {
            MastodonError::Parse(err.to_string())
        } else {
            MastodonError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MastodonError {
    fn from(err: serde_json::Error) -> Self {
        MastodonError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for MastodonError {
    fn from(err: url::ParseError) -> Self {
        MastodonError::Parse(err.to_string())
    }
}
