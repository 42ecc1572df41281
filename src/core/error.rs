use thiserror::Error;

/// A body that could not be turned into a status mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        ParseError(msg.into())
    }
}

/// Everything that can go wrong between issuing a request and holding a
/// parsed mapping. Normalized into a string at the collector boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Unreachable host, non-2xx status or timeout.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unreadable response: {0}")]
    Decode(String),

    #[error("couldn't parse response: {0}")]
    Parse(#[from] ParseError),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Transport("request timed out".to_string())
        } else if err.is_connect() {
            FetchError::Transport(format!("connection failed: {}", err))
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
