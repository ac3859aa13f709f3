//! Error types for the Lichess client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}

impl Error {
    /// Whether this error is a plain not-found response.
    ///
    /// Broadcast rounds disappear between the listing call and the round
    /// fetch; callers skip those instead of failing the poll.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::UnexpectedStatus { status, .. } => *status == 404,
            Error::Http(e) => e.status().map(|s| s.as_u16() == 404).unwrap_or(false),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
