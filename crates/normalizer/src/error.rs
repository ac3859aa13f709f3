//! Error types for the normalizer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unparseable move '{token}' at ply {ply}")]
    ParseMove { token: String, ply: usize },

    #[error("invalid opening definition at line {line}: {reason}")]
    Definition { line: usize, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
