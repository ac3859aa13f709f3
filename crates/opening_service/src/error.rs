//! Error types for the opening service.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Two definitions attach different labels to the same move sequence.
    /// Fatal at load time: serving with a broken reference tree would
    /// silently mis-classify every game.
    #[error("conflicting labels for '{sequence}': '{existing}' already loaded, '{incoming}' rejected")]
    DefinitionConflict {
        sequence: String,
        existing: String,
        incoming: String,
    },

    #[error("opening definition {code} has an empty move sequence")]
    EmptyDefinition { code: String },
}

pub type Result<T> = std::result::Result<T, Error>;
