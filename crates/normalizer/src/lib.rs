//! Normalizer for transforming raw game data to unified schemas.
//!
//! This crate owns the boundary schema the classification core consumes
//! (`GameUpdate`, `OpeningDefinition`), SAN move normalization, and a
//! plugin-based adapter architecture for game providers. To add support
//! for a new provider, implement the `SourceAdapter` trait.
//!
//! # Architecture
//!
//! ```text
//! Raw payloads (REST) --> SourceAdapter --> GameUpdate --> classification core
//!                         (parse & transform)
//! ```

pub mod definitions;
pub mod error;
pub mod lichess;
pub mod san;
pub mod schema;
pub mod traits;

// Re-export core types
pub use error::Error;
pub use schema::{
    GameStatus, GameUpdate, MoveDelta, OpeningDefinition, PlayerInfo, UpdateKind,
};
pub use traits::SourceAdapter;

// Re-export provider adapters
pub use lichess::LichessExportAdapter;
