//! Core trait for source adapters (plugin interface).
//!
//! To add a new game provider, implement the `SourceAdapter` trait.
//!
//! # Example
//!
//! ```ignore
//! pub struct ChessComAdapter;
//!
//! impl SourceAdapter for ChessComAdapter {
//!     const NAME: &'static str = "chesscom";
//!
//!     fn parse_and_transform(&self, payload: &str) -> Result<Vec<GameUpdate>> {
//!         // Parse provider payloads and transform to GameUpdate
//!     }
//! }
//! ```

use crate::schema::GameUpdate;
use anyhow::Result;

/// Core trait for game-source adapters.
///
/// Implement this trait to add support for a new provider. The ingestion
/// side is generic over this trait; the core only ever sees `GameUpdate`s.
pub trait SourceAdapter: Send + Sync + 'static {
    /// Provider name (e.g. "lichess").
    const NAME: &'static str;

    /// Parse a raw provider payload and transform it to game updates.
    ///
    /// Returns a vector because one payload may describe several games.
    /// Returns an empty vector for payloads that should be skipped.
    fn parse_and_transform(&self, payload: &str) -> Result<Vec<GameUpdate>>;

    /// Get metrics labels for this adapter.
    fn metrics_labels(&self) -> Vec<(&'static str, &'static str)> {
        vec![("provider", Self::NAME)]
    }
}
