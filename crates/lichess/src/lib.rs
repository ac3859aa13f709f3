//! Lichess API client and payload types.
//!
//! Covers the endpoints the live-openings poller consumes: TV channels,
//! broadcast listings and rounds, and per-game exports. Payload shapes are
//! kept deliberately tolerant; see `types` for the extraction helpers.

pub mod client;
pub mod error;
pub mod types;

pub use client::{LichessClient, DEFAULT_BASE_URL};
pub use error::Error;
pub use types::{
    broadcast_round_ids, game_id_from_url, round_game_ids, Broadcast, TvChannel, TvChannels,
};
