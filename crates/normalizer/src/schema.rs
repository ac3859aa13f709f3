//! Normalized game-update schema definitions.

use serde::{Deserialize, Serialize};

/// A player in a live game.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerInfo {
    /// Display name reported by the provider.
    pub name: String,
    /// Rating at the time of the update, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u32>,
}

/// Lifecycle status of a game.
///
/// `Finished` and `Aborted` are terminal: once a game reaches either,
/// no further updates are accepted for its id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Live,
    Paused,
    Finished,
    Aborted,
}

impl GameStatus {
    /// Whether this status accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Finished | GameStatus::Aborted)
    }

    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// Allowed: live -> {paused, finished, aborted}, paused -> {live,
    /// finished, aborted}. Self-transitions are treated as permitted no-ops.
    pub fn can_transition(self, to: GameStatus) -> bool {
        if self == to {
            return true;
        }
        match self {
            GameStatus::Live => true,
            GameStatus::Paused => true,
            GameStatus::Finished | GameStatus::Aborted => false,
        }
    }
}

/// Shape of the move payload carried by an update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// `moves` replaces the full move list.
    Full,
    /// `delta` appends onto a previously stored prefix.
    Delta,
}

/// Incremental move payload: `moves` are the plies from `from_ply` onward.
///
/// `from_ply` is the number of plies the sender believes the receiver
/// already holds; a delta that does not splice onto the stored prefix is
/// treated downstream as a full replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveDelta {
    pub from_ply: usize,
    pub moves: String,
}

/// Normalized game update message.
///
/// This is the single shape the core consumes, regardless of which
/// provider or source strategy produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameUpdate {
    /// Provider game identifier.
    pub id: String,
    /// Source tag (e.g. "tv", "broadcast").
    pub source: String,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
    /// Time-control tag (e.g. "blitz", "rapid"), when the provider reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_control: Option<String>,
    pub status: GameStatus,
    /// Whether `moves` or `delta` carries the payload.
    pub kind: UpdateKind,
    /// Full movetext in SAN (only populated for `Full`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moves: Option<String>,
    /// Appended movetext (only populated for `Delta`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<MoveDelta>,
    /// Provider-side timestamp of the update (milliseconds).
    pub timestamp_ms: i64,
}

/// One entry of the opening reference book, consumed at startup.
///
/// `tokens` are canonical SAN, already normalized by the book loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpeningDefinition {
    /// ECO code (e.g. "B20").
    pub code: String,
    /// Opening name (e.g. "Sicilian Defense").
    pub name: String,
    /// Alternative names for the same line.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Canonical move tokens from the starting position.
    pub tokens: Vec<String>,
}
