//! Lichess source adapter implementation.
//!
//! Handles parsing and transformation of Lichess game-export payloads to
//! normalized game updates. Exports always carry the full move list, so
//! every update this adapter emits is a `Full` replacement.

use crate::schema::{GameStatus, GameUpdate, PlayerInfo, UpdateKind};
use crate::traits::SourceAdapter;
use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

/// Lichess game-export adapter.
///
/// Constructed with the source tag that produced the payload ("tv",
/// "broadcast"), which is stamped onto every emitted update.
#[derive(Debug, Clone)]
pub struct LichessExportAdapter {
    source: String,
}

impl LichessExportAdapter {
    /// Create a new adapter stamping `source` onto emitted updates.
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }
}

impl SourceAdapter for LichessExportAdapter {
    const NAME: &'static str = "lichess";

    fn parse_and_transform(&self, payload: &str) -> Result<Vec<GameUpdate>> {
        let raw: RawGameExport = serde_json::from_str(payload)?;

        if raw.id.is_empty() {
            return Ok(vec![]);
        }

        let timestamp_ms = raw
            .last_move_at
            .or(raw.created_at)
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        Ok(vec![GameUpdate {
            id: raw.id,
            source: self.source.clone(),
            white: raw.players.white.into(),
            black: raw.players.black.into(),
            time_control: raw.speed,
            status: map_status(&raw.status),
            kind: UpdateKind::Full,
            moves: Some(raw.moves.unwrap_or_default()),
            delta: None,
            timestamp_ms,
        }])
    }
}

/// Map a Lichess status string onto the game state machine.
///
/// Unknown strings are treated as live so a provider-side addition never
/// drops games from the index silently.
pub fn map_status(status: &str) -> GameStatus {
    match status {
        "created" | "started" => GameStatus::Live,
        "paused" => GameStatus::Paused,
        "aborted" | "noStart" => GameStatus::Aborted,
        "mate" | "resign" | "draw" | "stalemate" | "timeout" | "outoftime" | "cheat"
        | "unknownFinish" | "variantEnd" => GameStatus::Finished,
        other => {
            warn!("Unknown lichess game status '{}', treating as live", other);
            GameStatus::Live
        }
    }
}

// ============================================================================
// Raw Payload Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawGameExport {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    speed: Option<String>,
    #[serde(default, rename = "createdAt")]
    created_at: Option<i64>,
    #[serde(default, rename = "lastMoveAt")]
    last_move_at: Option<i64>,
    #[serde(default)]
    players: RawPlayers,
    #[serde(default)]
    moves: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlayers {
    #[serde(default)]
    white: RawPlayer,
    #[serde(default)]
    black: RawPlayer,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlayer {
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    rating: Option<u32>,
    #[serde(default, rename = "aiLevel")]
    ai_level: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    name: String,
}

impl From<RawPlayer> for PlayerInfo {
    fn from(raw: RawPlayer) -> Self {
        let name = match (&raw.user, raw.ai_level) {
            (Some(user), _) if !user.name.is_empty() => user.name.clone(),
            (_, Some(level)) => format!("Stockfish level {level}"),
            _ => "Unknown".to_string(),
        };
        PlayerInfo { name, rating: raw.rating }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "id": "q7ZvsdUF",
        "rated": true,
        "variant": "standard",
        "speed": "blitz",
        "createdAt": 1514505150384,
        "lastMoveAt": 1514505592843,
        "status": "started",
        "players": {
            "white": {"user": {"name": "Lance5500"}, "rating": 2389},
            "black": {"user": {"name": "TryingHard87"}, "rating": 2498}
        },
        "moves": "e4 c5 Nf3 d6"
    }"#;

    #[test]
    fn test_parse_export() {
        let adapter = LichessExportAdapter::new("tv");
        let updates = adapter.parse_and_transform(EXPORT).unwrap();
        assert_eq!(updates.len(), 1);

        let update = &updates[0];
        assert_eq!(update.id, "q7ZvsdUF");
        assert_eq!(update.source, "tv");
        assert_eq!(update.white.name, "Lance5500");
        assert_eq!(update.white.rating, Some(2389));
        assert_eq!(update.time_control.as_deref(), Some("blitz"));
        assert_eq!(update.status, GameStatus::Live);
        assert_eq!(update.kind, UpdateKind::Full);
        assert_eq!(update.moves.as_deref(), Some("e4 c5 Nf3 d6"));
        assert_eq!(update.timestamp_ms, 1514505592843);
    }

    #[test]
    fn test_finished_statuses() {
        assert_eq!(map_status("mate"), GameStatus::Finished);
        assert_eq!(map_status("resign"), GameStatus::Finished);
        assert_eq!(map_status("draw"), GameStatus::Finished);
        assert_eq!(map_status("aborted"), GameStatus::Aborted);
        assert_eq!(map_status("started"), GameStatus::Live);
    }

    #[test]
    fn test_unknown_status_is_live() {
        assert_eq!(map_status("somethingNew"), GameStatus::Live);
    }

    #[test]
    fn test_anonymous_and_ai_players() {
        let payload = r#"{
            "id": "aaaa0001",
            "status": "started",
            "players": {
                "white": {"aiLevel": 8},
                "black": {}
            }
        }"#;
        let adapter = LichessExportAdapter::new("tv");
        let updates = adapter.parse_and_transform(payload).unwrap();
        assert_eq!(updates[0].white.name, "Stockfish level 8");
        assert_eq!(updates[0].black.name, "Unknown");
        assert_eq!(updates[0].moves.as_deref(), Some(""));
    }

    #[test]
    fn test_missing_id_skipped() {
        let adapter = LichessExportAdapter::new("tv");
        let updates = adapter.parse_and_transform(r#"{"status": "started"}"#).unwrap();
        assert!(updates.is_empty());
    }
}
