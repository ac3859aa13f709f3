//! Per-game state: move history, status machine, classification holder.
//!
//! A `Game` is mutated only through the registry, which serializes access
//! per game id; everything here is plain single-threaded state transition
//! logic plus the snapshot types handed out to readers.

use crate::classifier::{Classification, OpeningMatch};
use normalizer::{GameStatus, PlayerInfo};
use serde::Serialize;

/// Which color a ply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    White,
    Black,
}

/// One recorded ply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveRec {
    /// 1-based ply number.
    pub ply: usize,
    pub side: Side,
    /// Canonical SAN token.
    pub san: String,
}

impl MoveRec {
    /// Number canonical tokens into a ply sequence.
    pub fn sequence(tokens: Vec<String>) -> Vec<MoveRec> {
        tokens
            .into_iter()
            .enumerate()
            .map(|(idx, san)| MoveRec {
                ply: idx + 1,
                side: if idx % 2 == 0 { Side::White } else { Side::Black },
                san,
            })
            .collect()
    }
}

/// How an incoming move list relates to the stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMerge {
    /// Identical to what is stored.
    Unchanged,
    /// Extends the stored prefix; the classifier cursor stays valid.
    Extended,
    /// Does not extend the stored prefix; requires a resync.
    Diverged,
}

/// Live state of a single observed game.
#[derive(Debug, Clone)]
pub struct Game {
    pub id: String,
    pub source: String,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
    pub time_control: Option<String>,
    pub status: GameStatus,
    /// Provider timestamp of the most recent accepted update (ms).
    pub last_update_ms: i64,
    moves: Vec<MoveRec>,
    pub classification: Classification,
    /// Set when the provider sent movetext we could not parse; such games
    /// stay out of the index until a clean full replacement arrives.
    pub unclassifiable: bool,
    pub update_count: u64,
}

impl Game {
    /// Create a game on first sighting of its id.
    pub fn new(id: String, source: String, status: GameStatus, timestamp_ms: i64) -> Self {
        Self {
            id,
            source,
            white: PlayerInfo::default(),
            black: PlayerInfo::default(),
            time_control: None,
            status,
            last_update_ms: timestamp_ms,
            moves: Vec::new(),
            classification: Classification::unclassified(),
            unclassifiable: false,
            update_count: 0,
        }
    }

    /// Recorded move history.
    pub fn moves(&self) -> &[MoveRec] {
        &self.moves
    }

    /// Refresh player/time-control metadata from an update.
    pub fn apply_meta(&mut self, white: &PlayerInfo, black: &PlayerInfo, time_control: Option<&str>) {
        if !white.name.is_empty() {
            self.white.name = white.name.clone();
        }
        if let Some(rating) = white.rating {
            self.white.rating = Some(rating);
        }
        if !black.name.is_empty() {
            self.black.name = black.name.clone();
        }
        if let Some(rating) = black.rating {
            self.black.rating = Some(rating);
        }
        if let Some(tc) = time_control {
            self.time_control = Some(tc.to_string());
        }
    }

    /// Apply a status transition if the state machine permits it.
    ///
    /// Returns whether the status actually changed. Invalid transitions
    /// (anything out of a terminal state is rejected upstream; here that
    /// means an unexpected regression) leave the stored status untouched.
    pub fn apply_status(&mut self, to: GameStatus) -> bool {
        if self.status == to {
            return false;
        }
        if self.status.can_transition(to) {
            self.status = to;
            true
        } else {
            false
        }
    }

    /// Replace the move history with `tokens`, reporting how the new list
    /// relates to the stored prefix.
    pub fn apply_tokens(&mut self, tokens: Vec<String>) -> MoveMerge {
        let merge = self.relation_to(&tokens);
        if merge != MoveMerge::Unchanged {
            self.moves = MoveRec::sequence(tokens);
        }
        merge
    }

    /// Splice a delta starting at `from_ply` onto the stored history and
    /// apply the result. A delta that cannot splice (gap past the stored
    /// end) becomes a full replacement consisting of the delta alone.
    pub fn apply_delta_tokens(&mut self, from_ply: usize, tokens: Vec<String>) -> MoveMerge {
        let candidate = if from_ply <= self.moves.len() {
            let mut merged: Vec<String> =
                self.moves[..from_ply].iter().map(|m| m.san.clone()).collect();
            merged.extend(tokens);
            merged
        } else {
            tokens
        };
        self.apply_tokens(candidate)
    }

    fn relation_to(&self, tokens: &[String]) -> MoveMerge {
        let stored = self.moves.len();
        if tokens.len() < stored {
            return MoveMerge::Diverged;
        }
        let extends = self
            .moves
            .iter()
            .zip(tokens.iter())
            .all(|(rec, token)| &rec.san == token);
        if !extends {
            MoveMerge::Diverged
        } else if tokens.len() == stored {
            MoveMerge::Unchanged
        } else {
            MoveMerge::Extended
        }
    }

    /// Point-in-time copy for readers.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            id: self.id.clone(),
            source: self.source.clone(),
            white: self.white.clone(),
            black: self.black.clone(),
            time_control: self.time_control.clone(),
            status: self.status,
            last_update_ms: self.last_update_ms,
            moves: self.moves.clone(),
            opening: self.classification.opening.clone(),
            matched_ply: self.classification.matched_ply,
            left_book: self.classification.left_book,
            unclassifiable: self.unclassifiable,
            update_count: self.update_count,
        }
    }
}

/// Immutable copy of a game's state handed to readers; later registry
/// writes never show through.
#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub id: String,
    pub source: String,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_control: Option<String>,
    pub status: GameStatus,
    pub last_update_ms: i64,
    pub moves: Vec<MoveRec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening: Option<OpeningMatch>,
    pub matched_ply: usize,
    pub left_book: bool,
    pub unclassifiable: bool,
    pub update_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn live_game() -> Game {
        Game::new("g1".to_string(), "tv".to_string(), GameStatus::Live, 1_000)
    }

    #[test]
    fn test_move_sequence_numbering() {
        let moves = MoveRec::sequence(tokens(&["e4", "c5", "Nf3"]));
        assert_eq!(moves[0].ply, 1);
        assert_eq!(moves[0].side, Side::White);
        assert_eq!(moves[1].ply, 2);
        assert_eq!(moves[1].side, Side::Black);
        assert_eq!(moves[2].side, Side::White);
    }

    #[test]
    fn test_apply_tokens_extension() {
        let mut game = live_game();
        assert_eq!(game.apply_tokens(tokens(&["e4", "c5"])), MoveMerge::Extended);
        assert_eq!(game.apply_tokens(tokens(&["e4", "c5"])), MoveMerge::Unchanged);
        assert_eq!(
            game.apply_tokens(tokens(&["e4", "c5", "Nf3"])),
            MoveMerge::Extended
        );
        assert_eq!(game.moves().len(), 3);
    }

    #[test]
    fn test_apply_tokens_divergence() {
        let mut game = live_game();
        game.apply_tokens(tokens(&["e4", "c5", "Nf3"]));

        // A corrected second move is a divergence, not an extension
        assert_eq!(
            game.apply_tokens(tokens(&["e4", "e5", "Nf3"])),
            MoveMerge::Diverged
        );
        assert_eq!(game.moves()[1].san, "e5");

        // So is a shrunken history
        assert_eq!(game.apply_tokens(tokens(&["e4"])), MoveMerge::Diverged);
        assert_eq!(game.moves().len(), 1);
    }

    #[test]
    fn test_apply_delta_splice() {
        let mut game = live_game();
        game.apply_tokens(tokens(&["e4", "c5"]));

        // Clean append
        assert_eq!(
            game.apply_delta_tokens(2, tokens(&["Nf3", "d6"])),
            MoveMerge::Extended
        );
        assert_eq!(game.moves().len(), 4);

        // Overlapping delta that re-sends the last ply identically
        assert_eq!(
            game.apply_delta_tokens(3, tokens(&["d6", "d4"])),
            MoveMerge::Extended
        );
        assert_eq!(game.moves().len(), 5);
    }

    #[test]
    fn test_apply_delta_divergence_and_gap() {
        let mut game = live_game();
        game.apply_tokens(tokens(&["e4", "c5", "Nf3"]));

        // Overlap disagrees with stored history
        assert_eq!(
            game.apply_delta_tokens(2, tokens(&["Nc3"])),
            MoveMerge::Diverged
        );

        // Gap past the stored end: the delta alone becomes the history
        let mut game = live_game();
        game.apply_tokens(tokens(&["e4"]));
        assert_eq!(
            game.apply_delta_tokens(5, tokens(&["d6"])),
            MoveMerge::Diverged
        );
        assert_eq!(game.moves().len(), 1);
        assert_eq!(game.moves()[0].san, "d6");
    }

    #[test]
    fn test_status_machine() {
        let mut game = live_game();
        assert!(game.apply_status(GameStatus::Paused));
        assert!(game.apply_status(GameStatus::Live));
        assert!(game.apply_status(GameStatus::Finished));
        // Terminal: nothing moves it again
        assert!(!game.apply_status(GameStatus::Live));
        assert_eq!(game.status, GameStatus::Finished);
    }

    #[test]
    fn test_meta_refresh_keeps_known_fields() {
        let mut game = live_game();
        game.apply_meta(
            &PlayerInfo { name: "alice".into(), rating: Some(2400) },
            &PlayerInfo { name: "bob".into(), rating: None },
            Some("blitz"),
        );
        // A later update without ratings must not erase them
        game.apply_meta(
            &PlayerInfo { name: "alice".into(), rating: None },
            &PlayerInfo { name: String::new(), rating: Some(2300) },
            None,
        );
        assert_eq!(game.white.rating, Some(2400));
        assert_eq!(game.black.name, "bob");
        assert_eq!(game.black.rating, Some(2300));
        assert_eq!(game.time_control.as_deref(), Some("blitz"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut game = live_game();
        game.apply_tokens(tokens(&["e4"]));
        let snapshot = game.snapshot();
        game.apply_tokens(tokens(&["e4", "c5"]));
        assert_eq!(snapshot.moves.len(), 1);
        assert_eq!(game.moves().len(), 2);
    }
}
