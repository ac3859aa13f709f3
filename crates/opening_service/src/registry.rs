//! Live game registry keyed by provider game id.
//!
//! The registry owns every mutable piece of per-game state. Mutation for a
//! single id is serialized through the DashMap entry guard; updates for
//! different ids proceed on independent shards without contention. The
//! index mutation produced by a classification change happens while the
//! game's entry guard is still held, so readers never observe a classified
//! game counted in zero or two entries.

use crate::classifier::{Classifier, OpeningMatch};
use crate::game::{Game, GameSnapshot, MoveMerge};
use crate::index::OpeningIndex;
use crate::stats::ServiceStats;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use metrics::counter;
use normalizer::san::normalize_movetext;
use normalizer::{GameStatus, GameUpdate, UpdateKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What `upsert` did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting of this id; the game is now tracked.
    Created,
    /// An existing game was updated.
    Updated,
    /// The update carried a terminal status; the game has been removed
    /// from registry and index.
    Retired,
    /// Update for an id that already ended; dropped.
    Ignored,
}

/// Live store of per-game state with staleness eviction.
pub struct GameRegistry {
    games: DashMap<String, Game>,
    /// Ids that reached a terminal status. Terminal is forever: a provider
    /// that keeps exporting a finished game must not resurrect it.
    retired: DashSet<String>,
    classifier: Classifier,
    index: Arc<OpeningIndex>,
    stats: Arc<ServiceStats>,
    staleness_window: Duration,
}

impl GameRegistry {
    pub fn new(
        classifier: Classifier,
        index: Arc<OpeningIndex>,
        stats: Arc<ServiceStats>,
        staleness_window: Duration,
    ) -> Self {
        Self {
            games: DashMap::new(),
            retired: DashSet::new(),
            classifier,
            index,
            stats,
            staleness_window,
        }
    }

    /// Apply one normalized update.
    ///
    /// Creates the game on first sighting, applies move/status/rating
    /// deltas, reclassifies, and forwards the classification delta to the
    /// index while the entry guard is still held.
    pub fn upsert(&self, update: GameUpdate) -> UpsertOutcome {
        self.stats.record_update_received();

        match self.games.entry(update.id.clone()) {
            Entry::Occupied(mut occupied) => {
                let old = Self::indexed_match(occupied.get()).map(|m| m.code);
                self.apply_update(occupied.get_mut(), &update);

                let game = occupied.get();
                let new = Self::indexed_match(game);
                self.index
                    .on_classify(&update.id, old.as_deref(), new.as_ref(), update.timestamp_ms);
                self.stats.record_update_applied();

                if game.status.is_terminal() {
                    debug!("Game {} ended ({:?}), retiring", update.id, game.status);
                    self.stats.record_game_finished();
                    counter!("opening_service_games_finished_total").increment(1);
                    self.retired.insert(update.id.clone());
                    occupied.remove();
                    return UpsertOutcome::Retired;
                }
                UpsertOutcome::Updated
            }
            Entry::Vacant(vacant) => {
                if self.retired.contains(&update.id) {
                    debug!("Dropping update for retired game {}", update.id);
                    counter!("opening_service_updates_ignored_total").increment(1);
                    return UpsertOutcome::Ignored;
                }
                if update.status.is_terminal() {
                    // First seen already over; remember the id, never track it.
                    self.retired.insert(update.id.clone());
                    counter!("opening_service_updates_ignored_total").increment(1);
                    return UpsertOutcome::Ignored;
                }

                let mut game = Game::new(
                    update.id.clone(),
                    update.source.clone(),
                    update.status,
                    update.timestamp_ms,
                );
                self.apply_update(&mut game, &update);

                let new = Self::indexed_match(&game);
                self.index
                    .on_classify(&update.id, None, new.as_ref(), update.timestamp_ms);
                vacant.insert(game);

                self.stats.record_game_seen();
                self.stats.record_update_applied();
                counter!("opening_service_games_created_total").increment(1);
                UpsertOutcome::Created
            }
        }
    }

    /// Apply metadata, status, moves, and reclassification to `game`.
    fn apply_update(&self, game: &mut Game, update: &GameUpdate) {
        game.apply_meta(&update.white, &update.black, update.time_control.as_deref());

        if game.status != update.status && !game.apply_status(update.status) {
            warn!(
                "Ignoring invalid status transition {:?} -> {:?} for game {}",
                game.status, update.status, game.id
            );
        }

        let merge = self.apply_moves(game, update);

        match merge {
            Some(MoveMerge::Extended) => {
                let next = self
                    .classifier
                    .classify(game.moves(), Some(&game.classification));
                game.classification = next;
            }
            Some(MoveMerge::Diverged) => {
                debug!(
                    "Move history diverged for game {}, rewalking from the root",
                    game.id
                );
                game.classification = self.classifier.classify(game.moves(), None);
                self.stats.record_resync();
                counter!("opening_service_resyncs_total").increment(1);
            }
            Some(MoveMerge::Unchanged) | None => {}
        }

        game.last_update_ms = update.timestamp_ms;
        game.update_count += 1;
    }

    /// Normalize and merge the update's move payload into the game.
    ///
    /// Returns `None` when there was nothing to merge: an empty delta, or
    /// movetext that failed to parse (which marks the game unclassifiable
    /// until a clean full replacement arrives).
    fn apply_moves(&self, game: &mut Game, update: &GameUpdate) -> Option<MoveMerge> {
        match update.kind {
            UpdateKind::Full => {
                let movetext = update.moves.as_deref().unwrap_or("");
                match normalize_movetext(movetext) {
                    Ok(tokens) => {
                        // A clean full list recovers a previously
                        // unclassifiable game.
                        game.unclassifiable = false;
                        Some(game.apply_tokens(tokens))
                    }
                    Err(e) => {
                        self.mark_unparseable(game, &e);
                        None
                    }
                }
            }
            UpdateKind::Delta => {
                let delta = update.delta.as_ref()?;
                match normalize_movetext(&delta.moves) {
                    Ok(tokens) => {
                        if game.unclassifiable {
                            // The stored prefix is not trusted until a full
                            // replacement arrives.
                            debug!("Skipping delta for unclassifiable game {}", game.id);
                            None
                        } else {
                            Some(game.apply_delta_tokens(delta.from_ply, tokens))
                        }
                    }
                    Err(e) => {
                        self.mark_unparseable(game, &e);
                        None
                    }
                }
            }
        }
    }

    fn mark_unparseable(&self, game: &mut Game, error: &normalizer::Error) {
        warn!("Unparseable movetext for game {}: {}", game.id, error);
        game.unclassifiable = true;
        self.stats.record_parse_failure();
        counter!("opening_service_parse_failures_total").increment(1);
    }

    /// The opening a game is counted under, if any. Only live, classifiable
    /// games appear in the index.
    fn indexed_match(game: &Game) -> Option<OpeningMatch> {
        if game.status == GameStatus::Live && !game.unclassifiable {
            game.classification.opening.clone()
        } else {
            None
        }
    }

    /// Point-in-time copy of one game.
    pub fn get(&self, id: &str) -> Option<GameSnapshot> {
        self.games.get(id).map(|game| game.snapshot())
    }

    /// Point-in-time copies of every tracked game, ordered by id.
    pub fn list_active(&self) -> Vec<GameSnapshot> {
        let mut games: Vec<GameSnapshot> =
            self.games.iter().map(|game| game.snapshot()).collect();
        games.sort_by(|a, b| a.id.cmp(&b.id));
        games
    }

    /// Whether a game passes the game-level query filter fields.
    ///
    /// `min_rating` compares against the higher-rated player; unrated games
    /// never pass a rating filter.
    pub fn game_matches(
        &self,
        id: &str,
        min_rating: Option<u32>,
        time_control: Option<&str>,
    ) -> bool {
        match self.games.get(id) {
            Some(game) => {
                if let Some(min) = min_rating {
                    let best = game.white.rating.max(game.black.rating);
                    if !best.is_some_and(|rating| rating >= min) {
                        return false;
                    }
                }
                if let Some(tc) = time_control {
                    if game.time_control.as_deref() != Some(tc) {
                        return false;
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Remove live games whose last update is older than the staleness
    /// window, as if they had silently ended. Returns the eviction count.
    pub fn sweep_stale(&self, now_ms: i64) -> usize {
        let cutoff = now_ms - self.staleness_window.as_millis() as i64;
        let mut evicted = 0;

        self.games.retain(|id, game| {
            if game.status != GameStatus::Live || game.last_update_ms >= cutoff {
                return true;
            }
            info!(
                "Evicting stale game {} (idle {}s)",
                id,
                (now_ms - game.last_update_ms) / 1000
            );
            let old = Self::indexed_match(game).map(|m| m.code);
            self.index.on_classify(id, old.as_deref(), None, now_ms);
            self.stats.record_eviction();
            counter!("opening_service_evictions_total").increment(1);
            evicted += 1;
            false
        });

        evicted
    }

    /// Number of tracked games (terminal games are removed on arrival).
    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Number of tracked games with live status.
    pub fn live_game_count(&self) -> usize {
        self.games
            .iter()
            .filter(|game| game.status == GameStatus::Live)
            .count()
    }

    /// Number of live games excluded from the index (no opening matched,
    /// or movetext unparseable).
    pub fn live_unclassified_count(&self) -> usize {
        self.games
            .iter()
            .filter(|game| game.status == GameStatus::Live)
            .filter(|game| game.unclassifiable || game.classification.opening.is_none())
            .count()
    }

    /// Configured staleness window.
    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::OpeningTree;
    use normalizer::{MoveDelta, OpeningDefinition, PlayerInfo};

    fn def(code: &str, name: &str, tokens: &[&str]) -> OpeningDefinition {
        OpeningDefinition {
            code: code.to_string(),
            name: name.to_string(),
            aliases: vec![],
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn registry() -> (Arc<GameRegistry>, Arc<OpeningIndex>, Arc<ServiceStats>) {
        let tree = Arc::new(
            OpeningTree::build(vec![
                def("B00", "King's Pawn Game", &["e4"]),
                def("C20", "King's Pawn Game: Open Game", &["e4", "e5"]),
                def("B20", "Sicilian Defense", &["e4", "c5"]),
            ])
            .unwrap(),
        );
        let index = Arc::new(OpeningIndex::from_tree(&tree));
        let stats = Arc::new(ServiceStats::new());
        let registry = Arc::new(GameRegistry::new(
            Classifier::new(tree),
            index.clone(),
            stats.clone(),
            Duration::from_secs(120),
        ));
        (registry, index, stats)
    }

    fn update(id: &str, moves: &str, status: GameStatus, timestamp_ms: i64) -> GameUpdate {
        GameUpdate {
            id: id.to_string(),
            source: "tv".to_string(),
            white: PlayerInfo { name: "alice".to_string(), rating: Some(2400) },
            black: PlayerInfo { name: "bob".to_string(), rating: Some(2200) },
            time_control: Some("blitz".to_string()),
            status,
            kind: UpdateKind::Full,
            moves: Some(moves.to_string()),
            delta: None,
            timestamp_ms,
        }
    }

    fn delta_update(id: &str, from_ply: usize, moves: &str, timestamp_ms: i64) -> GameUpdate {
        GameUpdate {
            kind: UpdateKind::Delta,
            moves: None,
            delta: Some(MoveDelta { from_ply, moves: moves.to_string() }),
            ..update(id, "", GameStatus::Live, timestamp_ms)
        }
    }

    /// Live games in the registry split exactly between the index and the
    /// unclassified remainder.
    fn assert_index_invariant(registry: &GameRegistry, index: &OpeningIndex) {
        assert_eq!(
            index.indexed_games() + registry.live_unclassified_count(),
            registry.live_game_count()
        );
    }

    #[test]
    fn test_create_and_classify() {
        let (registry, index, _) = registry();

        let outcome = registry.upsert(update("g1", "e4 c5", GameStatus::Live, 1_000));
        assert_eq!(outcome, UpsertOutcome::Created);

        let snapshot = registry.get("g1").unwrap();
        assert_eq!(snapshot.opening.as_ref().unwrap().code, "B20");
        assert_eq!(snapshot.matched_ply, 2);
        assert!(!snapshot.left_book);
        assert_eq!(index.games_for("B20").unwrap(), vec!["g1"]);
        assert_index_invariant(&registry, &index);
    }

    #[test]
    fn test_reclassification_moves_index_entry() {
        let (registry, index, _) = registry();

        registry.upsert(update("g1", "e4", GameStatus::Live, 1_000));
        assert_eq!(index.games_for("B00").unwrap(), vec!["g1"]);

        registry.upsert(update("g1", "e4 e5", GameStatus::Live, 2_000));
        assert!(index.games_for("B00").unwrap().is_empty());
        assert_eq!(index.games_for("C20").unwrap(), vec!["g1"]);
        assert_index_invariant(&registry, &index);
    }

    #[test]
    fn test_two_games_same_opening_then_one_finishes() {
        let (registry, index, stats) = registry();

        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 1_000));
        registry.upsert(update("g2", "e4 c5", GameStatus::Live, 1_000));
        assert_eq!(index.games_for("B20").unwrap().len(), 2);

        let outcome = registry.upsert(update("g1", "e4 c5", GameStatus::Finished, 2_000));
        assert_eq!(outcome, UpsertOutcome::Retired);
        assert_eq!(index.games_for("B20").unwrap(), vec!["g2"]);
        assert!(registry.get("g1").is_none());
        assert_eq!(stats.snapshot().games_finished, 1);

        // Terminal is forever: later exports of the same id are dropped.
        let outcome = registry.upsert(update("g1", "e4 c5 Nf3", GameStatus::Live, 3_000));
        assert_eq!(outcome, UpsertOutcome::Ignored);
        assert!(registry.get("g1").is_none());
        assert_index_invariant(&registry, &index);
    }

    #[test]
    fn test_pause_removes_from_index_and_resume_restores() {
        let (registry, index, _) = registry();

        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 1_000));
        registry.upsert(update("g1", "e4 c5", GameStatus::Paused, 2_000));
        assert!(index.games_for("B20").unwrap().is_empty());
        assert!(registry.get("g1").is_some());

        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 3_000));
        assert_eq!(index.games_for("B20").unwrap(), vec!["g1"]);
        assert_index_invariant(&registry, &index);
    }

    #[test]
    fn test_divergence_triggers_resync() {
        let (registry, index, stats) = registry();

        registry.upsert(update("g1", "e4 e5", GameStatus::Live, 1_000));
        assert_eq!(index.games_for("C20").unwrap(), vec!["g1"]);

        // Corrected history: same length, different second move
        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 2_000));
        let snapshot = registry.get("g1").unwrap();
        assert_eq!(snapshot.opening.as_ref().unwrap().code, "B20");
        assert_eq!(index.games_for("B20").unwrap(), vec!["g1"]);
        assert!(index.games_for("C20").unwrap().is_empty());
        assert_eq!(stats.snapshot().resyncs, 1);
    }

    #[test]
    fn test_delta_extends_classification() {
        let (registry, index, stats) = registry();

        registry.upsert(update("g1", "e4", GameStatus::Live, 1_000));
        registry.upsert(delta_update("g1", 1, "c5 Nf3", 2_000));

        let snapshot = registry.get("g1").unwrap();
        assert_eq!(snapshot.moves.len(), 3);
        assert_eq!(snapshot.opening.as_ref().unwrap().code, "B20");
        assert!(snapshot.left_book);
        assert_eq!(index.games_for("B20").unwrap(), vec!["g1"]);
        assert_eq!(stats.snapshot().resyncs, 0);
    }

    #[test]
    fn test_delta_gap_is_treated_as_replacement() {
        let (registry, _, stats) = registry();

        registry.upsert(update("g1", "e4", GameStatus::Live, 1_000));
        // from_ply far past the stored end: cannot splice
        registry.upsert(delta_update("g1", 7, "e4 c5", 2_000));

        let snapshot = registry.get("g1").unwrap();
        assert_eq!(snapshot.moves.len(), 2);
        assert_eq!(snapshot.opening.as_ref().unwrap().code, "B20");
        assert_eq!(stats.snapshot().resyncs, 1);
    }

    #[test]
    fn test_unparseable_movetext_excludes_from_index() {
        let (registry, index, stats) = registry();

        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 1_000));
        registry.upsert(update("g1", "e4 c5 qqq9", GameStatus::Live, 2_000));

        let snapshot = registry.get("g1").unwrap();
        assert!(snapshot.unclassifiable);
        assert!(index.games_for("B20").unwrap().is_empty());
        assert_eq!(stats.snapshot().parse_failures, 1);
        assert_index_invariant(&registry, &index);

        // A clean full replacement recovers the game
        registry.upsert(update("g1", "e4 c5 Nf3", GameStatus::Live, 3_000));
        let snapshot = registry.get("g1").unwrap();
        assert!(!snapshot.unclassifiable);
        assert_eq!(index.games_for("B20").unwrap(), vec!["g1"]);
        assert_index_invariant(&registry, &index);
    }

    #[test]
    fn test_first_sighting_already_finished_is_ignored() {
        let (registry, index, _) = registry();

        let outcome = registry.upsert(update("g1", "e4 c5", GameStatus::Finished, 1_000));
        assert_eq!(outcome, UpsertOutcome::Ignored);
        assert_eq!(registry.game_count(), 0);
        assert_eq!(index.indexed_games(), 0);
    }

    #[test]
    fn test_unclassified_game_is_tracked_but_unindexed() {
        let (registry, index, _) = registry();

        registry.upsert(update("g1", "d4 d5", GameStatus::Live, 1_000));
        let snapshot = registry.get("g1").unwrap();
        assert!(snapshot.opening.is_none());
        assert_eq!(index.indexed_games(), 0);
        assert_eq!(registry.live_unclassified_count(), 1);
        assert_index_invariant(&registry, &index);
    }

    #[test]
    fn test_sweep_evicts_only_stale_live_games() {
        let (registry, index, stats) = registry();

        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 1_000));
        registry.upsert(update("g2", "e4 c5", GameStatus::Live, 100_000));
        registry.upsert(update("g3", "e4 e5", GameStatus::Paused, 1_000));

        // g1 is 159s idle at sweep time, g2 only 60s; the paused g3 is
        // never staleness-evicted.
        let evicted = registry.sweep_stale(160_000);
        assert_eq!(evicted, 1);
        assert!(registry.get("g1").is_none());
        assert!(registry.get("g2").is_some());
        assert!(registry.get("g3").is_some());
        assert_eq!(index.games_for("B20").unwrap(), vec!["g2"]);
        assert_eq!(stats.snapshot().evictions, 1);
        assert_index_invariant(&registry, &index);
    }

    #[test]
    fn test_evicted_game_can_reappear() {
        let (registry, index, _) = registry();

        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 1_000));
        registry.sweep_stale(500_000);
        assert!(registry.get("g1").is_none());

        // Eviction is not terminal: a fresh update re-creates the game.
        let outcome = registry.upsert(update("g1", "e4 c5 Nf3", GameStatus::Live, 600_000));
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(index.games_for("B20").unwrap(), vec!["g1"]);
    }

    #[test]
    fn test_game_matches_filters() {
        let (registry, _, _) = registry();
        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 1_000));

        assert!(registry.game_matches("g1", None, None));
        // min_rating compares against the higher-rated player (2400)
        assert!(registry.game_matches("g1", Some(2300), None));
        assert!(!registry.game_matches("g1", Some(2500), None));
        assert!(registry.game_matches("g1", None, Some("blitz")));
        assert!(!registry.game_matches("g1", None, Some("rapid")));
        assert!(!registry.game_matches("missing", None, None));
    }

    #[test]
    fn test_concurrent_upserts_distinct_ids() {
        use std::thread;

        let (registry, index, _) = registry();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let id = format!("w{worker}-g{i}");
                        registry.upsert(update(&id, "e4 c5", GameStatus::Live, 1_000));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.game_count(), 200);
        assert_eq!(index.games_for("B20").unwrap().len(), 200);
        assert_index_invariant(&registry, &index);
    }

    #[test]
    fn test_concurrent_updates_same_id_stay_consistent() {
        use std::thread;

        let (registry, index, _) = registry();
        registry.upsert(update("g1", "e4", GameStatus::Live, 1_000));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        registry.upsert(update("g1", "e4 c5", GameStatus::Live, 2_000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // However the interleaving played out, g1 is counted exactly once.
        assert_eq!(index.games_for("B20").unwrap(), vec!["g1"]);
        assert_eq!(index.indexed_games(), 1);
        assert_index_invariant(&registry, &index);
    }
}
