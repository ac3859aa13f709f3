//! Read-only snapshot façade over registry and index.
//!
//! Everything returned here is an owned copy taken under short critical
//! sections; a caller's later query is never affected by data seen in an
//! earlier one, and readers never wait behind a long-held writer lock.

use crate::game::GameSnapshot;
use crate::index::{OpeningIndex, OpeningIndexEntry, QueryFilter};
use crate::registry::GameRegistry;
use crate::stats::{ServiceStats, StatsSnapshot};
use serde::Serialize;
use std::sync::Arc;

/// Snapshot of the service's current and cumulative numbers, handed as-is
/// to an external persistence collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Games currently tracked (live or paused).
    pub tracked_games: usize,
    /// Tracked games with live status.
    pub live_games: usize,
    /// Live games currently counted in the index.
    pub indexed_games: usize,
    /// Openings with at least one live game.
    pub active_openings: usize,
    /// Process-lifetime counters.
    pub cumulative: StatsSnapshot,
}

/// Read-only query surface for presentation collaborators.
#[derive(Clone)]
pub struct QueryService {
    registry: Arc<GameRegistry>,
    index: Arc<OpeningIndex>,
    stats: Arc<ServiceStats>,
}

impl QueryService {
    pub fn new(
        registry: Arc<GameRegistry>,
        index: Arc<OpeningIndex>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self { registry, index, stats }
    }

    /// Filtered index view, ordered by count descending then name and code.
    pub fn query(&self, filter: &QueryFilter) -> Vec<OpeningIndexEntry> {
        self.index.query(filter, &self.registry)
    }

    /// Snapshots of the games currently counted under `code`.
    ///
    /// `None` for codes the reference tree does not know.
    pub fn games_for_opening(&self, code: &str) -> Option<Vec<GameSnapshot>> {
        let ids = self.index.games_for(code)?;
        // A game can retire between the id copy and the snapshot; dropped
        // ids are simply omitted.
        Some(ids.iter().filter_map(|id| self.registry.get(id)).collect())
    }

    /// Snapshot of a single game.
    pub fn game(&self, id: &str) -> Option<GameSnapshot> {
        self.registry.get(id)
    }

    /// Snapshots of every tracked game, ordered by id.
    pub fn games(&self) -> Vec<GameSnapshot> {
        self.registry.list_active()
    }

    /// Current and cumulative service numbers.
    pub fn stats(&self) -> StatsReport {
        StatsReport {
            tracked_games: self.registry.game_count(),
            live_games: self.registry.live_game_count(),
            indexed_games: self.index.indexed_games(),
            active_openings: self.index.active_entries(),
            cumulative: self.stats.snapshot(),
        }
    }
}
