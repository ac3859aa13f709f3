//! Live aggregate index: opening -> set of active game ids.
//!
//! Seeded from the reference tree's label set at startup (every entry
//! present, all counts zero) and owned explicitly by the service — no
//! ambient globals. All mutation for one classification change happens
//! under a single short write lock, so readers never observe a game id in
//! zero or two entries. Reads copy out under equally short read sections.

use crate::classifier::OpeningMatch;
use crate::registry::GameRegistry;
use crate::tree::OpeningTree;
use metrics::counter;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::warn;

/// Filter for index queries. All present fields must match (logical AND).
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// ECO code prefix, e.g. "B2".
    pub eco_prefix: Option<String>,
    /// Case-insensitive substring of the opening name or an alias.
    pub name_substring: Option<String>,
    /// Minimum rating of a game's higher-rated player.
    pub min_rating: Option<u32>,
    /// Exact time-control tag, e.g. "blitz".
    pub time_control: Option<String>,
}

impl QueryFilter {
    fn wants_game_fields(&self) -> bool {
        self.min_rating.is_some() || self.time_control.is_some()
    }
}

/// Point-in-time view of one index entry.
#[derive(Debug, Clone, Serialize)]
pub struct OpeningIndexEntry {
    pub code: String,
    pub name: String,
    pub aliases: Vec<String>,
    /// Always equals `game_ids.len()`.
    pub count: usize,
    pub game_ids: Vec<String>,
    pub last_changed_ms: i64,
}

#[derive(Debug)]
struct EntryState {
    name: String,
    aliases: Vec<String>,
    games: HashSet<String>,
    last_changed_ms: i64,
}

/// The live opening index.
#[derive(Debug)]
pub struct OpeningIndex {
    entries: RwLock<HashMap<String, EntryState>>,
}

impl OpeningIndex {
    /// Build the index from the tree's label set, all counts zero.
    pub fn from_tree(tree: &OpeningTree) -> Self {
        let entries = tree
            .labels()
            .map(|label| {
                (
                    label.code.clone(),
                    EntryState {
                        name: label.name.clone(),
                        aliases: label.aliases.clone(),
                        games: HashSet::new(),
                        last_changed_ms: 0,
                    },
                )
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Apply a classification change for `game_id` atomically.
    ///
    /// Removes the id from the old entry's set and inserts it into the new
    /// one under a single write lock. `old`/`new` of `None` mean the game
    /// was/is not counted (unclassified, unclassifiable, or not live).
    pub fn on_classify(
        &self,
        game_id: &str,
        old: Option<&str>,
        new: Option<&OpeningMatch>,
        now_ms: i64,
    ) {
        if old == new.map(|m| m.code.as_str()) {
            return;
        }

        let mut entries = self.entries.write().expect("index lock poisoned");

        if let Some(old_code) = old {
            let removed = entries
                .get_mut(old_code)
                .map(|entry| {
                    let removed = entry.games.remove(game_id);
                    if removed {
                        entry.last_changed_ms = now_ms;
                    }
                    removed
                })
                .unwrap_or(false);

            if !removed {
                // Membership disagrees with the registry's view of this
                // game. Fail fast under test; repair in production by
                // clearing every stale membership before re-inserting.
                debug_assert!(removed, "game {game_id} missing from entry {old_code}");
                warn!(
                    "Index inconsistency: game {} not in entry {}, repairing",
                    game_id, old_code
                );
                counter!("opening_service_index_repairs_total").increment(1);
                for entry in entries.values_mut() {
                    if entry.games.remove(game_id) {
                        entry.last_changed_ms = now_ms;
                    }
                }
            }
        }

        if let Some(matched) = new {
            let entry = entries.entry(matched.code.clone()).or_insert_with(|| {
                // Labels come from the tree, so seeded entries should cover
                // every code reaching this point.
                warn!("Index entry {} missing from seed, creating", matched.code);
                EntryState {
                    name: matched.name.clone(),
                    aliases: Vec::new(),
                    games: HashSet::new(),
                    last_changed_ms: 0,
                }
            });
            let inserted = entry.games.insert(game_id.to_string());
            debug_assert!(inserted, "game {game_id} already in entry {}", matched.code);
            if inserted {
                entry.last_changed_ms = now_ms;
            }
        }
    }

    /// Filtered, deterministically ordered view of the index.
    ///
    /// Ordering: count descending, then name ascending, then code as the
    /// final tie-break. Entries left with no games are omitted. Game-level
    /// filter fields are resolved against the registry after the index
    /// lock has been released.
    pub fn query(&self, filter: &QueryFilter, registry: &GameRegistry) -> Vec<OpeningIndexEntry> {
        let eco_prefix = filter.eco_prefix.as_deref().map(str::to_ascii_uppercase);
        let needle = filter
            .name_substring
            .as_deref()
            .map(str::to_ascii_lowercase);

        // Bounded critical section: copy matching entries, then filter
        // game-by-game without holding the lock.
        let copied: Vec<OpeningIndexEntry> = {
            let entries = self.entries.read().expect("index lock poisoned");
            entries
                .iter()
                .filter(|(code, entry)| {
                    if entry.games.is_empty() {
                        return false;
                    }
                    if let Some(prefix) = &eco_prefix {
                        if !code.to_ascii_uppercase().starts_with(prefix) {
                            return false;
                        }
                    }
                    if let Some(needle) = &needle {
                        let in_name = entry.name.to_ascii_lowercase().contains(needle);
                        let in_alias = entry
                            .aliases
                            .iter()
                            .any(|a| a.to_ascii_lowercase().contains(needle));
                        if !in_name && !in_alias {
                            return false;
                        }
                    }
                    true
                })
                .map(|(code, entry)| {
                    let mut game_ids: Vec<String> = entry.games.iter().cloned().collect();
                    game_ids.sort();
                    OpeningIndexEntry {
                        code: code.clone(),
                        name: entry.name.clone(),
                        aliases: entry.aliases.clone(),
                        count: game_ids.len(),
                        game_ids,
                        last_changed_ms: entry.last_changed_ms,
                    }
                })
                .collect()
        };

        let mut results: Vec<OpeningIndexEntry> = if filter.wants_game_fields() {
            copied
                .into_iter()
                .filter_map(|mut entry| {
                    entry.game_ids.retain(|id| {
                        registry.game_matches(id, filter.min_rating, filter.time_control.as_deref())
                    });
                    entry.count = entry.game_ids.len();
                    (entry.count > 0).then_some(entry)
                })
                .collect()
        } else {
            copied
        };

        results.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.code.cmp(&b.code))
        });
        results
    }

    /// Game ids currently counted under `code`; `None` for unknown codes.
    pub fn games_for(&self, code: &str) -> Option<Vec<String>> {
        let entries = self.entries.read().expect("index lock poisoned");
        entries.get(code).map(|entry| {
            let mut ids: Vec<String> = entry.games.iter().cloned().collect();
            ids.sort();
            ids
        })
    }

    /// Total number of game memberships across all entries.
    pub fn indexed_games(&self) -> usize {
        let entries = self.entries.read().expect("index lock poisoned");
        entries.values().map(|e| e.games.len()).sum()
    }

    /// Number of entries currently holding at least one game.
    pub fn active_entries(&self) -> usize {
        let entries = self.entries.read().expect("index lock poisoned");
        entries.values().filter(|e| !e.games.is_empty()).count()
    }
}
