//! Lichess API payload types and pure extraction helpers.
//!
//! The TV and broadcast endpoints are loosely shaped and have drifted over
//! time (channel maps vs. lists, several spellings of the game id), so the
//! types here accept every shape observed in the wild and the helpers fold
//! them down to plain game ids.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Response of `/api/tv/channels`.
#[derive(Debug, Deserialize)]
pub struct TvChannels {
    #[serde(default)]
    pub channels: ChannelSet,
}

/// The TV endpoint has served channels both as a name-keyed map and as a
/// plain list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChannelSet {
    Map(HashMap<String, TvChannel>),
    List(Vec<TvChannel>),
}

impl Default for ChannelSet {
    fn default() -> Self {
        ChannelSet::List(Vec::new())
    }
}

/// A single TV channel entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TvChannel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "gameId")]
    pub game_id: Option<String>,
    #[serde(default)]
    pub game: Option<GameRef>,
}

/// Nested game reference used by newer TV payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct GameRef {
    pub id: String,
}

impl TvChannel {
    /// The channel's current game id, whichever field carries it.
    pub fn current_game_id(&self) -> Option<&str> {
        self.game_id
            .as_deref()
            .or_else(|| self.game.as_ref().map(|g| g.id.as_str()))
    }
}

impl TvChannels {
    /// Flatten into an ordered channel list, filling names from map keys.
    pub fn into_channels(self) -> Vec<TvChannel> {
        match self.channels {
            ChannelSet::List(list) => list,
            ChannelSet::Map(map) => {
                let mut channels: Vec<(String, TvChannel)> = map.into_iter().collect();
                // Map iteration order is arbitrary; sort by key for a stable poll order.
                channels.sort_by(|a, b| a.0.cmp(&b.0));
                channels
                    .into_iter()
                    .map(|(key, mut channel)| {
                        if channel.name.is_none() {
                            channel.name = Some(key);
                        }
                        channel
                    })
                    .collect()
            }
        }
    }
}

/// One line of the `/api/broadcast` ND-JSON listing.
#[derive(Debug, Deserialize)]
pub struct Broadcast {
    #[serde(default)]
    pub tour: Option<BroadcastTour>,
    #[serde(default)]
    pub rounds: Vec<BroadcastRoundInfo>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastTour {
    #[serde(default, rename = "defaultRoundId")]
    pub default_round_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRoundInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub finished: Option<bool>,
    #[serde(default, rename = "startsAt")]
    pub starts_at: Option<i64>,
}

/// Select the round ids worth polling from a broadcast listing.
///
/// Takes each tour's default round plus every round that is neither
/// finished nor scheduled after `now_ms`, deduplicated in first-seen order.
pub fn broadcast_round_ids(broadcasts: &[Broadcast], now_ms: i64) -> Vec<String> {
    let mut round_ids = Vec::new();

    for broadcast in broadcasts {
        if let Some(default_round) = broadcast
            .tour
            .as_ref()
            .and_then(|t| t.default_round_id.as_ref())
        {
            round_ids.push(default_round.clone());
        }
        for round in &broadcast.rounds {
            if round.finished == Some(true) {
                continue;
            }
            if matches!(round.starts_at, Some(starts) if starts > now_ms) {
                continue;
            }
            if let Some(id) = &round.id {
                round_ids.push(id.clone());
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    round_ids.retain(|id| seen.insert(id.clone()));
    round_ids
}

/// Extract game ids from a broadcast round payload.
///
/// Rounds expose games under `games` or `pairings`, as a list or an
/// id-keyed map, with the game id under several spellings or only inside
/// the game URL.
pub fn round_game_ids(payload: &Value) -> Vec<String> {
    let games = payload
        .get("games")
        .or_else(|| payload.get("pairings"))
        .cloned()
        .unwrap_or(Value::Null);

    let entries: Vec<Value> = match games {
        Value::Array(list) => list,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        _ => Vec::new(),
    };

    entries
        .iter()
        .filter_map(|game| {
            let obj = game.as_object()?;
            obj.get("id")
                .or_else(|| obj.get("gameId"))
                .or_else(|| obj.get("lichessId"))
                .or_else(|| obj.get("game").and_then(|g| g.get("id")))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    obj.get("url")
                        .and_then(Value::as_str)
                        .and_then(game_id_from_url)
                })
        })
        .collect()
}

/// Last non-empty path segment of a game URL.
pub fn game_id_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tv_channels_map_shape() {
        let raw = r#"{"channels": {"blitz": {"gameId": "abc123"}, "bullet": {"game": {"id": "def456"}}}}"#;
        let parsed: TvChannels = serde_json::from_str(raw).unwrap();
        let channels = parsed.into_channels();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name.as_deref(), Some("blitz"));
        assert_eq!(channels[0].current_game_id(), Some("abc123"));
        assert_eq!(channels[1].current_game_id(), Some("def456"));
    }

    #[test]
    fn test_tv_channels_list_shape() {
        let raw = r#"{"channels": [{"name": "Blitz", "gameId": "abc123"}]}"#;
        let parsed: TvChannels = serde_json::from_str(raw).unwrap();
        let channels = parsed.into_channels();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name.as_deref(), Some("Blitz"));
    }

    #[test]
    fn test_broadcast_round_selection() {
        let raw = r#"{"tour": {"defaultRoundId": "r1"}, "rounds": [
            {"id": "r1", "finished": false},
            {"id": "r2", "finished": true},
            {"id": "r3", "startsAt": 2000},
            {"id": "r4", "startsAt": 500}
        ]}"#;
        let broadcast: Broadcast = serde_json::from_str(raw).unwrap();
        let ids = broadcast_round_ids(&[broadcast], 1000);
        // r1 deduplicated (default + listed), r2 finished, r3 in the future
        assert_eq!(ids, vec!["r1", "r4"]);
    }

    #[test]
    fn test_round_game_ids_fallbacks() {
        let payload = json!({
            "games": [
                {"id": "g1"},
                {"gameId": "g2"},
                {"lichessId": "g3"},
                {"game": {"id": "g4"}},
                {"url": "https://lichess.org/g5/"},
                {"comment": "no id here"}
            ]
        });
        assert_eq!(round_game_ids(&payload), vec!["g1", "g2", "g3", "g4", "g5"]);
    }

    #[test]
    fn test_round_game_ids_pairings_map() {
        let payload = json!({"pairings": {"a": {"id": "g1"}}});
        assert_eq!(round_game_ids(&payload), vec!["g1"]);
    }

    #[test]
    fn test_game_id_from_url() {
        assert_eq!(game_id_from_url("https://lichess.org/abc123").as_deref(), Some("abc123"));
        assert_eq!(game_id_from_url("https://lichess.org/abc123/").as_deref(), Some("abc123"));
        assert_eq!(game_id_from_url(""), None);
        assert_eq!(game_id_from_url("///"), None);
    }
}
