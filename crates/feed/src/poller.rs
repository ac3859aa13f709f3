//! Polling loop that turns provider state into a `GameUpdate` stream.

use crate::source::Source;
use anyhow::Result;
use chrono::Utc;
use lichess::{broadcast_round_ids, round_game_ids, LichessClient};
use metrics::{counter, gauge};
use normalizer::{GameUpdate, LichessExportAdapter, SourceAdapter};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for the game poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Source strategy, fixed at construction.
    pub source: Source,
    /// Delay between polls.
    pub interval: Duration,
    /// Maximum channels/rounds to inspect per poll (None = all).
    pub limit: Option<usize>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            source: Source::Auto,
            interval: Duration::from_secs(30),
            limit: None,
        }
    }
}

/// Polls the provider on an interval and pushes normalized updates into
/// the channel consumed by the classification core.
///
/// Fetch failures are logged and counted; the loop keeps its cadence and
/// retries naturally on the next tick.
pub struct GamePoller {
    client: LichessClient,
    config: PollerConfig,
    tv_adapter: LichessExportAdapter,
    broadcast_adapter: LichessExportAdapter,
    update_tx: mpsc::Sender<GameUpdate>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl GamePoller {
    /// Create a new poller.
    pub fn new(
        client: LichessClient,
        config: PollerConfig,
        update_tx: mpsc::Sender<GameUpdate>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            client,
            config,
            tv_adapter: LichessExportAdapter::new("tv"),
            broadcast_adapter: LichessExportAdapter::new("broadcast"),
            update_tx,
            shutdown_rx,
        }
    }

    /// Run the poll loop (blocking until shutdown).
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Starting game poller (source={}, interval={:?})",
            self.config.source, self.config.interval
        );

        let mut ticker = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                biased;  // Prioritize shutdown signal

                _ = self.shutdown_rx.recv() => {
                    info!("Game poller received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    counter!("feed_polls_total").increment(1);
                    match self.poll_once().await {
                        Ok(sent) => {
                            gauge!("feed_last_poll_updates").set(sent as f64);
                            debug!("Poll complete, {} updates sent", sent);
                        }
                        Err(e) => {
                            warn!("Poll failed: {:?}", e);
                            counter!("feed_poll_errors_total").increment(1);
                        }
                    }
                }
            }
        }

        info!("Game poller stopped");
        Ok(())
    }

    /// One poll pass: resolve game ids for the configured source, export
    /// each game, and push the normalized updates downstream.
    async fn poll_once(&self) -> Result<usize> {
        let (game_ids, adapter) = match self.config.source {
            Source::Tv => (self.tv_game_ids().await?, &self.tv_adapter),
            Source::Broadcast => (self.broadcast_game_ids().await?, &self.broadcast_adapter),
            Source::Auto => {
                let tv_ids = self.tv_game_ids().await?;
                if tv_ids.is_empty() {
                    debug!("TV returned no games, falling back to broadcasts");
                    (self.broadcast_game_ids().await?, &self.broadcast_adapter)
                } else {
                    (tv_ids, &self.tv_adapter)
                }
            }
        };

        let mut sent = 0;
        for game_id in game_ids {
            let payload = match self.client.export_game_raw(&game_id).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to export game {}: {:?}", game_id, e);
                    counter!("feed_export_errors_total").increment(1);
                    continue;
                }
            };

            let updates = match adapter.parse_and_transform(&payload) {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Failed to parse export for {}: {:?}", game_id, e);
                    counter!("feed_parse_errors_total").increment(1);
                    continue;
                }
            };

            for update in updates {
                if self.update_tx.send(update).await.is_err() {
                    anyhow::bail!("update channel closed");
                }
                sent += 1;
            }
        }

        counter!("feed_updates_sent_total").increment(sent as u64);
        Ok(sent)
    }

    /// Current game ids from the TV channel listing.
    async fn tv_game_ids(&self) -> Result<Vec<String>> {
        let channels = self.client.tv_channels().await?.into_channels();
        let mut ids: Vec<String> = channels
            .iter()
            .filter_map(|c| c.current_game_id().map(str::to_string))
            .collect();
        if let Some(limit) = self.config.limit {
            ids.truncate(limit);
        }
        Ok(ids)
    }

    /// Current game ids across active broadcast rounds.
    async fn broadcast_game_ids(&self) -> Result<Vec<String>> {
        let broadcasts = self.client.broadcasts().await?;
        let mut round_ids = broadcast_round_ids(&broadcasts, Utc::now().timestamp_millis());
        if let Some(limit) = self.config.limit {
            round_ids.truncate(limit);
        }

        let mut game_ids = Vec::new();
        for round_id in round_ids {
            match self.client.broadcast_round(&round_id).await {
                Ok(payload) => {
                    let ids = round_game_ids(&payload);
                    if ids.is_empty() {
                        debug!("No game ids found in broadcast round {}", round_id);
                    }
                    game_ids.extend(ids);
                }
                Err(e) if e.is_not_found() => {
                    debug!("Skipping missing broadcast round {}", round_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(game_ids)
    }
}
