//! Update-consuming service loop.
//!
//! Drains the `GameUpdate` channel fed by the ingestion collaborator and
//! applies each update through the registry. The staleness sweep and the
//! metrics-gauge refresh run on interval ticks inside the same loop.

use crate::index::OpeningIndex;
use crate::registry::{GameRegistry, UpsertOutcome};
use anyhow::Result;
use chrono::Utc;
use metrics::{counter, gauge};
use normalizer::GameUpdate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for the opening service loop.
#[derive(Debug, Clone)]
pub struct OpeningServiceConfig {
    /// Delay between staleness sweeps.
    pub sweep_interval: Duration,
    /// Delay between metrics gauge refreshes.
    pub metrics_interval: Duration,
}

impl Default for OpeningServiceConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(15),
            metrics_interval: Duration::from_secs(5),
        }
    }
}

/// Service that keeps the registry and index current.
pub struct OpeningService {
    registry: Arc<GameRegistry>,
    index: Arc<OpeningIndex>,
    config: OpeningServiceConfig,
    update_rx: mpsc::Receiver<GameUpdate>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl OpeningService {
    pub fn new(
        registry: Arc<GameRegistry>,
        index: Arc<OpeningIndex>,
        config: OpeningServiceConfig,
        update_rx: mpsc::Receiver<GameUpdate>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            registry,
            index,
            config,
            update_rx,
            shutdown_rx,
        }
    }

    /// Run the service (blocking until shutdown or channel close).
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Starting OpeningService (staleness window {:?}, sweep every {:?})",
            self.registry.staleness_window(),
            self.config.sweep_interval
        );

        let mut sweep_interval = tokio::time::interval(self.config.sweep_interval);
        let mut metrics_interval = tokio::time::interval(self.config.metrics_interval);

        loop {
            tokio::select! {
                biased;  // Prioritize shutdown signal

                _ = self.shutdown_rx.recv() => {
                    info!("OpeningService received shutdown signal");
                    break;
                }

                _ = sweep_interval.tick() => {
                    let evicted = self.registry.sweep_stale(Utc::now().timestamp_millis());
                    if evicted > 0 {
                        info!("Staleness sweep evicted {} games", evicted);
                    }
                }

                _ = metrics_interval.tick() => {
                    self.update_metrics();
                }

                update = self.update_rx.recv() => {
                    match update {
                        Some(update) => self.process_update(update),
                        None => {
                            warn!("Update channel closed, stopping");
                            break;
                        }
                    }
                }
            }
        }

        info!("OpeningService stopped");
        Ok(())
    }

    fn process_update(&self, update: GameUpdate) {
        let id = update.id.clone();
        let outcome = self.registry.upsert(update);
        debug!("Applied update for game {}: {:?}", id, outcome);

        let outcome_label = match outcome {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Retired => "retired",
            UpsertOutcome::Ignored => "ignored",
        };
        counter!(
            "opening_service_updates_total",
            "outcome" => outcome_label
        )
        .increment(1);
    }

    /// Refresh Prometheus gauges from the live state.
    fn update_metrics(&self) {
        gauge!("opening_service_tracked_games").set(self.registry.game_count() as f64);
        gauge!("opening_service_live_games").set(self.registry.live_game_count() as f64);
        gauge!("opening_service_indexed_games").set(self.index.indexed_games() as f64);
        gauge!("opening_service_active_openings").set(self.index.active_entries() as f64);
    }
}
