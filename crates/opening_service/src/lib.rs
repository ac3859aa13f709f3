//! Live chess opening classification service.
//!
//! Consumes normalized `GameUpdate`s, matches each game's evolving move
//! history against an immutable reference tree of named openings, and
//! maintains a live opening -> games index usable for concurrent reads
//! while updates keep arriving.
//!
//! # Architecture
//!
//! ```text
//! GameUpdate channel --> GameRegistry --> Classifier (OpeningTree)
//!                             |
//!                             v
//!                        OpeningIndex --> QueryService --> HTTP API
//! ```
//!
//! - **Per-game serialization**: registry writes go through DashMap entry
//!   guards; updates for different ids proceed without contention
//! - **Atomic index moves**: a classification change mutates the index
//!   under one short write lock while the game's entry guard is held
//! - **Snapshot reads**: the query service only hands out owned copies

pub mod api;
pub mod classifier;
pub mod error;
pub mod game;
pub mod index;
pub mod query;
pub mod registry;
pub mod service;
pub mod stats;
pub mod tree;

pub use api::{create_router, AppState};
pub use classifier::{Classification, Classifier, OpeningMatch};
pub use error::Error;
pub use game::{Game, GameSnapshot, MoveRec, Side};
pub use index::{OpeningIndex, OpeningIndexEntry, QueryFilter};
pub use query::{QueryService, StatsReport};
pub use registry::{GameRegistry, UpsertOutcome};
pub use service::{OpeningService, OpeningServiceConfig};
pub use stats::{ServiceStats, StatsSnapshot};
pub use tree::{OpeningLabel, OpeningTree};
