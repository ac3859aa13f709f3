//! Ingestion collaborator: polls the game provider and feeds the
//! classification core with normalized `GameUpdate`s over a channel.
//!
//! The core never fetches anything itself; this crate owns source
//! selection, the polling cadence, and provider error tolerance.

pub mod poller;
pub mod source;

pub use poller::{GamePoller, PollerConfig};
pub use source::Source;
