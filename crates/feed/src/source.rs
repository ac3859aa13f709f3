//! Game-source selection strategy.

use std::fmt;

/// Where the poller looks for live games.
///
/// The choice is made once at construction; the core downstream only ever
/// sees a uniform `GameUpdate` stream and stays agnostic to the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Source {
    /// Lichess TV channels only.
    Tv,
    /// Official broadcast rounds only.
    Broadcast,
    /// TV first, broadcasts when TV yields nothing.
    #[default]
    Auto,
}

impl Source {
    /// Parse a configuration string; `None` for anything unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tv" => Some(Source::Tv),
            "broadcast" => Some(Source::Broadcast),
            "auto" => Some(Source::Auto),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Source::Tv => "tv",
            Source::Broadcast => "broadcast",
            Source::Auto => "auto",
        };
        f.write_str(label)
    }
}
