//! Engine startup configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal configuration problems, surfaced at startup before any tick runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A despawn strategy name did not parse.
    #[error("unknown despawn strategy {0:?} (expected \"unreachable\" or \"unused\")")]
    UnknownDespawnStrategy(String),
    /// Dungeon dimensions leave no interior floor.
    #[error("dungeon dimensions {width}x{height} are too small (minimum 3x3)")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Policy for discarding dungeon levels after the players leave them.
///
/// Either way, a depth containing any live entity is never despawned.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DespawnStrategy {
    /// Despawn a depth only once both players are strictly deeper than it;
    /// it can never be revisited.
    #[default]
    Unreachable,
    /// Despawn any depth neither player stands on. More aggressive; the
    /// level may be regenerated later.
    Unused,
}

impl FromStr for DespawnStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unreachable" => Ok(Self::Unreachable),
            "unused" => Ok(Self::Unused),
            other => Err(ConfigError::UnknownDespawnStrategy(other.to_owned())),
        }
    }
}

/// Startup parameters handed to the engine constructor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seed for the engine's single random stream.
    pub seed: u64,
    /// Level despawn policy.
    pub despawn: DespawnStrategy,
    /// Optional tick cutoff; reaching it with both players alive is a tie.
    pub max_ticks: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            despawn: DespawnStrategy::Unreachable,
            max_ticks: None,
        }
    }
}
