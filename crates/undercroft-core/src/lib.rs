//! Deterministic tick resolution and replication engine for Undercroft.
//!
//! An authoritative, turn-based, two-player duel across stacked dungeon
//! levels. Each tick, the [`Updater`](updater::Updater) resolves the two
//! players' simultaneous moves (plus NPC moves) with randomized initiative,
//! runs the three-phase modifier protocol for combat, and emits an ordered
//! log of [`GameStateUpdate`](update::GameStateUpdate) records. Clients —
//! including ones with only a partial view of the world — replay those
//! records to reach byte-identical state without ever drawing randomness:
//! every random draw happens on the server in a modifier's pre phase, and
//! its result ships inside the record.
//!
//! # Example
//!
//! ```
//! use undercroft_core::config::EngineConfig;
//! use undercroft_core::entity::BaseStats;
//! use undercroft_core::moves::Move;
//! use undercroft_core::updater::{IdleController, TickOutcome, Updater};
//! use undercroft_core::worldgen::{EmptyDungeonGenerator, StartGenerator};
//!
//! let mut updater = Updater::new(
//!     EngineConfig { seed: 42, ..EngineConfig::default() },
//!     Box::new(EmptyDungeonGenerator::new(8, 8).unwrap()),
//!     Box::new(IdleController),
//! );
//! let stats = BaseStats::new(10, 3, 1);
//! let mut state = updater.generate_start(&StartGenerator::new(stats, stats));
//!
//! let (outcome, log) = updater.resolve_tick(&mut state, Move::Right, Move::Left);
//! assert_eq!(state.tick(), 1);
//! # let _ = (outcome, log);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod entity;
pub mod item;
pub mod modifier;
pub mod moves;
pub mod state;
pub mod update;
pub mod updater;
pub mod world;
pub mod worldgen;

pub use config::{ConfigError, DespawnStrategy, EngineConfig};
pub use entity::{BaseStats, DerivedStats, Entity, EntityId};
pub use modifier::{AttackResult, CombatFlags, GameEvent, Modifier, ModifierKind, PreVal};
pub use moves::Move;
pub use state::GameState;
pub use update::{ApplyError, GameStateUpdate, UpdateKind};
pub use updater::{IdleController, NpcController, TickOutcome, Updater};
pub use world::{Dungeon, Tile, World};
pub use worldgen::{DungeonGenerator, EmptyDungeonGenerator, StartGenerator};

#[cfg(test)]
mod tests;
