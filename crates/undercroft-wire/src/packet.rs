//! The closed set of packets exchanged between server and clients.
//!
//! Handshake and turn flow: the server opens with `Sync` (full or partial
//! state plus the recipient's player id, `None` for spectators), then per
//! tick sends `TickStart`, collects one `Move` from each player, streams
//! the filtered `Update` records, and closes the tick with `TickEnd`
//! carrying the match outcome. A desynced client receives a fresh `Sync`.

use serde::{Deserialize, Serialize};

use undercroft_core::entity::EntityId;
use undercroft_core::moves::Move;
use undercroft_core::state::GameState;
use undercroft_core::update::GameStateUpdate;
use undercroft_core::updater::TickOutcome;

/// Full-state synchronization payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPacket {
    /// The recipient's copy of the state (a view for players/spectators).
    pub game_state: GameState,
    /// The recipient's player entity, `None` for spectators.
    pub player_id: Option<EntityId>,
}

/// A player's move submission for the current tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePacket {
    /// The submitting player's entity.
    pub entity_id: EntityId,
    /// The chosen move.
    #[serde(rename = "move")]
    pub mv: Move,
}

/// One replicated update record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePacket {
    /// The record, with its position in the full log.
    pub update: GameStateUpdate,
}

/// Tick closing notification; recipients advance their tick counter on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEndPacket {
    /// Match status after the tick.
    pub outcome: TickOutcome,
}

/// Everything that can travel in an [`Envelope`](crate::envelope::Envelope).
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Full-state resync.
    Sync(SyncPacket),
    /// Player move submission.
    Move(MovePacket),
    /// Update record broadcast.
    Update(UpdatePacket),
    /// The server is collecting moves for a new tick.
    TickStart,
    /// The tick finished resolving.
    TickEnd(TickEndPacket),
}

impl Packet {
    /// Stable wire tag identifying the payload type.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Sync(_) => "sync",
            Self::Move(_) => "move",
            Self::Update(_) => "update",
            Self::TickStart => "tick_start",
            Self::TickEnd(_) => "tick_end",
        }
    }
}
