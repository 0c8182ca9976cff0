//! The update log: ordered, replayable mutation records.
//!
//! Every state change the Updater makes is mirrored by exactly one
//! [`GameStateUpdate`]. Recipients apply records in strictly ascending
//! `order` to reach byte-identical state without access to the server's
//! randomness: records that depended on random draws (combat, entity
//! events) carry the pre-phase values and re-run the same deterministic
//! on/post pipeline on apply.
//!
//! [`GameStateUpdate::relevant_for`] supports partial-view clients: the
//! transport asks, per viewer depth, whether a record needs forwarding.
//! The `order` counter still advances for filtered records, so a viewer's
//! feed is a strictly increasing subsequence of the full log.

use glam::IVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{Entity, EntityId};
use crate::modifier::{
    resolve_combat_outcome, run_entity_event, CombatFlags, GameEvent, Modifier, PreVal,
};
use crate::state::GameState;
use crate::world::Dungeon;

/// Replay failure: the recipient's state disagrees with the record.
///
/// This is the desynchronization signal. The core does not attempt repair;
/// the transport is expected to force a full-state resync.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The record references an entity the recipient does not have.
    #[error("update references unknown {id}")]
    UnknownEntity {
        /// Referenced entity.
        id: EntityId,
    },
    /// A spawn record collides with an existing entity id.
    #[error("spawn for already-known {id}")]
    EntityExists {
        /// Colliding entity.
        id: EntityId,
    },
    /// The record references a depth with no generated dungeon.
    #[error("update references unknown dungeon at depth {depth}")]
    UnknownDungeon {
        /// Referenced depth.
        depth: u32,
    },
    /// A position record's destination cell is already occupied.
    #[error("destination cell ({x}, {y}) at depth {depth} is occupied")]
    CellOccupied {
        /// Destination depth.
        depth: u32,
        /// Destination x.
        x: i32,
        /// Destination y.
        y: i32,
    },
    /// A modifier-removal index is out of range.
    #[error("{id} has no modifier at index {index}")]
    ModifierIndex {
        /// Owning entity.
        id: EntityId,
        /// Out-of-range attachment index.
        index: usize,
    },
    /// A preval vector does not line up with the entity's modifier list.
    #[error("preval count does not match modifier list of {id}")]
    PrevalMismatch {
        /// Owning entity.
        id: EntityId,
    },
}

/// The closed set of mutation record payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateKind {
    /// A new entity entered the world.
    EntitySpawned {
        /// Full entity snapshot at spawn time.
        entity: Entity,
    },
    /// An entity was removed. Carries the depth it died on, since the
    /// authoritative state no longer contains it when viewers filter.
    EntityDied {
        /// Removed entity.
        entity_id: EntityId,
        /// Depth at time of death.
        depth: u32,
    },
    /// An entity moved. `depth_changed` distinguishes descent from a
    /// same-level step.
    EntityPosition {
        /// Moved entity.
        entity_id: EntityId,
        /// Destination depth.
        depth: u32,
        /// Destination cell.
        position: IVec2,
        /// `true` when the move crossed levels.
        depth_changed: bool,
    },
    /// A direct health change outside combat (items, scripted effects).
    EntityHealth {
        /// Affected entity.
        entity_id: EntityId,
        /// Cause, when attributable to another entity.
        source_id: Option<EntityId>,
        /// Signed delta; healing is capped at derived max health.
        delta: i32,
        /// Tags describing the change.
        flags: CombatFlags,
    },
    /// A modifier was attached.
    ModifierAdded {
        /// Owning entity.
        entity_id: EntityId,
        /// The attached modifier.
        modifier: Modifier,
    },
    /// A modifier was detached by attachment index.
    ModifierRemoved {
        /// Owning entity.
        entity_id: EntityId,
        /// Attachment-list index.
        index: usize,
    },
    /// A level was generated.
    DungeonCreated {
        /// Level depth.
        depth: u32,
        /// Full tile data.
        dungeon: Dungeon,
    },
    /// A level was despawned.
    DungeonRemoved {
        /// Level depth.
        depth: u32,
    },
    /// A non-combat event ran an entity's modifier pipeline.
    EntityEvent {
        /// Owning entity.
        entity_id: EntityId,
        /// The event.
        event: GameEvent,
        /// One preval per modifier, in attachment order.
        prevals: Vec<PreVal>,
    },
    /// A combat engagement. Carries the *original* base damage (attacker
    /// derived damage minus defender derived armor) and both sides'
    /// prevals; apply re-runs the modifier pipeline to recompute the
    /// identical final damage.
    Combat {
        /// The mover who initiated the engagement.
        attacker_id: EntityId,
        /// The occupant of the contested cell.
        defender_id: EntityId,
        /// Base damage before modifiers.
        damage: i32,
        /// How the engagement occurred.
        flags: CombatFlags,
        /// Attacker-side prevals, in attachment order.
        attack_prevals: Vec<PreVal>,
        /// Defender-side prevals, in attachment order.
        defend_prevals: Vec<PreVal>,
    },
}

/// One ordered record in the tick's output log.
///
/// Immutable once created. `order` is a single monotonic counter owned by
/// the Updater, incremented on every emission including records later
/// filtered out for a given viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateUpdate {
    order: u64,
    kind: UpdateKind,
}

impl GameStateUpdate {
    /// Wraps a record payload with its log position.
    #[must_use]
    pub const fn new(order: u64, kind: UpdateKind) -> Self {
        Self { order, kind }
    }

    /// Position in the full log.
    #[must_use]
    pub const fn order(&self) -> u64 {
        self.order
    }

    /// Record payload.
    #[must_use]
    pub const fn kind(&self) -> &UpdateKind {
        &self.kind
    }

    /// Mutates `state` to reflect this record.
    ///
    /// Preconditions are checked before any mutation, so a failed apply
    /// leaves `state` untouched and the caller can resync.
    pub fn apply(&self, state: &mut GameState) -> Result<(), ApplyError> {
        match &self.kind {
            UpdateKind::EntitySpawned { entity } => {
                if state.entity(entity.id()).is_some() {
                    return Err(ApplyError::EntityExists { id: entity.id() });
                }
                let (depth, p) = (entity.depth(), entity.position());
                if state.entity_at(depth, p).is_some() {
                    return Err(ApplyError::CellOccupied {
                        depth,
                        x: p.x,
                        y: p.y,
                    });
                }
                state.add_entity(entity.clone());
                Ok(())
            }
            UpdateKind::EntityDied { entity_id, .. } => {
                state
                    .remove_entity(*entity_id)
                    .map(|_| ())
                    .ok_or(ApplyError::UnknownEntity { id: *entity_id })
            }
            UpdateKind::EntityPosition {
                entity_id,
                depth,
                position,
                ..
            } => {
                if state.entity(*entity_id).is_none() {
                    return Err(ApplyError::UnknownEntity { id: *entity_id });
                }
                match state.entity_at(*depth, *position) {
                    Some(occupant) if occupant != *entity_id => Err(ApplyError::CellOccupied {
                        depth: *depth,
                        x: position.x,
                        y: position.y,
                    }),
                    _ => {
                        state.move_entity(*entity_id, *depth, *position);
                        Ok(())
                    }
                }
            }
            UpdateKind::EntityHealth {
                entity_id, delta, ..
            } => {
                let e = state
                    .entity_mut(*entity_id)
                    .ok_or(ApplyError::UnknownEntity { id: *entity_id })?;
                e.refresh_derived();
                let cap = e.derived().max_health;
                e.apply_health_delta(*delta, cap);
                Ok(())
            }
            UpdateKind::ModifierAdded {
                entity_id,
                modifier,
            } => {
                let e = state
                    .entity_mut(*entity_id)
                    .ok_or(ApplyError::UnknownEntity { id: *entity_id })?;
                e.attach_modifier(*modifier);
                Ok(())
            }
            UpdateKind::ModifierRemoved { entity_id, index } => {
                let e = state
                    .entity_mut(*entity_id)
                    .ok_or(ApplyError::UnknownEntity { id: *entity_id })?;
                e.detach_modifier(*index)
                    .map(|_| ())
                    .ok_or(ApplyError::ModifierIndex {
                        id: *entity_id,
                        index: *index,
                    })
            }
            UpdateKind::DungeonCreated { depth, dungeon } => {
                state.world_mut().insert(*depth, dungeon.clone());
                Ok(())
            }
            UpdateKind::DungeonRemoved { depth } => state
                .world_mut()
                .remove(*depth)
                .map(|_| ())
                .ok_or(ApplyError::UnknownDungeon { depth: *depth }),
            UpdateKind::EntityEvent {
                entity_id,
                event,
                prevals,
            } => run_entity_event(state, *entity_id, *event, prevals),
            UpdateKind::Combat {
                attacker_id,
                defender_id,
                damage,
                flags,
                attack_prevals,
                defend_prevals,
            } => resolve_combat_outcome(
                state,
                *attacker_id,
                *defender_id,
                *damage,
                *flags,
                attack_prevals,
                defend_prevals,
            )
            .map(|_| ()),
        }
    }

    /// Whether a viewer currently looking at `depth` needs this record.
    ///
    /// Evaluated against the authoritative state *after* the record was
    /// applied to it, which is why death records carry their depth.
    #[must_use]
    pub fn relevant_for(&self, state: &GameState, depth: u32) -> bool {
        let on_depth =
            |id: EntityId| state.entity(id).is_some_and(|e| e.depth() == depth);
        match &self.kind {
            UpdateKind::EntitySpawned { entity } => entity.depth() == depth,
            UpdateKind::EntityDied { depth: d, .. }
            | UpdateKind::DungeonCreated { depth: d, .. }
            | UpdateKind::DungeonRemoved { depth: d } => *d == depth,
            UpdateKind::EntityPosition {
                entity_id,
                depth: d,
                ..
            } => *d == depth || on_depth(*entity_id),
            UpdateKind::EntityHealth { entity_id, .. }
            | UpdateKind::ModifierAdded { entity_id, .. }
            | UpdateKind::ModifierRemoved { entity_id, .. }
            | UpdateKind::EntityEvent { entity_id, .. } => on_depth(*entity_id),
            UpdateKind::Combat {
                attacker_id,
                defender_id,
                ..
            } => on_depth(*attacker_id) || on_depth(*defender_id),
        }
    }
}
