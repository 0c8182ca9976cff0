//! The tick resolution engine.
//!
//! [`Updater::resolve_tick`] consumes the two player moves, computes NPC
//! moves, resolves all simultaneous actions in randomized-initiative order,
//! applies combat, descent and death side effects directly to the
//! authoritative state, and returns the match outcome together with the
//! ordered update log for that tick.
//!
//! The Updater owns the engine's only random stream and the monotonic
//! record `order` counter, both of which persist across ticks. Resolution
//! is single-threaded and synchronous: one call runs to completion, and
//! the caller must not re-enter it concurrently on the same state.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::{DespawnStrategy, EngineConfig};
use crate::entity::EntityId;
use crate::modifier::{
    collect_prevals, resolve_combat_outcome, run_entity_event, CombatFlags, GameEvent,
};
use crate::moves::Move;
use crate::state::GameState;
use crate::update::{GameStateUpdate, UpdateKind};
use crate::worldgen::{random_free_ground, DungeonGenerator, StartGenerator};

/// Match status after a tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickOutcome {
    /// Both players alive, match continues.
    InProgress,
    /// Player 2's health reached zero.
    Player1Win,
    /// Player 1's health reached zero.
    Player2Win,
    /// Both players down simultaneously, or the tick cutoff was reached.
    Tie,
}

/// Decision function for NPC moves. Pluggable; bot logic lives above the
/// engine.
pub trait NpcController {
    /// Chooses the move for NPC `id` this tick.
    fn decide(&mut self, state: &GameState, id: EntityId) -> Move;
}

/// Default controller: every NPC stands still.
#[derive(Debug, Clone, Default)]
pub struct IdleController;

impl NpcController for IdleController {
    fn decide(&mut self, _state: &GameState, _id: EntityId) -> Move {
        Move::Stay
    }
}

/// The tick resolution engine.
pub struct Updater {
    rng: ChaCha8Rng,
    next_order: u64,
    despawn: DespawnStrategy,
    max_ticks: Option<u64>,
    dungeon_gen: Box<dyn DungeonGenerator>,
    npc_controller: Box<dyn NpcController>,
}

impl Updater {
    /// Creates an engine from its startup configuration and collaborators.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        dungeon_gen: Box<dyn DungeonGenerator>,
        npc_controller: Box<dyn NpcController>,
    ) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            next_order: 0,
            despawn: config.despawn,
            max_ticks: config.max_ticks,
            dungeon_gen,
            npc_controller,
        }
    }

    /// Builds the initial authoritative state, drawing placement from the
    /// engine's own random stream so whole matches replay from one seed.
    pub fn generate_start(&mut self, start: &StartGenerator) -> GameState {
        start.generate(self.dungeon_gen.as_mut(), &mut self.rng)
    }

    /// Resolves one tick.
    ///
    /// Mutates `state` in place and returns the outcome plus every record
    /// emitted this tick, in strictly ascending `order`.
    ///
    /// # Panics
    ///
    /// Panics if `state` is not authoritative — only the server resolves
    /// ticks; every other participant replays records.
    pub fn resolve_tick(
        &mut self,
        state: &mut GameState,
        player1_move: Move,
        player2_move: Move,
    ) -> (TickOutcome, Vec<GameStateUpdate>) {
        assert!(
            state.is_authoritative(),
            "tick resolution requires the authoritative state"
        );
        let mut log = Vec::new();
        debug!(tick = state.tick(), "resolve tick");

        // Derived stats are recomputed before any combat math this tick.
        state.refresh_all_derived();

        let p1 = state.player1();
        let p2 = state.player2();

        // Move collection and validation. Blocked destinations are coerced
        // to Stay so an impossible move does not waste initiative.
        let npc_ids: Vec<EntityId> = state
            .entity_ids()
            .into_iter()
            .filter(|id| !state.is_player(*id))
            .collect();
        let mut moves: BTreeMap<EntityId, Move> = BTreeMap::new();
        moves.insert(p1, validated_move(state, p1, player1_move));
        moves.insert(p2, validated_move(state, p2, player2_move));
        for id in &npc_ids {
            let m = self.npc_controller.decide(state, *id);
            moves.insert(*id, validated_move(state, *id, m));
        }

        // Initiative: players first in random mutual order, then NPCs in
        // random mutual order. List index is the initiative; lower resolves
        // first and wins ties.
        let mut players = [p1, p2];
        players.shuffle(&mut self.rng);
        let mut shuffled_npcs = npc_ids;
        shuffled_npcs.shuffle(&mut self.rng);
        let initiative: Vec<EntityId> =
            players.into_iter().chain(shuffled_npcs).collect();
        let init_index: BTreeMap<EntityId, usize> = initiative
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        trace!(?initiative, "initiative order");

        // Per-entity resolution. `engaged` holds entities whose move was
        // cancelled because an attacker caught them before their turn.
        let mut resolved: BTreeSet<EntityId> = BTreeSet::new();
        let mut engaged: BTreeSet<EntityId> = BTreeSet::new();
        for (idx, id) in initiative.iter().enumerate() {
            let id = *id;
            if !resolved.insert(id) {
                continue;
            }
            // NPCs may already have died to a staircase this tick.
            let Some(entity) = state.entity(id) else {
                continue;
            };
            let m = if engaged.contains(&id) {
                Move::Stay
            } else {
                moves[&id]
            };
            if m.is_stay() {
                continue;
            }
            let depth = entity.depth();
            let origin = entity.position();
            let dest = origin + m.delta();

            match state.entity_at(depth, dest) {
                None => {
                    let staircase = state
                        .world()
                        .get(depth)
                        .is_some_and(|d| d.is_staircase(dest));
                    if staircase {
                        self.handle_descent(state, id, &mut log);
                    } else {
                        state.move_entity(id, depth, dest);
                        self.emit(
                            &mut log,
                            UpdateKind::EntityPosition {
                                entity_id: id,
                                depth,
                                position: dest,
                                depth_changed: false,
                            },
                        );
                    }
                }
                Some(occupant) => {
                    let occupant_move = if engaged.contains(&occupant) {
                        Move::Stay
                    } else {
                        moves[&occupant]
                    };
                    let flags = if occupant_move.is_stay() {
                        CombatFlags::BLOCK
                    } else {
                        let occupant_pos = state
                            .entity(occupant)
                            .map(|e| e.position())
                            .expect("position index returned unknown entity");
                        if occupant_pos + occupant_move.delta() == origin {
                            // Mutual swap. The occupant's own resolution
                            // must not re-process this as a second combat.
                            resolved.insert(occupant);
                            CombatFlags::PARRY
                        } else if init_index[&occupant] < idx {
                            CombatFlags::AMBUSH
                        } else {
                            // The occupant has not resolved yet; it is now
                            // engaged and will hold position on its turn.
                            engaged.insert(occupant);
                            CombatFlags::FLEE
                        }
                    };
                    self.handle_combat(state, id, occupant, flags, &mut log);
                }
            }
        }

        // Death sweep: remove NPCs at or below zero health. Players are
        // exempt; their death ends the match instead.
        for id in state.entity_ids().into_iter().rev() {
            if state.is_player(id) {
                continue;
            }
            let dead = state.entity(id).is_some_and(|e| e.health() <= 0);
            if dead {
                self.remove_dead(state, id, &mut log);
            }
        }

        // End-of-tick modifier pass for survivors.
        self.run_tick_events(state, &mut log);

        state.advance_tick();

        let h1 = state.entity(p1).map_or(0, |e| e.health());
        let h2 = state.entity(p2).map_or(0, |e| e.health());
        let outcome = match (h1 <= 0, h2 <= 0) {
            (true, true) => TickOutcome::Tie,
            (true, false) => TickOutcome::Player2Win,
            (false, true) => TickOutcome::Player1Win,
            (false, false) => {
                if self.max_ticks.is_some_and(|cutoff| state.tick() >= cutoff) {
                    TickOutcome::Tie
                } else {
                    TickOutcome::InProgress
                }
            }
        };
        debug!(tick = state.tick(), ?outcome, records = log.len(), "tick resolved");
        (outcome, log)
    }

    // ========================================================================
    // Side-effect handlers
    // ========================================================================

    /// Runs one combat engagement and emits its record.
    fn handle_combat(
        &mut self,
        state: &mut GameState,
        attacker: EntityId,
        defender: EntityId,
        flags: CombatFlags,
        log: &mut Vec<GameStateUpdate>,
    ) {
        let base_damage = state
            .entity(attacker)
            .map(|e| e.derived().damage)
            .expect("attacker vanished mid-resolution")
            - state
                .entity(defender)
                .map(|e| e.derived().armor)
                .expect("defender vanished mid-resolution");

        let attack_prevals =
            collect_prevals(state, attacker, GameEvent::ParentAttack, &mut self.rng);
        let defend_prevals =
            collect_prevals(state, defender, GameEvent::ParentDefend, &mut self.rng);

        let result = resolve_combat_outcome(
            state,
            attacker,
            defender,
            base_damage,
            flags,
            &attack_prevals,
            &defend_prevals,
        )
        .expect("combat between live entities cannot fail to apply");
        debug!(
            %attacker,
            %defender,
            base_damage,
            final_damage = result.damage(),
            ?flags,
            "combat"
        );

        self.emit(
            log,
            UpdateKind::Combat {
                attacker_id: attacker,
                defender_id: defender,
                damage: base_damage,
                flags,
                attack_prevals,
                defend_prevals,
            },
        );
    }

    /// Handles a mover whose destination is a staircase.
    ///
    /// NPCs cannot descend; the staircase kills them. Players advance to
    /// the next depth, generating it on first visit, then the old depth is
    /// checked against the despawn strategy.
    fn handle_descent(
        &mut self,
        state: &mut GameState,
        id: EntityId,
        log: &mut Vec<GameStateUpdate>,
    ) {
        if !state.is_player(id) {
            self.remove_dead(state, id, log);
            return;
        }

        let old_depth = state
            .entity(id)
            .map(|e| e.depth())
            .expect("descending player vanished mid-resolution");
        let new_depth = old_depth + 1;

        if !state.world().contains(new_depth) {
            let dungeon = self.dungeon_gen.spawn_dungeon(new_depth, &mut self.rng);
            state.world_mut().insert(new_depth, dungeon.clone());
            self.emit(
                log,
                UpdateKind::DungeonCreated {
                    depth: new_depth,
                    dungeon,
                },
            );
        }

        let landing = {
            let dungeon = state
                .world()
                .get(new_depth)
                .expect("freshly generated level missing");
            random_free_ground(
                dungeon,
                |p| state.entity_at(new_depth, p).is_some(),
                &mut self.rng,
            )
            .expect("new level has no free floor tile")
        };
        state.move_entity(id, new_depth, landing);
        debug!(%id, old_depth, new_depth, "descent");
        self.emit(
            log,
            UpdateKind::EntityPosition {
                entity_id: id,
                depth: new_depth,
                position: landing,
                depth_changed: true,
            },
        );

        self.maybe_despawn(state, old_depth, log);
    }

    /// Despawns `depth` when the configured predicate holds. A depth
    /// containing any live entity is never despawned.
    fn maybe_despawn(
        &mut self,
        state: &mut GameState,
        depth: u32,
        log: &mut Vec<GameStateUpdate>,
    ) {
        if !state.world().contains(depth) {
            return;
        }
        let depth_of = |id: EntityId| state.entity(id).map(|e| e.depth());
        let d1 = depth_of(state.player1());
        let d2 = depth_of(state.player2());
        let despawnable = match self.despawn {
            DespawnStrategy::Unreachable => {
                d1.is_some_and(|d| d > depth) && d2.is_some_and(|d| d > depth)
            }
            DespawnStrategy::Unused => d1 != Some(depth) && d2 != Some(depth),
        };
        if despawnable && state.entities_on_depth(depth).is_empty() {
            state.world_mut().remove(depth);
            debug!(depth, "despawn level");
            self.emit(log, UpdateKind::DungeonRemoved { depth });
        }
    }

    /// Removes an entity and emits its death record.
    fn remove_dead(
        &mut self,
        state: &mut GameState,
        id: EntityId,
        log: &mut Vec<GameStateUpdate>,
    ) {
        let Some(entity) = state.remove_entity(id) else {
            return;
        };
        debug!(%id, depth = entity.depth(), "entity died");
        self.emit(
            log,
            UpdateKind::EntityDied {
                entity_id: id,
                depth: entity.depth(),
            },
        );
    }

    /// End-of-tick pass: entities whose modifiers react to [`GameEvent::Tick`]
    /// run the full three-phase protocol and emit a replayable event record.
    fn run_tick_events(&mut self, state: &mut GameState, log: &mut Vec<GameStateUpdate>) {
        for id in state.entity_ids() {
            let reacts = state.entity(id).is_some_and(|e| {
                e.modifiers().iter().any(|m| m.handles(GameEvent::Tick))
            });
            if !reacts {
                continue;
            }
            let prevals = collect_prevals(state, id, GameEvent::Tick, &mut self.rng);
            run_entity_event(state, id, GameEvent::Tick, &prevals)
                .expect("tick event on a live entity cannot fail to apply");
            self.emit(
                log,
                UpdateKind::EntityEvent {
                    entity_id: id,
                    event: GameEvent::Tick,
                    prevals,
                },
            );
        }
    }

    fn emit(&mut self, log: &mut Vec<GameStateUpdate>, kind: UpdateKind) {
        trace!(order = self.next_order, "emit record");
        log.push(GameStateUpdate::new(self.next_order, kind));
        self.next_order += 1;
    }
}

/// Coerces a move whose destination is blocked (wall or out of bounds, per
/// the entity's current dungeon) to `Stay`.
fn validated_move(state: &GameState, id: EntityId, m: Move) -> Move {
    if m.is_stay() {
        return Move::Stay;
    }
    let Some(entity) = state.entity(id) else {
        return Move::Stay;
    };
    let blocked = state
        .world()
        .get(entity.depth())
        .map_or(true, |d| d.is_blocked(entity.position() + m.delta()));
    if blocked {
        Move::Stay
    } else {
        m
    }
}
