//! Shared builders for the engine test suite.

use std::collections::BTreeMap;

use glam::IVec2;

use crate::config::{DespawnStrategy, EngineConfig};
use crate::entity::{BaseStats, Entity, EntityId};
use crate::moves::Move;
use crate::state::GameState;
use crate::update::GameStateUpdate;
use crate::updater::{IdleController, NpcController, Updater};
use crate::world::{Dungeon, Tile, World};
use crate::worldgen::EmptyDungeonGenerator;

/// Engine with default config (Unreachable despawn, no tick cutoff),
/// idle NPCs, and 6×6 generated levels.
pub(crate) fn engine(seed: u64) -> Updater {
    engine_custom(seed, DespawnStrategy::Unreachable, Box::new(IdleController))
}

pub(crate) fn engine_custom(
    seed: u64,
    despawn: DespawnStrategy,
    npcs: Box<dyn NpcController>,
) -> Updater {
    Updater::new(
        EngineConfig {
            seed,
            despawn,
            max_ticks: None,
        },
        Box::new(EmptyDungeonGenerator::new(6, 6).unwrap()),
        npcs,
    )
}

/// Authoritative duel state on `dungeon` at depth 0: player 1 at (1,1)
/// with 10hp/3dmg/0armor, player 2 at (2,1) with 10hp/2dmg/1armor.
pub(crate) fn duel_on(dungeon: Dungeon) -> GameState {
    let mut world = World::new();
    world.insert(0, dungeon);
    let p1 = EntityId::new(1);
    let p2 = EntityId::new(2);
    let mut state = GameState::new(p1, p2, world);
    state.add_entity(Entity::new(p1, 0, IVec2::new(1, 1), BaseStats::new(10, 3, 0)));
    state.add_entity(Entity::new(p2, 0, IVec2::new(2, 1), BaseStats::new(10, 2, 1)));
    state
}

/// Duel on an `n`×`n` bordered room with no staircase.
pub(crate) fn duel(n: u32) -> GameState {
    duel_on(Dungeon::bordered_room(n, n))
}

/// Bordered `n`×`n` room with a staircase at `stairs`.
pub(crate) fn staircase_room(n: u32, stairs: IVec2) -> Dungeon {
    let size = n as usize;
    let mut tiles = vec![Tile::Ground; size * size];
    for x in 0..size {
        for y in 0..size {
            if x == 0 || y == 0 || x == size - 1 || y == size - 1 {
                tiles[y * size + x] = Tile::Wall;
            }
        }
    }
    tiles[stairs.y as usize * size + stairs.x as usize] = Tile::StaircaseDown;
    Dungeon::new(n, n, tiles)
}

/// Adds an NPC with 5hp/1dmg/0armor at `pos` on depth 0.
pub(crate) fn add_npc(state: &mut GameState, id: u64, pos: IVec2) -> EntityId {
    let id = EntityId::new(id);
    state.add_entity(Entity::new(id, 0, pos, BaseStats::new(5, 1, 0)));
    id
}

/// NPC controller replaying a fixed move per entity; unscripted NPCs stay.
pub(crate) struct ScriptedController {
    moves: BTreeMap<EntityId, Move>,
}

impl ScriptedController {
    pub(crate) fn new(moves: impl IntoIterator<Item = (EntityId, Move)>) -> Self {
        Self {
            moves: moves.into_iter().collect(),
        }
    }
}

impl NpcController for ScriptedController {
    fn decide(&mut self, _state: &GameState, id: EntityId) -> Move {
        self.moves.get(&id).copied().unwrap_or(Move::Stay)
    }
}

/// Replays a tick's record log onto a copy of the pre-tick state, then
/// advances the tick (driven by the tick-end packet in production).
pub(crate) fn replay(pre_tick: &GameState, log: &[GameStateUpdate]) -> GameState {
    let mut state = pre_tick.clone();
    for record in log {
        record
            .apply(&mut state)
            .unwrap_or_else(|e| panic!("replay desync at order {}: {e}", record.order()));
    }
    state.advance_tick();
    state
}
