//! The authoritative game snapshot and its lookup indices.
//!
//! [`GameState`] owns the world, the entity store (the identity index) and
//! a position index keyed by `(depth, x, y)`. Exactly one entity may occupy
//! a cell. All mutation goes through [`GameState::add_entity`],
//! [`GameState::remove_entity`] and [`GameState::move_entity`], which update
//! both indices atomically; an index mismatch is state corruption — an
//! engine bug, not recoverable input — and fails an assertion.
//!
//! A state is either `authoritative` (the server's full snapshot) or a view
//! (client/spectator copy restricted to what that viewer can see). Only an
//! authoritative state may be handed to the Updater.

use std::collections::BTreeMap;

use glam::IVec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::entity::{Entity, EntityId};
use crate::world::World;

type CellKey = (u32, i32, i32);

const fn cell_key(depth: u32, p: IVec2) -> CellKey {
    (depth, p.x, p.y)
}

/// Full simulation state at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GameStateRepr", into = "GameStateRepr")]
pub struct GameState {
    authoritative: bool,
    tick: u64,
    player1: EntityId,
    player2: EntityId,
    world: World,
    entities: BTreeMap<EntityId, Entity>,
    position_index: BTreeMap<CellKey, EntityId>,
}

impl GameState {
    /// Creates an empty authoritative state at tick 0.
    ///
    /// Entities (including the two players) are added afterwards via
    /// [`GameState::add_entity`].
    #[must_use]
    pub fn new(player1: EntityId, player2: EntityId, world: World) -> Self {
        Self {
            authoritative: true,
            tick: 0,
            player1,
            player2,
            world,
            entities: BTreeMap::new(),
            position_index: BTreeMap::new(),
        }
    }

    /// Whether this is the server's full snapshot.
    #[must_use]
    pub const fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Current tick number.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Player 1's entity id.
    #[must_use]
    pub const fn player1(&self) -> EntityId {
        self.player1
    }

    /// Player 2's entity id.
    #[must_use]
    pub const fn player2(&self) -> EntityId {
        self.player2
    }

    /// Returns `true` if `id` belongs to either player.
    #[must_use]
    pub fn is_player(&self, id: EntityId) -> bool {
        id == self.player1 || id == self.player2
    }

    /// The dungeon levels.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the levels, for generation and despawn.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Advances the tick counter by one.
    ///
    /// On replaying sides this is driven by the tick-end packet, not by an
    /// update record.
    pub fn advance_tick(&mut self) {
        self.tick += 1;
    }

    // ========================================================================
    // Entity access
    // ========================================================================

    /// Looks up an entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Looks up an entity by id, mutably.
    ///
    /// Position and depth cannot be changed through this handle; use
    /// [`GameState::move_entity`] so the position index stays in sync.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// The entity occupying `(depth, position)`, if any.
    #[must_use]
    pub fn entity_at(&self, depth: u32, position: IVec2) -> Option<EntityId> {
        self.position_index.get(&cell_key(depth, position)).copied()
    }

    /// Iterates all entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All entity ids, ascending. Deterministic iteration order.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Ids of entities standing on `depth`, ascending.
    #[must_use]
    pub fn entities_on_depth(&self, depth: u32) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.depth() == depth)
            .map(Entity::id)
            .collect()
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Recomputes every entity's derived stat cache. Runs at the top of
    /// each tick before any combat math.
    pub fn refresh_all_derived(&mut self) {
        for e in self.entities.values_mut() {
            e.refresh_derived();
        }
    }

    // ========================================================================
    // Entity mutation (index-preserving)
    // ========================================================================

    /// Inserts a new entity, registering it in both indices.
    ///
    /// # Panics
    ///
    /// Panics if the id is already present or the target cell is occupied —
    /// callers must have validated spawn placement.
    pub fn add_entity(&mut self, entity: Entity) {
        let id = entity.id();
        let key = cell_key(entity.depth(), entity.position());
        trace!(%id, depth = entity.depth(), "add entity");
        let prev_cell = self.position_index.insert(key, id);
        assert!(prev_cell.is_none(), "spawn cell already occupied: {key:?}");
        let prev = self.entities.insert(id, entity);
        assert!(prev.is_none(), "duplicate entity id {id}");
    }

    /// Removes an entity, clearing it from both indices.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        trace!(%id, "remove entity");
        let key = cell_key(entity.depth(), entity.position());
        let indexed = self.position_index.remove(&key);
        assert_eq!(
            indexed,
            Some(id),
            "position index out of sync while removing {id}"
        );
        Some(entity)
    }

    /// Moves an entity to a new cell (possibly on another depth), keeping
    /// both indices in sync.
    ///
    /// # Panics
    ///
    /// Panics if the destination cell is occupied or the indices disagree —
    /// callers resolve occupancy before moving.
    pub fn move_entity(&mut self, id: EntityId, depth: u32, position: IVec2) {
        let entity = self
            .entities
            .get_mut(&id)
            .unwrap_or_else(|| panic!("moving unknown entity {id}"));
        let old_key = cell_key(entity.depth(), entity.position());
        entity.set_position(depth, position);
        trace!(%id, depth, x = position.x, y = position.y, "move entity");

        let indexed = self.position_index.remove(&old_key);
        assert_eq!(
            indexed,
            Some(id),
            "position index out of sync while moving {id}"
        );
        let prev = self.position_index.insert(cell_key(depth, position), id);
        assert!(
            prev.is_none(),
            "destination cell occupied while moving {id}"
        );
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Builds a non-authoritative view for a player looking at `depth`:
    /// only that level and the entities standing on it.
    #[must_use]
    pub fn view_for(&self, depth: u32) -> Self {
        let mut view = Self {
            authoritative: false,
            tick: self.tick,
            player1: self.player1,
            player2: self.player2,
            world: self.world.restricted_to(depth),
            entities: BTreeMap::new(),
            position_index: BTreeMap::new(),
        };
        for e in self.entities.values().filter(|e| e.depth() == depth) {
            view.add_entity(e.clone());
        }
        view
    }

    /// Builds a non-authoritative full copy for spectators, who receive
    /// the unfiltered update feed.
    #[must_use]
    pub fn view_spec(&self) -> Self {
        let mut view = self.clone();
        view.authoritative = false;
        view
    }

    /// Verifies that every entity appears in both indices and no stale
    /// entries remain. Test hook for the index invariant.
    #[must_use]
    pub fn index_consistent(&self) -> bool {
        if self.entities.len() != self.position_index.len() {
            return false;
        }
        self.entities.iter().all(|(id, e)| {
            e.id() == *id
                && self.position_index.get(&cell_key(e.depth(), e.position())) == Some(id)
        })
    }
}

// ============================================================================
// Serde representation
// ============================================================================

// The position index's tuple keys have no JSON map encoding, and the index
// is derivable; the wire shape carries a flat entity list and both indices
// are rebuilt on decode.
#[derive(Serialize, Deserialize)]
struct GameStateRepr {
    authoritative: bool,
    tick: u64,
    player1: EntityId,
    player2: EntityId,
    world: World,
    entities: Vec<Entity>,
}

impl From<GameState> for GameStateRepr {
    fn from(s: GameState) -> Self {
        Self {
            authoritative: s.authoritative,
            tick: s.tick,
            player1: s.player1,
            player2: s.player2,
            world: s.world,
            entities: s.entities.into_values().collect(),
        }
    }
}

impl From<GameStateRepr> for GameState {
    fn from(r: GameStateRepr) -> Self {
        let mut state = GameState {
            authoritative: r.authoritative,
            tick: r.tick,
            player1: r.player1,
            player2: r.player2,
            world: r.world,
            entities: BTreeMap::new(),
            position_index: BTreeMap::new(),
        };
        for e in r.entities {
            state.add_entity(e);
        }
        state
    }
}

// ============================================================================
// Test support
// ============================================================================
