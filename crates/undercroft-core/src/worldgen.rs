//! Dungeon and start-state generation.
//!
//! Generators are external collaborators from the engine's point of view:
//! the Updater calls [`DungeonGenerator::spawn_dungeon`] on first descent
//! to an ungenerated depth, and a [`StartGenerator`] builds the initial
//! authoritative state before the first tick. All random draws come from
//! the engine's single seeded stream, so generation is part of the
//! deterministic run.

use glam::IVec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::ConfigError;
use crate::entity::{BaseStats, Entity, EntityId};
use crate::state::GameState;
use crate::world::{Dungeon, Tile, World};

/// Produces the dungeon for a newly reached depth.
pub trait DungeonGenerator {
    /// Builds the level at `depth`, drawing any randomness from `rng`.
    fn spawn_dungeon(&mut self, depth: u32, rng: &mut ChaCha8Rng) -> Dungeon;
}

/// The simplest generator: an open room with a wall border and a single
/// randomly placed staircase.
#[derive(Debug, Clone)]
pub struct EmptyDungeonGenerator {
    width: u32,
    height: u32,
}

impl EmptyDungeonGenerator {
    /// Creates a generator for `width`×`height` levels.
    ///
    /// Dimensions below 3×3 leave no interior and are rejected.
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width < 3 || height < 3 {
            return Err(ConfigError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }
}

impl DungeonGenerator for EmptyDungeonGenerator {
    fn spawn_dungeon(&mut self, _depth: u32, rng: &mut ChaCha8Rng) -> Dungeon {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut tiles = vec![Tile::Ground; w * h];
        for x in 0..w {
            for y in 0..h {
                if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                    tiles[y * w + x] = Tile::Wall;
                }
            }
        }
        // Interior cells are all Ground at this point.
        let interior: Vec<usize> = (0..tiles.len())
            .filter(|i| tiles[*i] == Tile::Ground)
            .collect();
        let stairs = interior[rng.gen_range(0..interior.len())];
        tiles[stairs] = Tile::StaircaseDown;
        Dungeon::new(self.width, self.height, tiles)
    }
}

/// Picks a uniformly random `Ground` tile for which `occupied` is false.
///
/// Returns `None` when every floor tile is taken. Selection is uniform over
/// the free tiles (no rejection loop), so it costs exactly one draw.
pub(crate) fn random_free_ground(
    dungeon: &Dungeon,
    occupied: impl Fn(IVec2) -> bool,
    rng: &mut ChaCha8Rng,
) -> Option<IVec2> {
    let free: Vec<IVec2> = dungeon.ground_tiles().filter(|p| !occupied(*p)).collect();
    if free.is_empty() {
        None
    } else {
        Some(free[rng.gen_range(0..free.len())])
    }
}

/// Builds the initial authoritative [`GameState`]: depth 0 generated, both
/// players placed on distinct random floor tiles with ids 1 and 2.
#[derive(Debug, Clone)]
pub struct StartGenerator {
    player1_stats: BaseStats,
    player2_stats: BaseStats,
}

impl StartGenerator {
    /// A start generator with the given player stat blocks.
    #[must_use]
    pub const fn new(player1_stats: BaseStats, player2_stats: BaseStats) -> Self {
        Self {
            player1_stats,
            player2_stats,
        }
    }

    /// Generates depth 0 and places both players.
    ///
    /// # Panics
    ///
    /// Panics if the generated level has fewer than two free floor tiles;
    /// generator dimension validation makes that unreachable.
    pub fn generate(
        &self,
        dungeon_gen: &mut dyn DungeonGenerator,
        rng: &mut ChaCha8Rng,
    ) -> GameState {
        let dungeon = dungeon_gen.spawn_dungeon(0, rng);
        let p1 = EntityId::new(1);
        let p2 = EntityId::new(2);

        let p1_pos = random_free_ground(&dungeon, |_| false, rng)
            .expect("generated level has no floor");
        let p2_pos = random_free_ground(&dungeon, |p| p == p1_pos, rng)
            .expect("generated level has a single floor tile");

        let mut world = World::new();
        world.insert(0, dungeon);
        let mut state = GameState::new(p1, p2, world);
        state.add_entity(Entity::new(p1, 0, p1_pos, self.player1_stats));
        state.add_entity(Entity::new(p2, 0, p2_pos, self.player2_stats));
        state
    }
}
