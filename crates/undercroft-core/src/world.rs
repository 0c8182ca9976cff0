//! Static world geometry: stacked dungeon levels and their tiles.
//!
//! The [`World`] owns a mapping from depth to [`Dungeon`]. Depth 0 is the
//! shallowest level. The mapping may be partially loaded: an absent entry
//! means the level has not been generated yet, or has been despawned by the
//! Updater's despawn strategy.
//!
//! Dungeons are immutable after creation. Tile data never changes during
//! gameplay, so replication only ever needs to ship a dungeon once.
//!
//! # Example
//!
//! ```
//! use undercroft_core::world::{Dungeon, Tile, World};
//! use glam::IVec2;
//!
//! let dungeon = Dungeon::bordered_room(5, 4);
//! assert!(dungeon.is_blocked(IVec2::new(0, 0)));   // border wall
//! assert!(!dungeon.is_blocked(IVec2::new(2, 2)));  // open floor
//! assert!(dungeon.is_blocked(IVec2::new(-1, 2)));  // out of bounds
//!
//! let mut world = World::new();
//! world.insert(0, dungeon);
//! assert!(world.contains(0));
//! assert!(!world.contains(1));
//! ```

use std::collections::BTreeMap;

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// A single tile on a dungeon grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tile {
    /// Open floor that entities can stand on.
    Ground,
    /// Impassable wall. Moves into walls are coerced to `Stay`.
    Wall,
    /// Descends to the next depth. Lethal to non-player entities.
    StaircaseDown,
}

/// The grid for one level of the world.
///
/// A dungeon is a `width x height` grid of [`Tile`]s, indexed by `(x, y)`
/// with `(0, 0)` in the top-left corner. The grid is fixed at creation time.
///
/// # Invariants
///
/// - `tiles.len() == width * height`
/// - Out-of-bounds coordinates and `Wall` tiles are always blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dungeon {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl Dungeon {
    /// Creates a dungeon from a flat tile buffer in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `tiles.len() != width * height`.
    #[must_use]
    pub fn new(width: u32, height: u32, tiles: Vec<Tile>) -> Self {
        assert_eq!(
            tiles.len(),
            (width as usize) * (height as usize),
            "dungeon tile buffer does not match {width}x{height} grid"
        );
        Self {
            width,
            height,
            tiles,
        }
    }

    /// Creates an open room of `Ground` surrounded by a one-tile `Wall`
    /// border. No staircase is placed; see
    /// [`EmptyDungeonGenerator`](crate::worldgen::EmptyDungeonGenerator)
    /// for the gameplay variant.
    #[must_use]
    pub fn bordered_room(width: u32, height: u32) -> Self {
        let mut tiles = vec![Tile::Ground; (width as usize) * (height as usize)];
        for x in 0..width {
            for y in 0..height {
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    tiles[(y * width + x) as usize] = Tile::Wall;
                }
            }
        }
        Self {
            width,
            height,
            tiles,
        }
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns the tile at `p`, or `None` when `p` is out of bounds.
    #[must_use]
    pub fn tile_at(&self, p: IVec2) -> Option<Tile> {
        if p.x < 0 || p.y < 0 || p.x >= self.width as i32 || p.y >= self.height as i32 {
            return None;
        }
        let idx = (p.y as usize) * (self.width as usize) + (p.x as usize);
        Some(self.tiles[idx])
    }

    /// Returns `true` if `p` is outside the grid or a `Wall`.
    ///
    /// Staircases are not blocked; they trigger descent handling instead.
    #[must_use]
    pub fn is_blocked(&self, p: IVec2) -> bool {
        !matches!(self.tile_at(p), Some(Tile::Ground | Tile::StaircaseDown))
    }

    /// Returns `true` if `p` is a `StaircaseDown` tile.
    #[must_use]
    pub fn is_staircase(&self, p: IVec2) -> bool {
        matches!(self.tile_at(p), Some(Tile::StaircaseDown))
    }

    /// Iterates the coordinates of all `Ground` tiles in row-major order.
    ///
    /// Row-major order keeps downstream random tile selection deterministic
    /// for a given RNG stream.
    pub fn ground_tiles(&self) -> impl Iterator<Item = IVec2> + '_ {
        let width = self.width as i32;
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| **tile == Tile::Ground)
            .map(move |(idx, _)| IVec2::new(idx as i32 % width, idx as i32 / width))
    }
}

/// The collection of dungeon levels, keyed by depth.
///
/// Levels are generated lazily on first descent and may later be despawned,
/// so lookups return `Option`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    dungeons: BTreeMap<u32, Dungeon>,
}

impl World {
    /// Creates an empty world with no generated levels.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dungeons: BTreeMap::new(),
        }
    }

    /// Returns the dungeon at `depth`, if generated.
    #[must_use]
    pub fn get(&self, depth: u32) -> Option<&Dungeon> {
        self.dungeons.get(&depth)
    }

    /// Returns `true` if a dungeon exists at `depth`.
    #[must_use]
    pub fn contains(&self, depth: u32) -> bool {
        self.dungeons.contains_key(&depth)
    }

    /// Stores `dungeon` at `depth`, replacing any previous level.
    pub fn insert(&mut self, depth: u32, dungeon: Dungeon) {
        self.dungeons.insert(depth, dungeon);
    }

    /// Removes and returns the dungeon at `depth`.
    pub fn remove(&mut self, depth: u32) -> Option<Dungeon> {
        self.dungeons.remove(&depth)
    }

    /// Iterates generated depths in ascending order.
    pub fn depths(&self) -> impl Iterator<Item = u32> + '_ {
        self.dungeons.keys().copied()
    }

    /// Builds a copy of this world containing only the level at `depth`.
    ///
    /// Used when constructing partial views for players, who only see the
    /// level they currently stand on.
    #[must_use]
    pub fn restricted_to(&self, depth: u32) -> Self {
        let mut dungeons = BTreeMap::new();
        if let Some(d) = self.dungeons.get(&depth) {
            dungeons.insert(depth, d.clone());
        }
        Self { dungeons }
    }

    /// Number of generated levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.dungeons.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod dungeon_tests {
        use super::*;

        #[test]
        fn bordered_room_has_wall_border() {
            let d = Dungeon::bordered_room(4, 3);
            assert_eq!(d.tile_at(IVec2::new(0, 0)), Some(Tile::Wall));
            assert_eq!(d.tile_at(IVec2::new(3, 2)), Some(Tile::Wall));
            assert_eq!(d.tile_at(IVec2::new(1, 1)), Some(Tile::Ground));
            assert_eq!(d.tile_at(IVec2::new(2, 1)), Some(Tile::Ground));
        }

        #[test]
        fn out_of_bounds_is_blocked() {
            let d = Dungeon::bordered_room(4, 3);
            assert!(d.is_blocked(IVec2::new(-1, 1)));
            assert!(d.is_blocked(IVec2::new(1, -1)));
            assert!(d.is_blocked(IVec2::new(4, 1)));
            assert!(d.is_blocked(IVec2::new(1, 3)));
        }

        #[test]
        fn staircase_is_not_blocked() {
            let mut tiles = vec![Tile::Ground; 9];
            tiles[4] = Tile::StaircaseDown;
            let d = Dungeon::new(3, 3, tiles);
            assert!(!d.is_blocked(IVec2::new(1, 1)));
            assert!(d.is_staircase(IVec2::new(1, 1)));
        }

        #[test]
        #[should_panic(expected = "tile buffer")]
        fn mismatched_buffer_panics() {
            let _ = Dungeon::new(3, 3, vec![Tile::Ground; 8]);
        }

        #[test]
        fn ground_tiles_are_row_major() {
            let d = Dungeon::bordered_room(4, 3);
            let tiles: Vec<_> = d.ground_tiles().collect();
            assert_eq!(tiles, vec![IVec2::new(1, 1), IVec2::new(2, 1)]);
        }

        #[test]
        fn serialization_roundtrip() {
            let d = Dungeon::bordered_room(5, 4);
            let json = serde_json::to_string(&d).unwrap();
            let back: Dungeon = serde_json::from_str(&json).unwrap();
            assert_eq!(d, back);
        }
    }

    mod world_tests {
        use super::*;

        #[test]
        fn insert_and_lookup() {
            let mut w = World::new();
            assert!(!w.contains(0));
            w.insert(0, Dungeon::bordered_room(4, 4));
            assert!(w.contains(0));
            assert_eq!(w.get(0).unwrap().width(), 4);
        }

        #[test]
        fn remove_despawns_level() {
            let mut w = World::new();
            w.insert(2, Dungeon::bordered_room(4, 4));
            assert!(w.remove(2).is_some());
            assert!(!w.contains(2));
            assert!(w.remove(2).is_none());
        }

        #[test]
        fn restricted_to_keeps_single_level() {
            let mut w = World::new();
            w.insert(0, Dungeon::bordered_room(4, 4));
            w.insert(1, Dungeon::bordered_room(5, 5));
            let view = w.restricted_to(1);
            assert!(!view.contains(0));
            assert!(view.contains(1));
            assert_eq!(view.level_count(), 1);
        }

        #[test]
        fn depths_iterate_in_order() {
            let mut w = World::new();
            w.insert(3, Dungeon::bordered_room(4, 4));
            w.insert(1, Dungeon::bordered_room(4, 4));
            assert_eq!(w.depths().collect::<Vec<_>>(), vec![1, 3]);
        }
    }
}
