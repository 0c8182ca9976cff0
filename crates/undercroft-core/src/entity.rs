//! Entities: the mobile actors of the simulation.
//!
//! Every entity has a stable [`EntityId`], a depth + grid position, current
//! health, base combat stats, an owned list of [`Modifier`]s, and an
//! inventory. Effective combat stats are *derived*: base stats plus the sum
//! of every attached modifier's flat deltas, recomputed at the top of every
//! tick. The derived values are a cache, not state — they are skipped by
//! serialization and ignored by equality.

use std::collections::BTreeMap;
use std::fmt;

use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::modifier::Modifier;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an entity, stable for the entity's lifetime.
///
/// Ids `1` and `2` are reserved for player 1 and player 2 by the start
/// generator.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an entity id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Intrinsic combat stats, before modifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    /// Health ceiling.
    pub max_health: i32,
    /// Outgoing damage before the defender's armor.
    pub damage: i32,
    /// Flat reduction applied to incoming base damage.
    pub armor: i32,
}

impl BaseStats {
    /// Creates a stat block.
    #[must_use]
    pub const fn new(max_health: i32, damage: i32, armor: i32) -> Self {
        Self {
            max_health,
            damage,
            armor,
        }
    }
}

/// Effective combat stats for the current tick: base plus the flat deltas
/// of every attached modifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DerivedStats {
    /// Effective health ceiling.
    pub max_health: i32,
    /// Effective outgoing damage.
    pub damage: i32,
    /// Effective armor.
    pub armor: i32,
}

// ============================================================================
// Entity
// ============================================================================

/// One actor in the world.
///
/// Modifiers are owned exclusively: cloning an entity deep-copies its
/// modifier list, it is never shared.
///
/// # Example
///
/// ```
/// use undercroft_core::entity::{BaseStats, Entity, EntityId};
/// use glam::IVec2;
///
/// let mut e = Entity::new(EntityId::new(7), 0, IVec2::new(2, 3), BaseStats::new(10, 3, 1));
/// e.refresh_derived();
/// assert_eq!(e.derived().damage, 3);
/// assert_eq!(e.health(), 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    depth: u32,
    position: IVec2,
    health: i32,
    base: BaseStats,
    modifiers: Vec<Modifier>,
    #[serde(default)]
    items: BTreeMap<u8, Item>,
    /// Per-tick cache; `None` until [`Entity::refresh_derived`] runs.
    #[serde(skip)]
    derived: Option<DerivedStats>,
}

impl Entity {
    /// Creates an entity at full health with no modifiers or items.
    ///
    /// Derived stats are unset until the first [`Entity::refresh_derived`].
    #[must_use]
    pub fn new(id: EntityId, depth: u32, position: IVec2, base: BaseStats) -> Self {
        Self {
            id,
            depth,
            position,
            health: base.max_health,
            base,
            modifiers: Vec::new(),
            items: BTreeMap::new(),
            derived: None,
        }
    }

    /// Stable identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Depth of the level the entity stands on.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Grid position within its level.
    #[must_use]
    pub const fn position(&self) -> IVec2 {
        self.position
    }

    /// Current health. May be ≤ 0 for a player whose match just ended.
    #[must_use]
    pub const fn health(&self) -> i32 {
        self.health
    }

    /// Intrinsic stats before modifiers.
    #[must_use]
    pub const fn base(&self) -> BaseStats {
        self.base
    }

    /// Attached modifiers, in attachment order.
    #[must_use]
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// Inventory slots.
    #[must_use]
    pub const fn items(&self) -> &BTreeMap<u8, Item> {
        &self.items
    }

    /// Effective stats for the current tick.
    ///
    /// # Panics
    ///
    /// Panics if called before [`Entity::refresh_derived`] this tick. A read
    /// of stale derived stats is an engine bug, never recoverable input.
    #[must_use]
    pub fn derived(&self) -> DerivedStats {
        self.derived
            .expect("derived stats read before per-tick refresh")
    }

    /// Recomputes the derived stat cache: base plus each modifier's flat
    /// deltas, in attachment order.
    pub fn refresh_derived(&mut self) {
        let mut d = DerivedStats {
            max_health: self.base.max_health,
            damage: self.base.damage,
            armor: self.base.armor,
        };
        for m in &self.modifiers {
            d.max_health += m.flat_max_health();
            d.damage += m.flat_damage();
            d.armor += m.flat_armor();
        }
        self.derived = Some(d);
    }

    /// Attaches a modifier at the end of the attachment list.
    ///
    /// Invalidates the derived cache: stats must be refreshed before the
    /// next combat read.
    pub fn attach_modifier(&mut self, modifier: Modifier) {
        self.modifiers.push(modifier);
        self.derived = None;
    }

    /// Detaches the modifier at `index`, returning it.
    ///
    /// Returns `None` if `index` is out of range.
    pub fn detach_modifier(&mut self, index: usize) -> Option<Modifier> {
        if index >= self.modifiers.len() {
            return None;
        }
        self.derived = None;
        Some(self.modifiers.remove(index))
    }

    /// Places `item` into `slot`, returning the previous occupant.
    pub fn store_item(&mut self, slot: u8, item: Item) -> Option<Item> {
        self.items.insert(slot, item)
    }

    /// Applies a signed health delta. Positive heals, negative damages.
    /// Healing never exceeds `cap`.
    pub fn apply_health_delta(&mut self, delta: i32, cap: i32) {
        self.health = (self.health + delta).min(cap);
    }

    /// Subtracts `damage` from health. No floor; health may go negative.
    pub fn take_damage(&mut self, damage: i32) {
        self.health -= damage;
    }

    pub(crate) fn set_position(&mut self, depth: u32, position: IVec2) {
        self.depth = depth;
        self.position = position;
    }
}

// Equality ignores the derived cache so that a replayed state (whose caches
// may be unset or refreshed at different points) compares equal to the
// authoritative one.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.depth == other.depth
            && self.position == other.position
            && self.health == other.health
            && self.base == other.base
            && self.modifiers == other.modifiers
            && self.items == other.items
    }
}
