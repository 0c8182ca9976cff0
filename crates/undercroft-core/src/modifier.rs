//! The three-phase modifier event protocol.
//!
//! Modifiers are per-entity effects that contribute flat stat deltas and
//! may react to game events. The protocol guarantees that the server and
//! every replaying client reach the identical numeric outcome:
//!
//! 1. **pre** — server-only. The only phase allowed to draw randomness.
//!    Its result is a serializable [`PreVal`] shipped inside the update
//!    record.
//! 2. **on** — deterministic given the preval. The only phase allowed to
//!    mutate the [`AttackResult`] accumulator or game state.
//! 3. **post** — deterministic, informational. Runs with the result
//!    already fixed.
//!
//! For combat, phases interleave across both participants: all attacker
//! `on`, then all defender `on`, then all attacker `post`, then all
//! defender `post` (pre for both sides completes on the server before any
//! `on` runs anywhere). Within one entity, modifiers run in attachment
//! order, and each modifier's preval sits at the same index as the
//! modifier itself.
//!
//! The drivers at the bottom of this module ([`resolve_combat_outcome`],
//! [`run_entity_event`]) are shared between server-side tick resolution and
//! update-record replay, which is what makes replayed damage exact.

use bitflags::bitflags;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::state::GameState;
use crate::update::ApplyError;

// ============================================================================
// Events and flags
// ============================================================================

/// The closed set of events modifiers can react to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameEvent {
    /// The owning entity is attacking. Carries an [`AttackResult`].
    ParentAttack,
    /// The owning entity is defending. Carries an [`AttackResult`].
    ParentDefend,
    /// End-of-tick upkeep. No accumulator.
    Tick,
}

bitflags! {
    /// Tags describing how a combat engagement occurred.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CombatFlags: u8 {
        /// The defender stood still and absorbed the attack.
        const BLOCK = 1;
        /// The defender had already resolved onto the contested cell.
        const AMBUSH = 1 << 1;
        /// The defender intended to move away but was caught engaged.
        const FLEE = 1 << 2;
        /// Both combatants tried to swap cells.
        const PARRY = 1 << 3;
    }
}

/// The serialized output of a modifier's pre phase.
///
/// One preval per modifier, in attachment order, including
/// [`PreVal::None`] for modifiers that ignore the event. Keeping the
/// vector index-aligned with the modifier list lets replay hand each
/// modifier exactly the draw it saw on the server.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreVal {
    /// The modifier drew nothing for this event.
    None,
    /// A percentile roll outcome.
    Roll {
        /// Whether the roll succeeded.
        hit: bool,
    },
}

// ============================================================================
// Attack accumulator
// ============================================================================

/// The mutable outcome of one combat engagement.
///
/// Built from the base damage (attacker's derived damage minus defender's
/// derived armor, possibly ≤ 0) and the engagement tags, then threaded by
/// `&mut` through the `on` phase only. After the `on` phase the value is
/// final; `post` handlers observe it read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackResult {
    damage: i32,
    flags: CombatFlags,
}

impl AttackResult {
    /// Starts an accumulator from base damage and engagement tags.
    #[must_use]
    pub const fn new(damage: i32, flags: CombatFlags) -> Self {
        Self { damage, flags }
    }

    /// Current damage value. Applied to the defender only if positive once
    /// the `on` phase completes.
    #[must_use]
    pub const fn damage(&self) -> i32 {
        self.damage
    }

    /// Engagement tags.
    #[must_use]
    pub const fn flags(&self) -> CombatFlags {
        self.flags
    }

    /// Adds a signed delta to the damage. `on` phase only.
    pub fn adjust_damage(&mut self, delta: i32) {
        self.damage += delta;
    }

    /// Adds engagement tags. `on` phase only.
    pub fn add_flags(&mut self, flags: CombatFlags) {
        self.flags |= flags;
    }
}

// ============================================================================
// Modifiers
// ============================================================================

/// Behavior variants for [`Modifier`].
///
/// A closed set: every participant ships the same variants, so replaying a
/// preval through the same variant is guaranteed to reproduce the server's
/// arithmetic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Stat deltas only; reacts to no events.
    Inert,
    /// Rolls a percentile die in the pre phase of the owner's attacks;
    /// on a hit, adds bonus damage in the `on` phase.
    LuckyStrike {
        /// Success chance in percent, 0..=100.
        chance_pct: u8,
        /// Damage added on a successful roll.
        bonus_damage: i32,
    },
    /// Reduces incoming damage when the engagement carries
    /// [`CombatFlags::BLOCK`]. Fully deterministic.
    Bulwark {
        /// Flat damage reduction while blocking.
        reduction: i32,
    },
    /// Heals the owner at end of tick, up to derived max health.
    Regrowth {
        /// Health restored per tick.
        heal_per_tick: i32,
    },
}

/// A per-entity effect: flat stat deltas plus an optional event reaction.
///
/// Modifiers are owned by exactly one entity and copied, never shared,
/// when the entity is cloned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    kind: ModifierKind,
    flat_max_health: i32,
    flat_damage: i32,
    flat_armor: i32,
}

impl Modifier {
    /// Creates a modifier with explicit stat deltas and behavior.
    #[must_use]
    pub const fn new(
        kind: ModifierKind,
        flat_max_health: i32,
        flat_damage: i32,
        flat_armor: i32,
    ) -> Self {
        Self {
            kind,
            flat_max_health,
            flat_damage,
            flat_armor,
        }
    }

    /// Pure stat-delta modifier with no event behavior.
    #[must_use]
    pub const fn inert(flat_max_health: i32, flat_damage: i32, flat_armor: i32) -> Self {
        Self::new(ModifierKind::Inert, flat_max_health, flat_damage, flat_armor)
    }

    /// Chance-based bonus damage on the owner's attacks.
    #[must_use]
    pub const fn lucky_strike(chance_pct: u8, bonus_damage: i32) -> Self {
        Self::new(
            ModifierKind::LuckyStrike {
                chance_pct,
                bonus_damage,
            },
            0,
            0,
            0,
        )
    }

    /// Flat damage reduction while blocking.
    #[must_use]
    pub const fn bulwark(reduction: i32) -> Self {
        Self::new(ModifierKind::Bulwark { reduction }, 0, 0, 0)
    }

    /// End-of-tick regeneration.
    #[must_use]
    pub const fn regrowth(heal_per_tick: i32) -> Self {
        Self::new(ModifierKind::Regrowth { heal_per_tick }, 0, 0, 0)
    }

    /// Behavior variant.
    #[must_use]
    pub const fn kind(&self) -> ModifierKind {
        self.kind
    }

    /// Flat max-health delta.
    #[must_use]
    pub const fn flat_max_health(&self) -> i32 {
        self.flat_max_health
    }

    /// Flat damage delta.
    #[must_use]
    pub const fn flat_damage(&self) -> i32 {
        self.flat_damage
    }

    /// Flat armor delta.
    #[must_use]
    pub const fn flat_armor(&self) -> i32 {
        self.flat_armor
    }

    /// Whether this modifier reacts to `event`.
    ///
    /// Purely an optimization hint: skipping a modifier for which this
    /// returns `false` must be indistinguishable from running its no-op
    /// phases.
    #[must_use]
    pub fn handles(&self, event: GameEvent) -> bool {
        matches!(
            (self.kind, event),
            (ModifierKind::LuckyStrike { .. }, GameEvent::ParentAttack)
                | (ModifierKind::Bulwark { .. }, GameEvent::ParentDefend)
                | (ModifierKind::Regrowth { .. }, GameEvent::Tick)
        )
    }

    /// Pre phase: captures all nondeterminism the later phases need.
    ///
    /// Runs only on the authoritative side; the returned [`PreVal`] is
    /// shipped to every replaying participant.
    pub fn pre_event(&self, event: GameEvent, _state: &GameState, rng: &mut ChaCha8Rng) -> PreVal {
        match (self.kind, event) {
            (ModifierKind::LuckyStrike { chance_pct, .. }, GameEvent::ParentAttack) => {
                PreVal::Roll {
                    hit: rng.gen_range(0..100_u8) < chance_pct,
                }
            }
            _ => PreVal::None,
        }
    }

    /// On phase: deterministic given the preval. The only phase permitted
    /// to mutate the accumulator or game state.
    ///
    /// For combat events `other` is the counterparty: the defender when
    /// the owner attacks, the attacker when the owner defends.
    pub fn on_event(
        &self,
        event: GameEvent,
        state: &mut GameState,
        owner: EntityId,
        _other: Option<EntityId>,
        result: Option<&mut AttackResult>,
        preval: PreVal,
    ) {
        match (self.kind, event) {
            (ModifierKind::LuckyStrike { bonus_damage, .. }, GameEvent::ParentAttack) => {
                if let (PreVal::Roll { hit: true }, Some(result)) = (preval, result) {
                    result.adjust_damage(bonus_damage);
                }
            }
            (ModifierKind::Bulwark { reduction }, GameEvent::ParentDefend) => {
                if let Some(result) = result {
                    if result.flags().contains(CombatFlags::BLOCK) {
                        result.adjust_damage(-reduction);
                    }
                }
            }
            (ModifierKind::Regrowth { heal_per_tick }, GameEvent::Tick) => {
                if let Some(e) = state.entity_mut(owner) {
                    let cap = e.derived().max_health;
                    e.apply_health_delta(heal_per_tick, cap);
                }
            }
            _ => {}
        }
    }

    /// Post phase: informational only; the result is already fixed.
    pub fn post_event(
        &self,
        _event: GameEvent,
        _state: &mut GameState,
        _owner: EntityId,
        _other: Option<EntityId>,
        _result: Option<&AttackResult>,
        _preval: PreVal,
    ) {
        // None of the current variants carry post-phase behavior; the
        // driver still walks them so adding one cannot change ordering.
    }
}

// ============================================================================
// Phase drivers
// ============================================================================

/// Runs the pre phase for every modifier on `id`, in attachment order.
///
/// Returns one [`PreVal`] per modifier, index-aligned with the modifier
/// list. Authoritative side only.
pub(crate) fn collect_prevals(
    state: &GameState,
    id: EntityId,
    event: GameEvent,
    rng: &mut ChaCha8Rng,
) -> Vec<PreVal> {
    match state.entity(id) {
        Some(e) => e
            .modifiers()
            .iter()
            .map(|m| m.pre_event(event, state, rng))
            .collect(),
        None => Vec::new(),
    }
}

fn prevals_for<'a>(
    modifiers: &[Modifier],
    prevals: &'a [PreVal],
    id: EntityId,
) -> Result<&'a [PreVal], ApplyError> {
    if modifiers.len() == prevals.len() {
        Ok(prevals)
    } else {
        Err(ApplyError::PrevalMismatch { id })
    }
}

/// Resolves one combat engagement from its prevals.
///
/// Used by the server immediately after detecting a combat case, and again
/// by every recipient replaying the combat record — both paths run this
/// exact function, so the final damage is identical everywhere.
///
/// `base_damage` is the original value (attacker derived damage minus
/// defender derived armor); the final value is recomputed here from the
/// prevals and applied to the defender's health when positive.
pub(crate) fn resolve_combat_outcome(
    state: &mut GameState,
    attacker: EntityId,
    defender: EntityId,
    base_damage: i32,
    flags: CombatFlags,
    attack_prevals: &[PreVal],
    defend_prevals: &[PreVal],
) -> Result<AttackResult, ApplyError> {
    // Refresh both caches so Tick-independent replay paths are safe, then
    // snapshot the modifier lists: handlers may mutate entities mid-phase.
    let attack_mods = {
        let e = state
            .entity_mut(attacker)
            .ok_or(ApplyError::UnknownEntity { id: attacker })?;
        e.refresh_derived();
        e.modifiers().to_vec()
    };
    let defend_mods = {
        let e = state
            .entity_mut(defender)
            .ok_or(ApplyError::UnknownEntity { id: defender })?;
        e.refresh_derived();
        e.modifiers().to_vec()
    };
    let attack_prevals = prevals_for(&attack_mods, attack_prevals, attacker)?;
    let defend_prevals = prevals_for(&defend_mods, defend_prevals, defender)?;

    let mut result = AttackResult::new(base_damage, flags);

    for (m, pv) in attack_mods.iter().zip(attack_prevals) {
        m.on_event(
            GameEvent::ParentAttack,
            state,
            attacker,
            Some(defender),
            Some(&mut result),
            *pv,
        );
    }
    for (m, pv) in defend_mods.iter().zip(defend_prevals) {
        m.on_event(
            GameEvent::ParentDefend,
            state,
            defender,
            Some(attacker),
            Some(&mut result),
            *pv,
        );
    }
    for (m, pv) in attack_mods.iter().zip(attack_prevals) {
        m.post_event(
            GameEvent::ParentAttack,
            state,
            attacker,
            Some(defender),
            Some(&result),
            *pv,
        );
    }
    for (m, pv) in defend_mods.iter().zip(defend_prevals) {
        m.post_event(
            GameEvent::ParentDefend,
            state,
            defender,
            Some(attacker),
            Some(&result),
            *pv,
        );
    }

    if result.damage() > 0 {
        let e = state
            .entity_mut(defender)
            .ok_or(ApplyError::UnknownEntity { id: defender })?;
        e.take_damage(result.damage());
    }
    Ok(result)
}

/// Runs the on/post phases of a non-combat event on one entity.
///
/// Shared between the server's end-of-tick pass and replay of the generic
/// entity-event record.
pub(crate) fn run_entity_event(
    state: &mut GameState,
    id: EntityId,
    event: GameEvent,
    prevals: &[PreVal],
) -> Result<(), ApplyError> {
    let mods = {
        let e = state
            .entity_mut(id)
            .ok_or(ApplyError::UnknownEntity { id })?;
        e.refresh_derived();
        e.modifiers().to_vec()
    };
    let prevals = prevals_for(&mods, prevals, id)?;

    for (m, pv) in mods.iter().zip(prevals) {
        m.on_event(event, state, id, None, None, *pv);
    }
    for (m, pv) in mods.iter().zip(prevals) {
        m.post_event(event, state, id, None, None, *pv);
    }
    Ok(())
}
