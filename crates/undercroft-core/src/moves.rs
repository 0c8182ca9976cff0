//! The per-tick move set submitted by players and NPC controllers.

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// One entity's intended action for a tick.
///
/// The grid's y axis grows downward, so `Up` is `(0, -1)`.
///
/// # Example
///
/// ```
/// use undercroft_core::moves::Move;
/// use glam::IVec2;
///
/// assert_eq!(Move::Up.delta(), IVec2::new(0, -1));
/// assert_eq!(Move::Stay.delta(), IVec2::ZERO);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    /// Step one cell toward negative y.
    Up,
    /// Step one cell toward positive x.
    Right,
    /// Step one cell toward positive y.
    Down,
    /// Step one cell toward negative x.
    Left,
    /// Hold position. A stationary entity blocks incoming attacks.
    Stay,
}

impl Move {
    /// The grid offset this move applies to an entity's position.
    #[must_use]
    pub const fn delta(self) -> IVec2 {
        match self {
            Self::Up => IVec2::new(0, -1),
            Self::Right => IVec2::new(1, 0),
            Self::Down => IVec2::new(0, 1),
            Self::Left => IVec2::new(-1, 0),
            Self::Stay => IVec2::new(0, 0),
        }
    }

    /// Returns `true` for `Stay`.
    #[must_use]
    pub const fn is_stay(self) -> bool {
        matches!(self, Self::Stay)
    }
}
