//! Inventory items.
//!
//! Items are inert during tick resolution; they exist so entity state,
//! views, and spawn records round-trip a realistic inventory. Consumption
//! and throwing live above the engine.

use serde::{Deserialize, Serialize};

/// A carryable item occupying one inventory slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Item {
    /// Restores health when consumed.
    HealingDraught,
    /// Single-use ranged weapon.
    ThrowingKnife,
    /// Light source. Not consumed by use.
    Torch,
}

impl Item {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HealingDraught => "healing draught",
            Self::ThrowingKnife => "throwing knife",
            Self::Torch => "torch",
        }
    }

    /// Maximum count a single slot can hold.
    #[must_use]
    pub const fn stack_size(self) -> u32 {
        match self {
            Self::HealingDraught => 5,
            Self::ThrowingKnife => 10,
            Self::Torch => 1,
        }
    }

    /// Whether activating the item consumes it.
    #[must_use]
    pub const fn consumed_on_use(self) -> bool {
        !matches!(self, Self::Torch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torch_is_reusable() {
        assert!(!Item::Torch.consumed_on_use());
        assert!(Item::HealingDraught.consumed_on_use());
    }

    #[test]
    fn names_are_distinct() {
        assert_ne!(Item::HealingDraught.name(), Item::ThrowingKnife.name());
    }
}
