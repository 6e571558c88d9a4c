//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Unique identifier for battle entities
///
/// Issued by the session in strictly increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Round counter (one round = every faction has had a turn)
pub type Round = u32;

/// The side an entity fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Loyalty {
    Player,
    Enemy,
    /// Third-party combatants, hostile to everyone
    Neutral,
    /// Terrain and obstacles: never acts, never counts for victory
    Inactive,
}

impl Loyalty {
    /// Combatant sides (everything except terrain)
    pub fn is_combatant(&self) -> bool {
        !matches!(self, Loyalty::Inactive)
    }

    /// Do these sides shoot at each other?
    pub fn is_hostile_to(&self, other: &Loyalty) -> bool {
        self != other && self.is_combatant() && other.is_combatant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_ordering() {
        assert!(EntityId(1) < EntityId(2));
        assert_eq!(EntityId(7), EntityId(7));
    }

    #[test]
    fn test_hostility() {
        assert!(Loyalty::Player.is_hostile_to(&Loyalty::Enemy));
        assert!(Loyalty::Neutral.is_hostile_to(&Loyalty::Player));
        assert!(!Loyalty::Player.is_hostile_to(&Loyalty::Player));
        assert!(!Loyalty::Enemy.is_hostile_to(&Loyalty::Inactive));
    }

    #[test]
    fn test_inactive_not_combatant() {
        assert!(!Loyalty::Inactive.is_combatant());
        assert!(Loyalty::Neutral.is_combatant());
    }
}
