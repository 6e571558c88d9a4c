//! Battle AI
//!
//! Architecture: Trait + Data hybrid
//! - BattleAi trait defines the interface a faction controller implements
//! - TargetValuation decides what an enemy (or a friend in need) is worth
//! - AiProfile holds TOML-loaded weights for the greedy commander

mod commander;
mod evaluation;
mod profile;

pub use commander::{commit_in_priority_order, AiCommander, QueueRun};
pub use evaluation::{known_enemies, position_value, ActionQueue, EvaluatedAction, Goal};
pub use profile::{load_profile, AiProfile, BehaviorConfig, WeightConfig};

use crate::battle::actions::PotentialAction;
use crate::battle::entity::Entity;
use crate::battle::session::BattleSession;
use crate::core::error::Result;
use crate::core::types::EntityId;

/// What an AI did with its turn
#[derive(Debug, Clone, Default)]
pub struct AiTurnReport {
    pub committed: Vec<PotentialAction>,
    /// Actions scored across every evaluation pass
    pub evaluations: usize,
}

/// Trait for battle AI implementations
pub trait BattleAi {
    fn name(&self) -> &str;

    /// Play one turn for `units`, committing actions on the session
    fn act(&mut self, session: &mut BattleSession, units: &[EntityId]) -> Result<AiTurnReport>;
}

/// How much an entity is worth as a target
pub trait TargetValuation {
    fn value(&self, target: &Entity) -> f32;
}

/// Every living combatant is worth the same; terrain is worth nothing
#[derive(Debug, Clone, Copy)]
pub struct UniformValuation {
    pub value: f32,
}

impl TargetValuation for UniformValuation {
    fn value(&self, target: &Entity) -> f32 {
        if target.loyalty.is_combatant() {
            self.value
        } else {
            0.0
        }
    }
}
