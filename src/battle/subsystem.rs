//! Subsystem instances fitted to active entities
//!
//! Conditions only ever get worse: Operational → OutOfAmmo → Neutralized →
//! Destroyed. A subsystem is never repaired back to a better condition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::battle::templates::{EffectType, HexEffectTemplate, SubsystemTemplate};

/// Operational condition of a subsystem, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationalCondition {
    Operational,
    OutOfAmmo,
    Neutralized,
    Destroyed,
}

/// A subsystem fitted to an entity
#[derive(Debug, Clone)]
pub struct Subsystem {
    template: Arc<SubsystemTemplate>,
    hex_effect: Option<Arc<HexEffectTemplate>>,
    condition: OperationalCondition,
    ammo: Option<u32>,
    actions_left: u32,
}

impl Subsystem {
    pub fn new(
        template: Arc<SubsystemTemplate>,
        hex_effect: Option<Arc<HexEffectTemplate>>,
    ) -> Self {
        let ammo = template.max_ammo;
        let condition = if ammo == Some(0) {
            OperationalCondition::OutOfAmmo
        } else {
            OperationalCondition::Operational
        };
        let actions_left = template.actions_per_turn;
        Self {
            template,
            hex_effect,
            condition,
            ammo,
            actions_left,
        }
    }

    pub fn template(&self) -> &SubsystemTemplate {
        &self.template
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn hex_effect(&self) -> Option<&Arc<HexEffectTemplate>> {
        self.hex_effect.as_ref()
    }

    pub fn condition(&self) -> OperationalCondition {
        self.condition
    }

    pub fn ammo(&self) -> Option<u32> {
        self.ammo
    }

    pub fn actions_left(&self) -> u32 {
        self.actions_left
    }

    pub fn is_operational(&self) -> bool {
        self.condition == OperationalCondition::Operational
    }

    /// Operational with an action left this turn
    pub fn can_operate(&self) -> bool {
        self.is_operational() && self.actions_left > 0 && self.ammo != Some(0)
    }

    /// Move to a worse condition; returns false if `to` is not worse
    pub fn degrade(&mut self, to: OperationalCondition) -> bool {
        if to > self.condition {
            self.condition = to;
            true
        } else {
            false
        }
    }

    /// Spend one action and one round of ammo
    pub fn expend(&mut self) {
        self.actions_left = self.actions_left.saturating_sub(1);
        if let Some(ammo) = self.ammo.as_mut() {
            *ammo = ammo.saturating_sub(1);
            if *ammo == 0 {
                self.degrade(OperationalCondition::OutOfAmmo);
            }
        }
    }

    /// Apply a subsystem hit; returns the new condition if it changed
    pub fn hit(&mut self, effect: EffectType) -> Option<OperationalCondition> {
        let to = match effect {
            EffectType::Physical => OperationalCondition::Destroyed,
            EffectType::Emp => OperationalCondition::Neutralized,
            _ => return None,
        };
        self.degrade(to).then_some(to)
    }

    pub(crate) fn reset_actions(&mut self) {
        self.actions_left = self.template.actions_per_turn;
    }

    pub(crate) fn clear_actions(&mut self) {
        self.actions_left = 0;
    }
}
