//! Battle entities: passive scenery, active units and mobile units
//!
//! Every entity has health, armor and sensors. Active entities add a
//! reactor (energy, heat, shields) and subsystem slots; mobile entities add
//! a drive. The two layers are independent, so a turret is active but not
//! mobile and a cargo crawler is mobile but not active.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::battle::actions::ActionCache;
use crate::battle::hex::HexCoord;
use crate::battle::subsystem::{OperationalCondition, Subsystem};
use crate::battle::templates::{ActiveTemplate, EffectType, EntityTemplate, MobilityTemplate};
use crate::battle::visibility::SightSets;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{EntityId, Loyalty};

/// Reactor state of an active entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerState {
    #[default]
    Online,
    ShutDown,
}

/// Result of turn-start recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStart {
    Online,
    ShutDown { overheated: bool },
    /// Shut down two turns running
    Destroyed,
}

/// What one effect did to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageReport {
    pub shield_absorbed: i32,
    /// Amount that got past the shields
    pub internal: i32,
    pub hull_damage: i32,
    pub heat_added: i32,
    pub energy_drained: i32,
    pub repaired: i32,
}

/// Mutable reactor state
#[derive(Debug, Clone)]
pub struct ActiveState {
    pub energy: i32,
    pub emp_drain: i32,
    pub heat: i32,
    pub shield: i32,
    pub power: PowerState,
    pub subsystems: Vec<Subsystem>,
}

impl ActiveState {
    fn new(template: &ActiveTemplate, subsystems: Vec<Subsystem>) -> Self {
        Self {
            energy: template.max_energy,
            emp_drain: 0,
            heat: 0,
            shield: template.max_shield,
            power: PowerState::Online,
            subsystems,
        }
    }
}

/// An entity on the battle grid
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    template: Arc<EntityTemplate>,
    pub loyalty: Loyalty,
    pub(crate) position: HexCoord,
    pub health: i32,
    pub(crate) active: Option<ActiveState>,
    pub movement_left: u32,
    pub(crate) sight: SightSets,
    /// Sight sets are counted in the grid's sight counters
    pub(crate) sight_registered: bool,
    pub(crate) burned_out: bool,
    pub(crate) action_cache: Option<ActionCache>,
}

impl Entity {
    /// Fresh entity at full health, energy and shields
    pub fn new(
        id: EntityId,
        template: Arc<EntityTemplate>,
        loyalty: Loyalty,
        position: HexCoord,
        subsystems: Vec<Subsystem>,
    ) -> Result<Self> {
        let slots = template.system_slots();
        if subsystems.len() > slots {
            return Err(TacticsError::SlotOverflow {
                template: template.name.clone(),
                slots,
                requested: subsystems.len(),
            });
        }

        let active = template
            .active
            .as_ref()
            .map(|active| ActiveState::new(active, subsystems));
        let movement_left = template.mobility.map(|m| m.max_speed).unwrap_or(0);

        Ok(Self {
            id,
            health: template.max_health,
            template,
            loyalty,
            position,
            active,
            movement_left,
            sight: SightSets::default(),
            sight_registered: false,
            burned_out: false,
            action_cache: None,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn template(&self) -> &EntityTemplate {
        &self.template
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn position(&self) -> HexCoord {
        self.position
    }

    pub fn sight(&self) -> &SightSets {
        &self.sight
    }

    pub fn mobility(&self) -> Option<MobilityTemplate> {
        self.template.mobility
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_state(&self) -> Option<&ActiveState> {
        self.active.as_ref()
    }

    /// Passive entities count as online
    pub fn is_online(&self) -> bool {
        self.active
            .as_ref()
            .map_or(true, |a| a.power == PowerState::Online)
    }

    pub fn is_damaged(&self) -> bool {
        self.health < self.template.max_health
    }

    pub fn obstructs_sight(&self) -> bool {
        self.template.blocks_sight
    }

    pub fn is_hostile_to(&self, other: &Entity) -> bool {
        self.loyalty.is_hostile_to(&other.loyalty)
    }

    pub fn energy(&self) -> i32 {
        self.active.as_ref().map_or(0, |a| a.energy)
    }

    pub fn heat(&self) -> i32 {
        self.active.as_ref().map_or(0, |a| a.heat)
    }

    pub fn shield(&self) -> i32 {
        self.active.as_ref().map_or(0, |a| a.shield)
    }

    pub fn emp_drain(&self) -> i32 {
        self.active.as_ref().map_or(0, |a| a.emp_drain)
    }

    pub fn subsystems(&self) -> &[Subsystem] {
        match &self.active {
            Some(active) => &active.subsystems,
            None => &[],
        }
    }

    pub fn subsystem(&self, index: usize) -> Option<&Subsystem> {
        self.subsystems().get(index)
    }

    pub(crate) fn subsystem_mut(&mut self, index: usize) -> Option<&mut Subsystem> {
        self.active.as_mut()?.subsystems.get_mut(index)
    }

    pub fn operational_subsystems(&self) -> Vec<usize> {
        self.subsystems()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_operational())
            .map(|(i, _)| i)
            .collect()
    }

    /// Health gone, every subsystem down, or burned out by a second shutdown
    pub fn should_be_destroyed(&self) -> bool {
        if self.health <= 0 || self.burned_out {
            return true;
        }
        match &self.active {
            Some(active) => !active.subsystems.iter().any(|s| s.is_operational()),
            None => false,
        }
    }

    /// Shield stage: returns (absorbed, amount reaching the hull)
    pub fn absorb_external(&mut self, strength: i32, effect: EffectType) -> (i32, i32) {
        let strength = strength.max(0);
        let mut unshielded = 0;
        let shield = match self.active.as_mut() {
            Some(active) => &mut active.shield,
            None => &mut unshielded,
        };

        match effect {
            EffectType::Repair => (0, strength),
            EffectType::Physical | EffectType::Emp => {
                let absorbed = strength.min(*shield);
                *shield -= absorbed;
                (absorbed, strength - absorbed)
            }
            EffectType::Incendiary => {
                let shielded = (strength + 1) / 2;
                let absorbed = shielded.min(*shield);
                *shield -= absorbed;
                (absorbed, (shielded - absorbed) * 2)
            }
            EffectType::Heat => {
                let absorbed = (*shield).min(1);
                *shield -= absorbed;
                (absorbed, strength)
            }
        }
    }

    /// Hull stage for an amount that got past the shields
    pub fn apply_internal(&mut self, amount: i32, effect: EffectType, report: &mut DamageReport) {
        if amount <= 0 {
            return;
        }
        match effect {
            EffectType::Physical => {
                let damage = (amount - self.template.armor).max(0);
                self.health -= damage;
                report.hull_damage += damage;
            }
            EffectType::Incendiary => {
                let burn = (amount + 1) / 2;
                self.health -= burn;
                report.hull_damage += burn;
                if let Some(active) = self.active.as_mut() {
                    let heat = amount - burn;
                    active.heat += heat;
                    report.heat_added += heat;
                }
            }
            EffectType::Emp => {
                if let Some(active) = self.active.as_mut() {
                    active.emp_drain += amount;
                    let drained = amount.min(active.energy.max(0));
                    active.energy -= drained;
                    report.energy_drained += amount;
                }
            }
            EffectType::Heat => {
                if let Some(active) = self.active.as_mut() {
                    active.heat += amount;
                    report.heat_added += amount;
                }
            }
            EffectType::Repair => {
                let healed = amount.min(self.template.max_health - self.health).max(0);
                self.health += healed;
                report.repaired += healed;
            }
        }
    }

    /// Run an effect through both stages
    pub fn affect(&mut self, strength: i32, effect: EffectType) -> DamageReport {
        let (absorbed, internal) = self.absorb_external(strength, effect);
        let mut report = DamageReport {
            shield_absorbed: absorbed,
            internal,
            ..DamageReport::default()
        };
        self.apply_internal(internal, effect, &mut report);
        report
    }

    /// Turn-start recovery or shutdown
    pub fn begin_turn(&mut self) -> TurnStart {
        let template = Arc::clone(&self.template);
        let speed = template.mobility.map(|m| m.max_speed).unwrap_or(0);

        let (Some(profile), Some(active)) = (template.active.as_ref(), self.active.as_mut()) else {
            self.movement_left = speed;
            return TurnStart::Online;
        };

        let overheated = active.heat >= profile.max_heat;
        let drained = profile.max_energy - active.emp_drain <= 0;

        if overheated || drained {
            if active.power == PowerState::ShutDown {
                self.burned_out = true;
                return TurnStart::Destroyed;
            }
            active.power = PowerState::ShutDown;
            if overheated {
                active.heat = 0;
            }
            active.emp_drain = 0;
            active.energy = 0;
            for subsystem in &mut active.subsystems {
                subsystem.clear_actions();
            }
            self.movement_left = 0;
            return TurnStart::ShutDown { overheated };
        }

        active.power = PowerState::Online;
        active.energy = profile.max_energy - active.emp_drain;
        active.emp_drain = 0;
        active.heat = (active.heat - profile.heat_loss_rate).max(0);
        active.shield = (active.shield + profile.shield_recharge_rate).min(profile.max_shield);
        for subsystem in &mut active.subsystems {
            subsystem.reset_actions();
        }
        self.movement_left = speed;
        TurnStart::Online
    }

    /// Knock out a subsystem (used by hit rolls)
    pub(crate) fn hit_subsystem(
        &mut self,
        index: usize,
        effect: EffectType,
    ) -> Option<OperationalCondition> {
        self.subsystem_mut(index)?.hit(effect)
    }
}
