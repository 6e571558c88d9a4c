//! Immutable stat blocks for entities, subsystems and hex effects
//!
//! Templates are plain values keyed by name. They are either built in code
//! with the constructors below or loaded from a TOML library such as
//! `data/templates.toml`:
//!
//! ```toml
//! [subsystem.autocannon]
//! energy_cost = 2
//! max_range = 4
//! delivery = "Direct"
//! effect = "Physical"
//! strength = 3
//!
//! [entity.skirmisher]
//! max_health = 8
//! sight_range = 5
//! loadout = ["autocannon"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::battle::subsystem::Subsystem;
use crate::battle::terrain::MovementType;
use crate::core::error::{Result, TacticsError};

/// How a subsystem's effect reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeliveryMethod {
    /// Line of fire, stopped by the first occupant or wall on the way
    #[default]
    Direct,
    /// Lobbed or beamed: only range matters
    Unobstructed,
}

/// What a subsystem does to whatever it hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectType {
    Physical,
    Incendiary,
    Emp,
    Heat,
    Repair,
}

impl EffectType {
    /// Effects that are aimed at enemies
    pub fn is_harmful(&self) -> bool {
        !matches!(self, EffectType::Repair)
    }

    /// Effects that can knock out subsystems
    pub fn can_disable(&self) -> bool {
        matches!(self, EffectType::Physical | EffectType::Emp)
    }
}

/// Which hexes a subsystem may be aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TargetMask {
    pub enemy: bool,
    pub friendly: bool,
    pub empty_hexes: bool,
}

impl TargetMask {
    pub fn enemy() -> Self {
        Self {
            enemy: true,
            ..Self::default()
        }
    }

    pub fn friendly() -> Self {
        Self {
            friendly: true,
            ..Self::default()
        }
    }

    pub fn with_empty_hexes(mut self) -> Self {
        self.empty_hexes = true;
        self
    }
}

fn default_targets() -> TargetMask {
    TargetMask::enemy()
}

fn default_actions_per_turn() -> u32 {
    1
}

/// Persisting effect a subsystem can leave on a hex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexEffectTemplate {
    #[serde(default)]
    pub name: String,
    pub effect: EffectType,
    pub strength: i32,
    /// Turns the effect keeps pulsing
    pub duration: u32,
}

/// Weapon or utility module stat block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemTemplate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub energy_cost: i32,
    #[serde(default)]
    pub heat_generated: i32,
    #[serde(default)]
    pub min_range: u32,
    pub max_range: u32,
    #[serde(default)]
    pub delivery: DeliveryMethod,
    pub effect: EffectType,
    pub strength: i32,
    #[serde(default = "default_targets")]
    pub targets: TargetMask,
    /// `None` = unlimited
    #[serde(default)]
    pub max_ammo: Option<u32>,
    #[serde(default = "default_actions_per_turn")]
    pub actions_per_turn: u32,
    /// Name of a hex effect template left on the target hex
    #[serde(default)]
    pub hex_effect: Option<String>,
}

impl SubsystemTemplate {
    /// A direct-fire weapon aimed at enemies
    pub fn weapon(name: &str, effect: EffectType, strength: i32, max_range: u32) -> Self {
        Self {
            name: name.to_string(),
            energy_cost: 1,
            heat_generated: 0,
            min_range: 1,
            max_range,
            delivery: DeliveryMethod::Direct,
            effect,
            strength,
            targets: TargetMask::enemy(),
            max_ammo: None,
            actions_per_turn: 1,
            hex_effect: None,
        }
    }

    pub fn with_costs(mut self, energy_cost: i32, heat_generated: i32) -> Self {
        self.energy_cost = energy_cost;
        self.heat_generated = heat_generated;
        self
    }

    pub fn with_min_range(mut self, min_range: u32) -> Self {
        self.min_range = min_range;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryMethod) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_targets(mut self, targets: TargetMask) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_ammo(mut self, max_ammo: u32) -> Self {
        self.max_ammo = Some(max_ammo);
        self
    }

    pub fn with_actions_per_turn(mut self, actions: u32) -> Self {
        self.actions_per_turn = actions;
        self
    }

    pub fn in_range(&self, distance: u32) -> bool {
        (self.min_range..=self.max_range).contains(&distance)
    }

    /// Cost used to normalise AI priorities, never below 1
    pub fn upkeep(&self) -> i32 {
        (self.energy_cost + self.heat_generated).max(1)
    }
}

/// Reactor, heat sinks and shields of an active unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTemplate {
    pub max_energy: i32,
    pub max_heat: i32,
    #[serde(default)]
    pub max_shield: i32,
    #[serde(default)]
    pub heat_loss_rate: i32,
    #[serde(default)]
    pub shield_recharge_rate: i32,
    pub system_slots: usize,
}

/// Drive of a mobile unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MobilityTemplate {
    pub movement_type: MovementType,
    pub max_speed: u32,
}

/// Entity stat block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTemplate {
    #[serde(default)]
    pub name: String,
    pub max_health: i32,
    #[serde(default)]
    pub armor: i32,
    #[serde(default)]
    pub sight_range: u32,
    #[serde(default)]
    pub radar_range: u32,
    /// Walls, boulders: stop sight rays
    #[serde(default)]
    pub blocks_sight: bool,
    #[serde(default)]
    pub active: Option<ActiveTemplate>,
    #[serde(default)]
    pub mobility: Option<MobilityTemplate>,
    /// Subsystem template names fitted at spawn
    #[serde(default)]
    pub loadout: Vec<String>,
}

impl EntityTemplate {
    /// Passive entity: no reactor, no drive
    pub fn new(name: &str, max_health: i32) -> Self {
        Self {
            name: name.to_string(),
            max_health,
            armor: 0,
            sight_range: 0,
            radar_range: 0,
            blocks_sight: false,
            active: None,
            mobility: None,
            loadout: Vec::new(),
        }
    }

    /// Obstacle that blocks sight (terrain-loyalty scenery)
    pub fn obstacle(name: &str, max_health: i32) -> Self {
        Self {
            blocks_sight: true,
            ..Self::new(name, max_health)
        }
    }

    pub fn with_armor(mut self, armor: i32) -> Self {
        self.armor = armor;
        self
    }

    pub fn with_sensors(mut self, sight_range: u32, radar_range: u32) -> Self {
        self.sight_range = sight_range;
        self.radar_range = radar_range;
        self
    }

    pub fn with_active(mut self, active: ActiveTemplate) -> Self {
        self.active = Some(active);
        self
    }

    pub fn with_mobility(mut self, movement_type: MovementType, max_speed: u32) -> Self {
        self.mobility = Some(MobilityTemplate {
            movement_type,
            max_speed,
        });
        self
    }

    pub fn with_loadout(mut self, loadout: &[&str]) -> Self {
        self.loadout = loadout.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn system_slots(&self) -> usize {
        self.active.as_ref().map(|a| a.system_slots).unwrap_or(0)
    }
}

/// TOML layout of a template library file
#[derive(Debug, Default, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    entity: BTreeMap<String, EntityTemplate>,
    #[serde(default)]
    subsystem: BTreeMap<String, SubsystemTemplate>,
    #[serde(default)]
    hex_effect: BTreeMap<String, HexEffectTemplate>,
}

/// Named templates available to a battle
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    entities: BTreeMap<String, Arc<EntityTemplate>>,
    subsystems: BTreeMap<String, Arc<SubsystemTemplate>>,
    hex_effects: BTreeMap<String, Arc<HexEffectTemplate>>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a library from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Parse a library from TOML; every cross reference must resolve
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: LibraryFile = toml::from_str(contents)?;
        let mut library = Self::new();

        for (name, mut template) in file.hex_effect {
            template.name = name;
            library.insert_hex_effect(template);
        }
        for (name, mut template) in file.subsystem {
            template.name = name;
            library.insert_subsystem(template)?;
        }
        for (name, mut template) in file.entity {
            template.name = name;
            library.insert_entity(template)?;
        }

        Ok(library)
    }

    pub fn insert_hex_effect(&mut self, template: HexEffectTemplate) -> Arc<HexEffectTemplate> {
        let template = Arc::new(template);
        self.hex_effects
            .insert(template.name.clone(), Arc::clone(&template));
        template
    }

    /// Add a subsystem template (its hex effect must already be known)
    pub fn insert_subsystem(
        &mut self,
        template: SubsystemTemplate,
    ) -> Result<Arc<SubsystemTemplate>> {
        if let Some(effect) = &template.hex_effect {
            self.hex_effect(effect)?;
        }
        if template.min_range > template.max_range {
            return Err(TacticsError::InvalidConfig(format!(
                "subsystem {} has min_range {} above max_range {}",
                template.name, template.min_range, template.max_range
            )));
        }
        let template = Arc::new(template);
        self.subsystems
            .insert(template.name.clone(), Arc::clone(&template));
        Ok(template)
    }

    /// Add an entity template (its loadout must already be known)
    pub fn insert_entity(&mut self, template: EntityTemplate) -> Result<Arc<EntityTemplate>> {
        for name in &template.loadout {
            self.subsystem(name)?;
        }
        if template.loadout.len() > template.system_slots() {
            return Err(TacticsError::SlotOverflow {
                template: template.name.clone(),
                slots: template.system_slots(),
                requested: template.loadout.len(),
            });
        }
        if let Some(active) = &template.active {
            if active.max_energy <= 0 {
                return Err(TacticsError::InvalidConfig(format!(
                    "active template {} needs positive max_energy",
                    template.name
                )));
            }
        }
        let template = Arc::new(template);
        self.entities
            .insert(template.name.clone(), Arc::clone(&template));
        Ok(template)
    }

    pub fn entity(&self, name: &str) -> Result<Arc<EntityTemplate>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| TacticsError::TemplateNotFound {
                kind: "entity",
                name: name.to_string(),
            })
    }

    pub fn subsystem(&self, name: &str) -> Result<Arc<SubsystemTemplate>> {
        self.subsystems
            .get(name)
            .cloned()
            .ok_or_else(|| TacticsError::TemplateNotFound {
                kind: "subsystem",
                name: name.to_string(),
            })
    }

    pub fn hex_effect(&self, name: &str) -> Result<Arc<HexEffectTemplate>> {
        self.hex_effects
            .get(name)
            .cloned()
            .ok_or_else(|| TacticsError::TemplateNotFound {
                kind: "hex effect",
                name: name.to_string(),
            })
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(|s| s.as_str())
    }

    /// Fresh subsystem instance with its hex effect resolved
    pub fn build_subsystem(&self, name: &str) -> Result<Subsystem> {
        let template = self.subsystem(name)?;
        let hex_effect = match &template.hex_effect {
            Some(effect) => Some(self.hex_effect(effect)?),
            None => None,
        };
        Ok(Subsystem::new(template, hex_effect))
    }

    /// Every subsystem named in an entity template's loadout
    pub fn build_loadout(&self, template: &EntityTemplate) -> Result<Vec<Subsystem>> {
        template
            .loadout
            .iter()
            .map(|name| self.build_subsystem(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"
[hex_effect.fire]
effect = "Incendiary"
strength = 2
duration = 3

[subsystem.cannon]
energy_cost = 2
heat_generated = 1
min_range = 1
max_range = 4
effect = "Physical"
strength = 3

[subsystem.mortar]
max_range = 5
min_range = 2
delivery = "Unobstructed"
effect = "Incendiary"
strength = 2
max_ammo = 2
targets = { enemy = true, empty_hexes = true }
hex_effect = "fire"

[entity.tank]
max_health = 10
armor = 1
sight_range = 5
loadout = ["cannon", "mortar"]

[entity.tank.active]
max_energy = 6
max_heat = 8
system_slots = 2

[entity.tank.mobility]
movement_type = "Crawler"
max_speed = 3
"#;

    #[test]
    fn test_library_parses_names_from_keys() {
        let library = TemplateLibrary::from_toml_str(LIBRARY).unwrap();
        let tank = library.entity("tank").unwrap();
        assert_eq!(tank.name, "tank");
        assert_eq!(tank.system_slots(), 2);
        assert_eq!(tank.mobility.unwrap().movement_type, MovementType::Crawler);
    }

    #[test]
    fn test_subsystem_defaults() {
        let library = TemplateLibrary::from_toml_str(LIBRARY).unwrap();
        let cannon = library.subsystem("cannon").unwrap();
        assert_eq!(cannon.delivery, DeliveryMethod::Direct);
        assert_eq!(cannon.targets, TargetMask::enemy());
        assert_eq!(cannon.actions_per_turn, 1);
        assert_eq!(cannon.max_ammo, None);
    }

    #[test]
    fn test_build_subsystem_resolves_hex_effect() {
        let library = TemplateLibrary::from_toml_str(LIBRARY).unwrap();
        let mortar = library.build_subsystem("mortar").unwrap();
        assert_eq!(mortar.hex_effect().map(|e| e.duration), Some(3));
        assert_eq!(mortar.ammo(), Some(2));
    }

    #[test]
    fn test_missing_template_is_not_found() {
        let library = TemplateLibrary::from_toml_str(LIBRARY).unwrap();
        let result = library.entity("battleship");
        assert!(matches!(
            result,
            Err(TacticsError::TemplateNotFound { kind: "entity", .. })
        ));
    }

    #[test]
    fn test_unknown_loadout_rejected() {
        let mut library = TemplateLibrary::new();
        let template = EntityTemplate::new("drone", 3).with_loadout(&["laser"]);
        assert!(matches!(
            library.insert_entity(template),
            Err(TacticsError::TemplateNotFound { kind: "subsystem", .. })
        ));
    }

    #[test]
    fn test_loadout_over_slots_rejected() {
        let mut library = TemplateLibrary::new();
        library
            .insert_subsystem(SubsystemTemplate::weapon("laser", EffectType::Heat, 2, 3))
            .unwrap();
        let template = EntityTemplate::new("drone", 3).with_loadout(&["laser"]);
        assert!(matches!(
            library.insert_entity(template),
            Err(TacticsError::SlotOverflow { slots: 0, requested: 1, .. })
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut library = TemplateLibrary::new();
        let template =
            SubsystemTemplate::weapon("odd", EffectType::Physical, 1, 2).with_min_range(3);
        assert!(library.insert_subsystem(template).is_err());
    }

    #[test]
    fn test_upkeep_never_zero() {
        let free = SubsystemTemplate::weapon("free", EffectType::Physical, 1, 1).with_costs(0, 0);
        assert_eq!(free.upkeep(), 1);
        let costly = free.with_costs(2, 3);
        assert_eq!(costly.upkeep(), 5);
    }

    #[test]
    fn test_shipped_library_loads() {
        let library = TemplateLibrary::load("data/templates.toml").expect("shipped templates load");
        assert!(library.entity_names().count() >= 3);
    }
}
