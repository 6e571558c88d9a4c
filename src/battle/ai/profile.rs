//! AI profile configuration loaded from TOML
//!
//! Profiles tune how the greedy commander weighs targets and movement.
//! They never change the rules, only the priorities.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::battle::ai::TargetValuation;
use crate::battle::entity::Entity;
use crate::core::error::Result;

/// Behavioral tendencies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Multiplier on movement priorities (0.0 = never reposition)
    pub move_weight: f32,
    /// Count radar contacts as known enemies, not just sighted ones
    pub use_radar_contacts: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            move_weight: 1.0,
            use_radar_contacts: false,
        }
    }
}

/// Target value weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Value of any living combatant
    pub combatant_value: f32,
    /// Extra value scaled by missing health (finishing off the wounded)
    pub wounded_bonus: f32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            combatant_value: 10.0,
            wounded_bonus: 0.0,
        }
    }
}

/// Complete AI profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProfile {
    /// Name of this profile (set from filename)
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub weights: WeightConfig,
}

impl Default for AiProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            behavior: BehaviorConfig::default(),
            weights: WeightConfig::default(),
        }
    }
}

impl AiProfile {
    pub fn from_toml_str(name: &str, contents: &str) -> Result<Self> {
        let mut profile: AiProfile = toml::from_str(contents)?;
        profile.name = name.to_string();
        Ok(profile)
    }
}

impl TargetValuation for WeightConfig {
    fn value(&self, target: &Entity) -> f32 {
        if !target.loyalty.is_combatant() {
            return 0.0;
        }
        let max_health = target.template().max_health.max(1) as f32;
        let missing = (max_health - target.health as f32).max(0.0) / max_health;
        self.combatant_value + self.wounded_bonus * missing
    }
}

/// Load a profile from `data/ai_profiles/{name}.toml`
pub fn load_profile(name: &str) -> Result<AiProfile> {
    let path = profile_path(name);
    let contents = fs::read_to_string(&path)?;
    let profile = AiProfile::from_toml_str(name, &contents)?;
    tracing::debug!("Loaded AI profile {} from {:?}", name, path);
    Ok(profile)
}

fn profile_path(name: &str) -> PathBuf {
    PathBuf::from("data/ai_profiles").join(format!("{}.toml", name))
}
