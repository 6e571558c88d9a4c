//! Battle configuration with documented constants
//!
//! Every tunable the battle core reads lives here. A session owns its own
//! copy, so several battles with different settings can run side by side.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TacticsError};

/// Configuration for a single battle session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Seed for the session RNG (subsystem hit rolls)
    ///
    /// Two sessions built from the same templates, placements and seed
    /// replay identically.
    pub seed: u64,

    /// Chance per point of damage that a random operational subsystem is hit
    ///
    /// At 0.1, a 5-point hit has a 50% chance to knock out a subsystem and
    /// anything of 10 points or more always does. Set to 0.0 to disable
    /// subsystem hits entirely.
    pub subsystem_hit_chance_per_point: f32,

    /// Value the default AI assigns to every living combatant
    ///
    /// Only ratios matter: it is weighed against subsystem strength in
    /// the fire priority and against path costs in movement priority.
    pub default_target_value: f32,

    /// Rounds before an undecided battle is called a stalemate
    ///
    /// Only matters when no human faction ever takes the turn.
    pub max_rounds: u32,

    /// Sampling step along visibility rays (in hex widths)
    ///
    /// Smaller = fewer clipped corners, more samples per ray.
    pub ray_step: f32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            subsystem_hit_chance_per_point: 0.05,
            default_target_value: 10.0,
            max_rounds: 200,
            ray_step: 0.1,
        }
    }
}

impl BattleConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML; missing keys fall back to defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: BattleConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.subsystem_hit_chance_per_point) {
            return Err(TacticsError::InvalidConfig(format!(
                "subsystem_hit_chance_per_point ({}) must be within 0..=1",
                self.subsystem_hit_chance_per_point
            )));
        }

        if self.default_target_value <= 0.0 {
            return Err(TacticsError::InvalidConfig(
                "default_target_value must be positive".into(),
            ));
        }

        // Rays must sample every hex they cross
        if self.ray_step <= 0.0 || self.ray_step > 0.5 {
            return Err(TacticsError::InvalidConfig(format!(
                "ray_step ({}) must be within (0, 0.5]",
                self.ray_step
            )));
        }

        if self.max_rounds == 0 {
            return Err(TacticsError::InvalidConfig("max_rounds must be at least 1".into()));
        }

        Ok(())
    }
}
