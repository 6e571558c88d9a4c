//! Terrain cost classes, biomes and mobility types
//!
//! A step onto a hex costs `max(1, mobility + terrain - 2)`; a combined
//! value of 6 or more makes the hex impassable for that mover.

use serde::{Deserialize, Serialize};

use crate::battle::constants::{FLYER_STEP_COST, IMPASSABLE_COMBINED_COST, STEP_COST_OFFSET};

/// Traversal cost class of a hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TerrainCost {
    #[default]
    Easy,    // Flat ground
    Uneven,  // Scrub, rubble
    Broken,  // Boulders, craters
    NoLand,  // Water, chasms: only hover and flight
    Blocked, // Cliffs, walls: only flight, blocks sight
}

impl TerrainCost {
    /// Numeric cost class
    pub fn value(&self) -> u32 {
        match self {
            TerrainCost::Easy => 0,
            TerrainCost::Uneven => 1,
            TerrainCost::Broken => 2,
            TerrainCost::NoLand => 4,
            TerrainCost::Blocked => 5,
        }
    }

    /// Does this terrain block line of sight?
    pub fn blocks_sight(&self) -> bool {
        matches!(self, TerrainCost::Blocked)
    }
}

/// Cosmetic biome tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Biome {
    #[default]
    Plains,
    Desert,
    Forest,
    Tundra,
    Water,
    Mountain,
    Urban,
}

/// Mobility class of a mover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MovementType {
    Flyer,
    Hover,
    #[default]
    Walker,
    Crawler,
}

impl MovementType {
    /// Mobility cost added to the terrain cost class
    pub fn base_cost(&self) -> u32 {
        match self {
            MovementType::Flyer => 0,
            MovementType::Hover => 1,
            MovementType::Walker => 2,
            MovementType::Crawler => 3,
        }
    }

    /// Cost of stepping onto terrain, `None` when impassable
    pub fn step_cost(&self, terrain: TerrainCost) -> Option<u32> {
        if matches!(self, MovementType::Flyer) {
            return Some(FLYER_STEP_COST);
        }

        let combined = self.base_cost() + terrain.value();
        if combined >= IMPASSABLE_COMBINED_COST {
            return None;
        }
        Some(combined.saturating_sub(STEP_COST_OFFSET).max(1))
    }
}
