//! Battle grid: hex cells, terrain, occupancy and sight counters
//!
//! The grid is the single source of truth for occupancy. Occupants only
//! change through `set_occupant` / `relocate`, and every change bumps the
//! occupancy revision that action caches are checked against.

use std::sync::Arc;

use ahash::AHashMap;

use crate::battle::hex::HexCoord;
use crate::battle::templates::HexEffectTemplate;
use crate::battle::terrain::{Biome, MovementType, TerrainCost};
use crate::core::error::{Result, TacticsError};
use crate::core::types::EntityId;

/// A persisting effect left on a hex by a subsystem
#[derive(Debug, Clone)]
pub struct HexEffect {
    pub template: Arc<HexEffectTemplate>,
    pub remaining_turns: u32,
}

impl HexEffect {
    pub fn new(template: Arc<HexEffectTemplate>) -> Self {
        let remaining_turns = template.duration;
        Self {
            template,
            remaining_turns,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_turns == 0
    }
}

/// A single hex on the battle grid
#[derive(Debug, Clone)]
pub struct HexCell {
    pub coord: HexCoord,
    pub terrain: TerrainCost,
    pub biome: Biome,
    occupant: Option<EntityId>,
    /// Observers of the current faction that see this hex
    pub sight_count: u32,
    /// Observers of the current faction that detect this hex on radar
    pub detection_count: u32,
    pub effects: Vec<HexEffect>,
}

impl HexCell {
    pub fn new(coord: HexCoord, terrain: TerrainCost) -> Self {
        Self {
            coord,
            terrain,
            biome: Biome::default(),
            occupant: None,
            sight_count: 0,
            detection_count: 0,
            effects: Vec::new(),
        }
    }

    pub fn occupant(&self) -> Option<EntityId> {
        self.occupant
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    pub fn is_seen(&self) -> bool {
        self.sight_count > 0
    }
}

/// The full battle grid
#[derive(Debug, Clone)]
pub struct HexGrid {
    cells: AHashMap<HexCoord, HexCell>,
    width: u32,
    height: u32,
    occupancy_revision: u64,
}

impl HexGrid {
    /// Create a new rectangular grid of easy terrain
    pub fn new(width: u32, height: u32) -> Self {
        let mut cells = AHashMap::new();

        for x in 0..width as i32 {
            for y in 0..height as i32 {
                let coord = HexCoord::new(x, y);
                cells.insert(coord, HexCell::new(coord, TerrainCost::Easy));
            }
        }

        Self {
            cells,
            width,
            height,
            occupancy_revision: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get a hex at the given coordinate
    pub fn cell(&self, coord: HexCoord) -> Option<&HexCell> {
        self.cells.get(&coord)
    }

    /// Get a mutable hex at the given coordinate
    pub fn cell_mut(&mut self, coord: HexCoord) -> Option<&mut HexCell> {
        self.cells.get_mut(&coord)
    }

    pub fn contains(&self, coord: HexCoord) -> bool {
        self.cells.contains_key(&coord)
    }

    /// All coordinates in row-major order
    pub fn coords(&self) -> Vec<HexCoord> {
        let mut coords: Vec<HexCoord> = self.cells.keys().copied().collect();
        coords.sort_by_key(|c| (c.y, c.x));
        coords
    }

    /// Neighbours that exist on this grid
    pub fn neighbors(&self, coord: HexCoord) -> Vec<HexCoord> {
        coord
            .neighbors()
            .into_iter()
            .filter(|n| self.contains(*n))
            .collect()
    }

    pub fn distance(&self, a: HexCoord, b: HexCoord) -> u32 {
        a.distance(&b)
    }

    pub fn occupant(&self, coord: HexCoord) -> Option<EntityId> {
        self.cell(coord).and_then(|c| c.occupant)
    }

    /// Bumped on every occupancy change
    pub fn occupancy_revision(&self) -> u64 {
        self.occupancy_revision
    }

    /// Place or clear an occupant
    ///
    /// Placing over a different occupant is an `OccupancyConflict`; the
    /// existing occupant has to be cleared first.
    pub fn set_occupant(&mut self, coord: HexCoord, occupant: Option<EntityId>) -> Result<()> {
        let cell = self
            .cells
            .get_mut(&coord)
            .ok_or(TacticsError::HexNotFound(coord))?;

        if let (Some(existing), Some(incoming)) = (cell.occupant, occupant) {
            if existing != incoming {
                return Err(TacticsError::OccupancyConflict {
                    hex: coord,
                    occupant: existing,
                    incoming,
                });
            }
        }

        if cell.occupant != occupant {
            cell.occupant = occupant;
            self.occupancy_revision += 1;
        }
        Ok(())
    }

    /// Move an occupant between hexes (clear, then set)
    pub fn relocate(&mut self, from: HexCoord, to: HexCoord, entity: EntityId) -> Result<()> {
        if self.occupant(from) != Some(entity) {
            return Err(TacticsError::IllegalAction(format!(
                "{:?} does not occupy {:?}",
                entity, from
            )));
        }
        match self.occupant(to) {
            Some(existing) if existing != entity => {
                return Err(TacticsError::OccupancyConflict {
                    hex: to,
                    occupant: existing,
                    incoming: entity,
                })
            }
            _ => {}
        }
        if !self.contains(to) {
            return Err(TacticsError::HexNotFound(to));
        }

        self.set_occupant(from, None)?;
        self.set_occupant(to, Some(entity))
    }

    /// Set terrain at a coordinate
    pub fn set_terrain(&mut self, coord: HexCoord, terrain: TerrainCost) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.terrain = terrain;
        }
    }

    /// Set biome at a coordinate
    pub fn set_biome(&mut self, coord: HexCoord, biome: Biome) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.biome = biome;
        }
    }

    /// Cost for a mover to step onto `coord`, `None` when it cannot
    ///
    /// Occupied hexes are impassable for every mover.
    pub fn traversal_cost(&self, coord: HexCoord, movement: MovementType) -> Option<u32> {
        let cell = self.cell(coord)?;
        if cell.is_occupied() {
            return None;
        }
        movement.step_cost(cell.terrain)
    }

    /// Terrain-only step cost (ignores occupants)
    pub fn terrain_step_cost(&self, coord: HexCoord, movement: MovementType) -> Option<u32> {
        movement.step_cost(self.cell(coord)?.terrain)
    }

    /// Zero every sight and detection counter
    pub fn reset_sight_counts(&mut self) {
        for cell in self.cells.values_mut() {
            cell.sight_count = 0;
            cell.detection_count = 0;
        }
    }

    /// Adjust sight counters when an observer gains or loses hexes
    pub fn update_sight_counts<'a>(
        &mut self,
        lost: impl IntoIterator<Item = &'a HexCoord>,
        gained: impl IntoIterator<Item = &'a HexCoord>,
        radar: bool,
    ) {
        for coord in lost {
            if let Some(cell) = self.cells.get_mut(coord) {
                let counter = if radar {
                    &mut cell.detection_count
                } else {
                    &mut cell.sight_count
                };
                *counter = counter.saturating_sub(1);
            }
        }
        for coord in gained {
            if let Some(cell) = self.cells.get_mut(coord) {
                if radar {
                    cell.detection_count += 1;
                } else {
                    cell.sight_count += 1;
                }
            }
        }
    }
}
