//! Battle system constants - rules of the board that are not tunables

// Movement costs
pub const IMPASSABLE_COMBINED_COST: u32 = 6;
pub const STEP_COST_OFFSET: u32 = 2;
pub const FLYER_STEP_COST: u32 = 1;

// Visibility: rays cast per hex of range (ring r holds 6r hexes)
pub const RAYS_PER_RANGE: u32 = 6;

// Rays run half a hex past the last ring so its centres are reached
pub const RAY_OVERSHOOT: f32 = 0.5;
