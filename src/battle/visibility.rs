//! Ray-cast visibility and targeting
//!
//! Rays leave the origin hex centre and are sampled every `ray_step` hex
//! widths. A ray stops at the first hex the caller's block predicate
//! rejects (that hex is still reported) or once it leaves range or grid.

use std::f32::consts::TAU;

use ahash::AHashSet;
use glam::Vec2;

use crate::battle::constants::{RAYS_PER_RANGE, RAY_OVERSHOOT};
use crate::battle::grid::{HexCell, HexGrid};
use crate::battle::hex::HexCoord;
use crate::battle::templates::DeliveryMethod;

/// What an observer currently sees and detects
#[derive(Debug, Clone, Default)]
pub struct SightSets {
    /// Hexes in line of sight
    pub seen: AHashSet<HexCoord>,
    /// Hexes covered by radar (ignores obstructions)
    pub detected: AHashSet<HexCoord>,
}

impl SightSets {
    pub fn is_seen(&self, coord: HexCoord) -> bool {
        self.seen.contains(&coord)
    }

    pub fn is_detected(&self, coord: HexCoord) -> bool {
        self.detected.contains(&coord)
    }

    /// Seen, or detected when radar contacts count
    pub fn is_visible(&self, coord: HexCoord, use_radar: bool) -> bool {
        self.is_seen(coord) || (use_radar && self.is_detected(coord))
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.detected.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RayStep {
    Continue,
    Stop,
}

/// Walk one ray from `origin`, visiting each new hex it enters
fn walk_ray<F>(
    grid: &HexGrid,
    origin: HexCoord,
    direction: Vec2,
    max_range: u32,
    ray_step: f32,
    mut visit: F,
) where
    F: FnMut(HexCoord, &HexCell, u32) -> RayStep,
{
    let start = origin.center();
    let length = max_range as f32 + RAY_OVERSHOOT;
    let samples = (length / ray_step).ceil() as u32;
    let mut last = origin;

    for i in 1..=samples {
        let coord = HexCoord::from_point(start + direction * (i as f32 * ray_step));
        if coord == last {
            continue;
        }
        last = coord;

        let distance = origin.distance(&coord);
        if distance > max_range {
            break;
        }
        let Some(cell) = grid.cell(coord) else {
            break;
        };
        if visit(coord, cell, distance) == RayStep::Stop {
            break;
        }
    }
}

/// Hexes within `[min_range, max_range]` reached by rays from `origin`
///
/// `include` picks which reached hexes are reported; `block` stops a ray
/// after the hex it rejects. The origin counts at distance 0.
pub fn resolve_in_range<I, B>(
    grid: &HexGrid,
    origin: HexCoord,
    min_range: u32,
    max_range: u32,
    ray_step: f32,
    include: I,
    block: B,
) -> AHashSet<HexCoord>
where
    I: Fn(&HexCell) -> bool,
    B: Fn(&HexCell) -> bool,
{
    let mut found = AHashSet::new();
    let Some(origin_cell) = grid.cell(origin) else {
        return found;
    };
    if min_range == 0 && include(origin_cell) {
        found.insert(origin);
    }
    if max_range == 0 || min_range > max_range {
        return found;
    }

    let rays = RAYS_PER_RANGE * max_range;
    for i in 0..rays {
        let angle = TAU * i as f32 / rays as f32;
        let direction = Vec2::new(angle.cos(), angle.sin());
        walk_ray(grid, origin, direction, max_range, ray_step, |coord, cell, distance| {
            if distance >= min_range && include(cell) {
                found.insert(coord);
            }
            if block(cell) {
                RayStep::Stop
            } else {
                RayStep::Continue
            }
        });
    }

    found
}

/// Can something at `origin` deliver an effect onto `target`?
///
/// Range is always checked. Direct delivery also casts a single ray toward
/// the target centre and fails if `block` stops it first.
#[allow(clippy::too_many_arguments)]
pub fn can_target<B>(
    grid: &HexGrid,
    origin: HexCoord,
    target: HexCoord,
    delivery: DeliveryMethod,
    min_range: u32,
    max_range: u32,
    ray_step: f32,
    block: B,
) -> bool
where
    B: Fn(&HexCell) -> bool,
{
    if !grid.contains(origin) || !grid.contains(target) {
        return false;
    }
    let distance = origin.distance(&target);
    if distance < min_range || distance > max_range {
        return false;
    }

    match delivery {
        DeliveryMethod::Unobstructed => true,
        DeliveryMethod::Direct => {
            if origin == target {
                return true;
            }
            let direction = (target.center() - origin.center()).normalize();
            let mut reached = false;
            walk_ray(grid, origin, direction, distance, ray_step, |coord, cell, _| {
                if coord == target {
                    reached = true;
                    return RayStep::Stop;
                }
                if block(cell) {
                    RayStep::Stop
                } else {
                    RayStep::Continue
                }
            });
            reached
        }
    }
}
