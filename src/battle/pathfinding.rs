//! A* pathfinding and movement-range search on the battle grid
//!
//! Step costs come from `HexGrid::traversal_cost`: terrain plus mobility,
//! with occupied hexes impassable. Open-set ties on f are broken by the
//! lower heuristic, then by insertion order, so searches are repeatable.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use ahash::AHashMap;

use crate::battle::grid::HexGrid;
use crate::battle::hex::HexCoord;
use crate::battle::terrain::MovementType;
use crate::core::error::{Result, TacticsError};

/// Node in the open set
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathNode {
    coord: HexCoord,
    f_cost: u32, // g_cost + heuristic
    h_cost: u32,
    sequence: u64,
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.h_cost.cmp(&self.h_cost))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Admissible heuristic: every step costs at least 1
pub fn hex_distance(from: HexCoord, to: HexCoord) -> u32 {
    from.distance(&to)
}

/// Turns A* into Dijkstra
pub fn zero_heuristic(_from: HexCoord, _to: HexCoord) -> u32 {
    0
}

/// A hex reachable within a movement budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachable {
    pub cost: u32,
    /// Includes the start hex
    pub path: Vec<HexCoord>,
}

/// Cheapest path from `start` to an unoccupied `goal`
///
/// The returned path includes both ends. `start == goal` yields `[start]`.
pub fn find_path<H>(
    grid: &HexGrid,
    start: HexCoord,
    goal: HexCoord,
    movement: MovementType,
    heuristic: H,
) -> Result<Vec<HexCoord>>
where
    H: Fn(HexCoord, HexCoord) -> u32,
{
    search(grid, start, goal, movement, heuristic, false)
}

/// Like `find_path`, but the goal may hold an occupant
///
/// Used to measure how far away an occupied hex (usually an enemy) is on
/// foot. The goal's terrain still has to be passable.
pub fn find_approach_path<H>(
    grid: &HexGrid,
    start: HexCoord,
    goal: HexCoord,
    movement: MovementType,
    heuristic: H,
) -> Result<Vec<HexCoord>>
where
    H: Fn(HexCoord, HexCoord) -> u32,
{
    search(grid, start, goal, movement, heuristic, true)
}

fn search<H>(
    grid: &HexGrid,
    start: HexCoord,
    goal: HexCoord,
    movement: MovementType,
    heuristic: H,
    ignore_goal_occupant: bool,
) -> Result<Vec<HexCoord>>
where
    H: Fn(HexCoord, HexCoord) -> u32,
{
    let no_path = || TacticsError::NoPathExists {
        from: start,
        to: goal,
    };

    if !grid.contains(start) || !grid.contains(goal) {
        return Err(no_path());
    }
    if start == goal {
        return Ok(vec![start]);
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<HexCoord, HexCoord> = AHashMap::new();
    let mut g_scores: AHashMap<HexCoord, u32> = AHashMap::new();
    let mut sequence = 0u64;

    let h = heuristic(start, goal);
    g_scores.insert(start, 0);
    open_set.push(PathNode {
        coord: start,
        f_cost: h,
        h_cost: h,
        sequence,
    });

    while let Some(current) = open_set.pop() {
        if current.coord == goal {
            return Ok(reconstruct_path(&came_from, goal));
        }

        let current_g = g_scores.get(&current.coord).copied().unwrap_or(u32::MAX);
        // Stale entry superseded by a cheaper push
        if current.f_cost > current_g.saturating_add(current.h_cost) {
            continue;
        }

        for neighbor in current.coord.neighbors() {
            let step = if ignore_goal_occupant && neighbor == goal {
                grid.terrain_step_cost(neighbor, movement)
            } else {
                grid.traversal_cost(neighbor, movement)
            };
            let Some(step) = step else {
                continue;
            };

            let tentative_g = current_g + step;
            let neighbor_g = g_scores.get(&neighbor).copied().unwrap_or(u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.coord);
                g_scores.insert(neighbor, tentative_g);

                let h = heuristic(neighbor, goal);
                sequence += 1;
                open_set.push(PathNode {
                    coord: neighbor,
                    f_cost: tentative_g + h,
                    h_cost: h,
                    sequence,
                });
            }
        }
    }

    Err(no_path())
}

/// Every hex reachable from `start` for at most `budget`
///
/// The start hex itself is not included. Only nodes cheaper than the
/// budget are expanded, so every result has `cost <= budget`.
pub fn find_all_reachable(
    grid: &HexGrid,
    start: HexCoord,
    budget: u32,
    movement: MovementType,
) -> BTreeMap<HexCoord, Reachable> {
    let mut reachable = BTreeMap::new();
    if !grid.contains(start) {
        return reachable;
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<HexCoord, HexCoord> = AHashMap::new();
    let mut g_scores: AHashMap<HexCoord, u32> = AHashMap::new();
    let mut sequence = 0u64;

    g_scores.insert(start, 0);
    open_set.push(PathNode {
        coord: start,
        f_cost: 0,
        h_cost: 0,
        sequence,
    });

    while let Some(current) = open_set.pop() {
        let current_g = g_scores.get(&current.coord).copied().unwrap_or(u32::MAX);
        if current.f_cost > current_g || current_g >= budget {
            continue;
        }

        for neighbor in current.coord.neighbors() {
            let Some(step) = grid.traversal_cost(neighbor, movement) else {
                continue;
            };
            let tentative_g = current_g + step;
            if tentative_g > budget {
                continue;
            }
            let neighbor_g = g_scores.get(&neighbor).copied().unwrap_or(u32::MAX);
            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.coord);
                g_scores.insert(neighbor, tentative_g);
                sequence += 1;
                open_set.push(PathNode {
                    coord: neighbor,
                    f_cost: tentative_g,
                    h_cost: 0,
                    sequence,
                });
            }
        }
    }

    for (coord, cost) in g_scores {
        if coord == start {
            continue;
        }
        reachable.insert(
            coord,
            Reachable {
                cost,
                path: reconstruct_path(&came_from, coord),
            },
        );
    }
    reachable
}

/// Reconstruct path from came_from map
fn reconstruct_path(
    came_from: &AHashMap<HexCoord, HexCoord>,
    mut current: HexCoord,
) -> Vec<HexCoord> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Terrain cost of walking a path (the first hex is free)
///
/// Occupants are ignored; `None` if any step is impassable terrain.
pub fn path_cost(grid: &HexGrid, path: &[HexCoord], movement: MovementType) -> Option<u32> {
    path.iter()
        .skip(1)
        .map(|coord| grid.terrain_step_cost(*coord, movement))
        .sum()
}
