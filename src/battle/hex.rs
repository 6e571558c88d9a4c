//! Hex coordinate system for battle grids
//!
//! Pointy-top hexes in a row-offset layout: `(x, y)` is (column, row) and
//! odd rows sit half a hex to the right. Ray casting works in a continuous
//! plane where neighbouring hex centres are exactly 1.0 apart.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Vertical distance between row centres (sqrt(3) / 2)
const ROW_HEIGHT: f32 = 0.866_025_4;

/// Hex coordinate on a battle grid
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    pub x: i32,
    pub y: i32,
}

impl HexCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn is_odd_row(&self) -> bool {
        self.y & 1 == 1
    }

    /// Distance in hex steps
    ///
    /// `max(dx - dy/2, 0) + dy`: crossing `dy` rows buys up to `dy/2` columns
    /// for free. For odd `dy` the extra half column goes right when starting
    /// on an odd row and left when starting on an even row.
    pub fn distance(&self, other: &Self) -> u32 {
        let dx = other.x - self.x;
        let dy = (other.y - self.y).abs();
        let half = dy / 2;
        let allowance = if dy % 2 == 1 {
            let toward_shift = if self.is_odd_row() { dx > 0 } else { dx < 0 };
            if toward_shift {
                half + 1
            } else {
                half
            }
        } else {
            half
        };
        ((dx.abs() - allowance).max(0) + dy) as u32
    }

    /// Get all 6 neighbouring hex coordinates
    pub fn neighbors(&self) -> [HexCoord; 6] {
        let (x, y) = (self.x, self.y);
        if self.is_odd_row() {
            [
                HexCoord::new(x + 1, y),
                HexCoord::new(x + 1, y - 1),
                HexCoord::new(x, y - 1),
                HexCoord::new(x - 1, y),
                HexCoord::new(x, y + 1),
                HexCoord::new(x + 1, y + 1),
            ]
        } else {
            [
                HexCoord::new(x + 1, y),
                HexCoord::new(x, y - 1),
                HexCoord::new(x - 1, y - 1),
                HexCoord::new(x - 1, y),
                HexCoord::new(x - 1, y + 1),
                HexCoord::new(x, y + 1),
            ]
        }
    }

    /// Centre of this hex in the continuous plane
    pub fn center(&self) -> Vec2 {
        let shift = if self.is_odd_row() { 0.5 } else { 0.0 };
        Vec2::new(self.x as f32 + shift, self.y as f32 * ROW_HEIGHT)
    }

    /// Hex containing a point of the continuous plane
    pub fn from_point(point: Vec2) -> Self {
        let r = point.y / ROW_HEIGHT;
        let q = point.x - r / 2.0;
        let (q, r) = Self::round_axial(q, r);
        Self::from_axial(q, r)
    }

    /// Axial (q, r) form of this coordinate
    pub fn to_axial(&self) -> (i32, i32) {
        (self.x - (self.y - (self.y & 1)) / 2, self.y)
    }

    /// Coordinate from axial (q, r)
    pub fn from_axial(q: i32, r: i32) -> Self {
        Self::new(q + (r - (r & 1)) / 2, r)
    }

    /// Round fractional axial coordinates to the nearest hex
    fn round_axial(q: f32, r: f32) -> (i32, i32) {
        let s = -q - r;
        let mut rq = q.round();
        let mut rr = r.round();
        let rs = s.round();

        let q_diff = (rq - q).abs();
        let r_diff = (rr - r).abs();
        let s_diff = (rs - s).abs();

        if q_diff > r_diff && q_diff > s_diff {
            rq = -rr - rs;
        } else if r_diff > s_diff {
            rr = -rq - rs;
        }

        (rq as i32, rr as i32)
    }

    /// Get all hexes within range (inclusive), ignoring grid bounds
    pub fn hexes_in_range(&self, range: u32) -> Vec<HexCoord> {
        let (cq, cr) = self.to_axial();
        let range = range as i32;
        let mut results = Vec::new();
        for dq in -range..=range {
            for dr in (-range).max(-dq - range)..=range.min(-dq + range) {
                results.push(HexCoord::from_axial(cq + dq, cr + dr));
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cube_distance(a: HexCoord, b: HexCoord) -> u32 {
        let (q1, r1) = a.to_axial();
        let (q2, r2) = b.to_axial();
        let dq = q1 - q2;
        let dr = r1 - r2;
        ((dq.abs() + dr.abs() + (dq + dr).abs()) / 2) as u32
    }

    #[test]
    fn test_hex_coord_creation() {
        let coord = HexCoord::new(5, 10);
        assert_eq!(coord.x, 5);
        assert_eq!(coord.y, 10);
    }

    #[test]
    fn test_hex_distance_same() {
        let a = HexCoord::new(3, 4);
        assert_eq!(a.distance(&a), 0);
    }

    #[test]
    fn test_every_neighbor_is_adjacent() {
        for origin in [HexCoord::new(4, 4), HexCoord::new(4, 5), HexCoord::new(-3, -1)] {
            for neighbor in origin.neighbors() {
                assert_eq!(origin.distance(&neighbor), 1, "{:?} -> {:?}", origin, neighbor);
                assert_eq!(neighbor.distance(&origin), 1);
            }
        }
    }

    #[test]
    fn test_row_parity_matters() {
        // From an even row the lower-right hex is two steps away
        assert_eq!(HexCoord::new(0, 0).distance(&HexCoord::new(1, 1)), 2);
        // From an odd row it is adjacent
        assert_eq!(HexCoord::new(0, 1).distance(&HexCoord::new(1, 2)), 1);
    }

    #[test]
    fn test_neighbor_centers_unit_apart() {
        let origin = HexCoord::new(2, 3);
        for neighbor in origin.neighbors() {
            let d = origin.center().distance(neighbor.center());
            assert!((d - 1.0).abs() < 1e-4, "{:?} at {}", neighbor, d);
        }
    }

    #[test]
    fn test_center_round_trips() {
        for coord in HexCoord::new(0, 0).hexes_in_range(4) {
            assert_eq!(HexCoord::from_point(coord.center()), coord);
        }
    }

    #[test]
    fn test_hexes_in_range() {
        let center = HexCoord::new(0, 0);
        assert_eq!(center.hexes_in_range(1).len(), 7);
        assert_eq!(center.hexes_in_range(3).len(), 37);
        assert!(center
            .hexes_in_range(3)
            .iter()
            .all(|h| center.distance(h) <= 3));
    }

    proptest! {
        #[test]
        fn prop_distance_symmetric(
            x1 in -40i32..40, y1 in -40i32..40,
            x2 in -40i32..40, y2 in -40i32..40,
        ) {
            let a = HexCoord::new(x1, y1);
            let b = HexCoord::new(x2, y2);
            prop_assert_eq!(a.distance(&b), b.distance(&a));
        }

        #[test]
        fn prop_distance_matches_cube_metric(
            x1 in -40i32..40, y1 in -40i32..40,
            x2 in -40i32..40, y2 in -40i32..40,
        ) {
            let a = HexCoord::new(x1, y1);
            let b = HexCoord::new(x2, y2);
            prop_assert_eq!(a.distance(&b), cube_distance(a, b));
        }

        #[test]
        fn prop_triangle_inequality(
            x1 in -20i32..20, y1 in -20i32..20,
            x2 in -20i32..20, y2 in -20i32..20,
            x3 in -20i32..20, y3 in -20i32..20,
        ) {
            let a = HexCoord::new(x1, y1);
            let b = HexCoord::new(x2, y2);
            let c = HexCoord::new(x3, y3);
            prop_assert!(a.distance(&c) <= a.distance(&b) + b.distance(&c));
        }

        #[test]
        fn prop_zero_only_for_identity(
            x1 in -40i32..40, y1 in -40i32..40,
            x2 in -40i32..40, y2 in -40i32..40,
        ) {
            let a = HexCoord::new(x1, y1);
            let b = HexCoord::new(x2, y2);
            prop_assert_eq!(a.distance(&b) == 0, a == b);
        }
    }
}
