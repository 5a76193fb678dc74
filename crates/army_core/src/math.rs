//! Grid coordinates and fixed-point math for deterministic simulation.
//!
//! The battlefield is a square grid of [`ROWS`] x [`COLS`] cells. Positions
//! are integer cells; everything that would otherwise need floating point
//! (damage multipliers, Euclidean distance magnitudes) goes through
//! [`Fixed`] so that results are identical on every platform.
//!
//! "Closest" comparisons use [`GridPos::distance_squared`]. Squaring is
//! monotonic on non-negative values, so the ordering and any integer
//! threshold check (`d <= 2` is `d² <= 4`) match the Euclidean metric
//! exactly without a square root.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Number of grid rows (valid `x` range is `0..ROWS`).
pub const ROWS: i32 = 20;

/// Number of grid columns (valid `y` range is `0..COLS`).
pub const COLS: i32 = 20;

/// A cell on the battlefield grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    /// Row coordinate.
    pub x: i32,
    /// Column coordinate.
    pub y: i32,
}

impl GridPos {
    /// Reserved coordinate for entities removed from play.
    pub const OFF_MAP: Self = Self { x: -2, y: -2 };

    /// Create a new grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Whether this cell lies inside the grid.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        is_position_valid(self.x, self.y)
    }

    /// Whether this is the off-map sentinel.
    #[must_use]
    pub const fn is_off_map(self) -> bool {
        self.x == Self::OFF_MAP.x && self.y == Self::OFF_MAP.y
    }

    /// Squared Euclidean distance to another cell.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another cell.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(Fixed::from_num(self.distance_squared(other)))
    }

    /// Whether `other` is within Euclidean distance `radius` (inclusive).
    #[must_use]
    pub const fn within(self, other: Self, radius: i64) -> bool {
        self.distance_squared(other) <= radius * radius
    }

    /// 8-neighbour adjacency (Chebyshev distance of at most one).
    ///
    /// A cell counts as adjacent to itself.
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }

    /// Signed unit step (-1, 0 or 1 per axis) from `self` toward `target`.
    #[must_use]
    pub const fn step_toward(self, target: Self) -> (i32, i32) {
        ((target.x - self.x).signum(), (target.y - self.y).signum())
    }

    /// This position shifted by a delta.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// True iff `0 <= x < ROWS` and `0 <= y < COLS`.
#[must_use]
pub const fn is_position_valid(x: i32, y: i32) -> bool {
    x >= 0 && x < ROWS && y >= 0 && y < COLS
}

/// Every grid cell in row-major order.
pub fn all_cells() -> impl Iterator<Item = GridPos> {
    (0..ROWS).flat_map(|x| (0..COLS).map(move |y| GridPos::new(x, y)))
}

/// Computes the square root of a fixed-point number using binary search.
fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_position_validity_bounds() {
        assert!(is_position_valid(0, 0));
        assert!(is_position_valid(ROWS - 1, COLS - 1));
        assert!(!is_position_valid(-1, 0));
        assert!(!is_position_valid(0, COLS));
        assert!(!GridPos::OFF_MAP.is_valid());
    }

    #[test]
    fn test_distance_is_euclidean() {
        let a = GridPos::new(0, 0);
        let b = GridPos::new(3, 4);
        assert_eq!(a.distance_squared(b), 25);
        let d = a.distance(b);
        let epsilon = Fixed::from_num(1) / Fixed::from_num(10000);
        assert!((d - Fixed::from_num(5)).abs() < epsilon, "got {d:?}");
    }

    #[test]
    fn test_adjacency_is_chebyshev() {
        let c = GridPos::new(5, 5);
        assert!(c.is_adjacent(GridPos::new(6, 6)));
        assert!(c.is_adjacent(GridPos::new(4, 5)));
        assert!(!c.is_adjacent(GridPos::new(7, 5)));
        assert!(!c.is_adjacent(GridPos::new(6, 7)));
    }

    #[test]
    fn test_within_matches_threshold() {
        let a = GridPos::new(0, 0);
        assert!(a.within(GridPos::new(2, 0), 2));
        // sqrt(5) > 2
        assert!(!a.within(GridPos::new(2, 1), 2));
        assert!(a.within(GridPos::new(1, 1), 2));
    }

    #[test]
    fn test_all_cells_covers_grid() {
        let cells: Vec<_> = all_cells().collect();
        assert_eq!(cells.len(), (ROWS * COLS) as usize);
        assert_eq!(cells[0], GridPos::new(0, 0));
        assert_eq!(cells[1], GridPos::new(0, 1));
        assert!(cells.iter().all(|c| c.is_valid()));
    }

    proptest! {
        #[test]
        fn prop_distance_ordering_matches_squared(
            ax in 0..ROWS, ay in 0..COLS,
            bx in 0..ROWS, by in 0..COLS,
            cx in 0..ROWS, cy in 0..COLS,
        ) {
            let a = GridPos::new(ax, ay);
            let b = GridPos::new(bx, by);
            let c = GridPos::new(cx, cy);
            if a.distance_squared(b) < a.distance_squared(c) {
                prop_assert!(a.distance(b) <= a.distance(c));
            }
        }

        #[test]
        fn prop_step_toward_is_unit(
            ax in 0..ROWS, ay in 0..COLS,
            bx in 0..ROWS, by in 0..COLS,
        ) {
            let (dx, dy) = GridPos::new(ax, ay).step_toward(GridPos::new(bx, by));
            prop_assert!(dx.abs() <= 1 && dy.abs() <= 1);
        }
    }
}
