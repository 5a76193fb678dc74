//! Single-step greedy grid movement.
//!
//! Units move at most one cell per tick. Moving toward a target tries the
//! diagonal first, then the horizontal and vertical components, then the
//! eight neighbours in a fixed order. There is no lookahead, so two units
//! trying to pass through each other can block one another indefinitely.
//!
//! The step functions are pure: they take a predicate that says whether a
//! cell is free, which keeps them testable without a world.

use crate::math::GridPos;
use crate::world::World;

/// Neighbour offsets tried when every direct step is blocked.
pub const FALLBACK_STEPS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
];

/// Next cell on the way from `from` to `target`, or `None` to stay put.
pub fn step_toward(
    from: GridPos,
    target: GridPos,
    is_free: impl Fn(GridPos) -> bool,
) -> Option<GridPos> {
    if from == target {
        return None;
    }
    let (dx, dy) = from.step_toward(target);

    if dx != 0 && dy != 0 {
        let diagonal = from.offset(dx, dy);
        if is_free(diagonal) {
            return Some(diagonal);
        }
    }
    if dx != 0 {
        let horizontal = from.offset(dx, 0);
        if is_free(horizontal) {
            return Some(horizontal);
        }
    }
    if dy != 0 {
        let vertical = from.offset(0, dy);
        if is_free(vertical) {
            return Some(vertical);
        }
    }

    FALLBACK_STEPS
        .iter()
        .map(|&(fx, fy)| from.offset(fx, fy))
        .find(|cell| is_free(*cell))
}

/// Next cell directly away from `threat`, horizontal before vertical.
pub fn step_away(
    from: GridPos,
    threat: GridPos,
    is_free: impl Fn(GridPos) -> bool,
) -> Option<GridPos> {
    let (tx, ty) = from.step_toward(threat);
    let (ax, ay) = (-tx, -ty);

    if ax != 0 {
        let horizontal = from.offset(ax, 0);
        if is_free(horizontal) {
            return Some(horizontal);
        }
    }
    if ay != 0 {
        let vertical = from.offset(0, ay);
        if is_free(vertical) {
            return Some(vertical);
        }
    }
    None
}

/// Move the unit at `slot` one step toward `target`. Returns whether it moved.
pub fn move_toward(world: &mut World, slot: usize, target: GridPos) -> bool {
    let Some(from) = world.entities.unit(slot).map(|u| u.position) else {
        return false;
    };
    let next = step_toward(from, target, |cell| world.is_move_valid(cell));
    apply_step(world, slot, next)
}

/// Move the unit at `slot` one step away from `threat`. Returns whether it moved.
pub fn move_away(world: &mut World, slot: usize, threat: GridPos) -> bool {
    let Some(from) = world.entities.unit(slot).map(|u| u.position) else {
        return false;
    };
    let next = step_away(from, threat, |cell| world.is_move_valid(cell));
    apply_step(world, slot, next)
}

fn apply_step(world: &mut World, slot: usize, next: Option<GridPos>) -> bool {
    match (next, world.entities.unit_mut(slot)) {
        (Some(cell), Some(unit)) => {
            unit.position = cell;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{COLS, ROWS};
    use proptest::prelude::*;

    fn open(cell: GridPos) -> bool {
        cell.is_valid()
    }

    #[test]
    fn test_diagonal_first() {
        let next = step_toward(GridPos::new(2, 2), GridPos::new(5, 6), open);
        assert_eq!(next, Some(GridPos::new(3, 3)));
    }

    #[test]
    fn test_horizontal_then_vertical_when_diagonal_blocked() {
        let from = GridPos::new(2, 2);
        let target = GridPos::new(5, 6);
        let blocked = [GridPos::new(3, 3)];
        let next = step_toward(from, target, |c| open(c) && !blocked.contains(&c));
        assert_eq!(next, Some(GridPos::new(3, 2)));

        let blocked = [GridPos::new(3, 3), GridPos::new(3, 2)];
        let next = step_toward(from, target, |c| open(c) && !blocked.contains(&c));
        assert_eq!(next, Some(GridPos::new(2, 3)));
    }

    #[test]
    fn test_fallback_order() {
        let from = GridPos::new(5, 5);
        let target = GridPos::new(8, 5);
        // Only the direct horizontal step is blocked: fallback starts at (-1, 0).
        let blocked = [GridPos::new(6, 5)];
        let next = step_toward(from, target, |c| open(c) && !blocked.contains(&c));
        assert_eq!(next, Some(GridPos::new(4, 5)));
    }

    #[test]
    fn test_fully_blocked_stays() {
        let next = step_toward(GridPos::new(5, 5), GridPos::new(9, 9), |_| false);
        assert_eq!(next, None);
    }

    #[test]
    fn test_at_target_stays() {
        assert_eq!(step_toward(GridPos::new(5, 5), GridPos::new(5, 5), open), None);
    }

    #[test]
    fn test_step_away_prefers_horizontal() {
        let next = step_away(GridPos::new(5, 5), GridPos::new(4, 4), open);
        assert_eq!(next, Some(GridPos::new(6, 5)));
        let blocked = [GridPos::new(6, 5)];
        let next = step_away(GridPos::new(5, 5), GridPos::new(4, 4), |c| {
            open(c) && !blocked.contains(&c)
        });
        assert_eq!(next, Some(GridPos::new(5, 6)));
    }

    #[test]
    fn test_step_away_same_column_moves_vertically_only() {
        let next = step_away(GridPos::new(5, 5), GridPos::new(5, 3), open);
        assert_eq!(next, Some(GridPos::new(5, 6)));
        let next = step_away(GridPos::new(5, 19), GridPos::new(5, 17), open);
        assert_eq!(next, None);
    }

    proptest! {
        #[test]
        fn prop_step_is_one_cell_and_valid(
            fx in 0..ROWS, fy in 0..COLS,
            tx in 0..ROWS, ty in 0..COLS,
        ) {
            let from = GridPos::new(fx, fy);
            let target = GridPos::new(tx, ty);
            if let Some(next) = step_toward(from, target, open) {
                prop_assert!(next.is_valid());
                prop_assert!(from.is_adjacent(next));
                prop_assert_ne!(next, from);
            }
        }

        #[test]
        fn prop_unobstructed_step_gets_closer(
            fx in 0..ROWS, fy in 0..COLS,
            tx in 0..ROWS, ty in 0..COLS,
        ) {
            let from = GridPos::new(fx, fy);
            let target = GridPos::new(tx, ty);
            if let Some(next) = step_toward(from, target, open) {
                prop_assert!(next.distance_squared(target) < from.distance_squared(target));
            }
        }
    }
}
