//! Test fixtures and helpers.
//!
//! Pre-built boards and unit placements for consistent testing.

use army_core::components::{Behavior, EntityId};
use army_core::factions::FactionId;
use army_core::math::{all_cells, GridPos};
use army_core::simulation::Simulation;
use army_core::world::World;

/// A simulation holding only the two cities, created at time zero.
#[must_use]
pub fn empty_board(seed: u64) -> Simulation {
    Simulation::bare(seed, 0)
}

/// Insert a unit with an explicit behavior and return its ID.
pub fn place(sim: &mut Simulation, faction: FactionId, pos: GridPos, behavior: Behavior) -> EntityId {
    sim.world_mut().insert_unit(faction, pos, behavior)
}

/// Slot of the entity with `id`.
///
/// # Panics
///
/// Panics if the entity does not exist.
#[must_use]
pub fn slot(world: &World, id: EntityId) -> usize {
    world
        .entities()
        .slot_of(id)
        .unwrap_or_else(|| panic!("entity {id} not found"))
}

/// Cover every free cell except `keep` with trees.
pub fn fill_board_except(sim: &mut Simulation, keep: &[GridPos]) {
    let world = sim.world_mut();
    for cell in all_cells() {
        if !keep.contains(&cell) && !world.is_occupied(cell) {
            world.place_tree(cell);
        }
    }
}

/// Current position of the unit with `id`, or `None` once purged.
#[must_use]
pub fn position(sim: &Simulation, id: EntityId) -> Option<GridPos> {
    sim.world().unit_by_id(id).map(|u| u.position)
}

/// Current health of the unit with `id`, or `None` once purged.
#[must_use]
pub fn health(sim: &Simulation, id: EntityId) -> Option<u32> {
    sim.world().unit_by_id(id).map(|u| u.health.current)
}
