//! Mutable world state shared by every unit during a tick.
//!
//! [`World`] owns the entity list, the seeded RNG, the clock reading for
//! the current tick, and the counters every unit reads and writes.
//! Behaviors receive `&mut World` and read or mutate it in unit-list order.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::components::{
    Archetype, Behavior, EntityId, Unit, CAVALRY_INITIAL_SAFETY_DISTANCE,
};
use crate::economy::{City, Tree, TREE_SPAWN_CHANCE};
use crate::entities::{Entity, EntityStorage, Flag, PhilosophicalStone, INITIAL_STONE_COUNT};
use crate::error::{GameError, Result};
use crate::factions::FactionId;
use crate::math::{all_cells, GridPos};

/// Counters shared by all units across a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedCounters {
    /// When the most recent tree was felled; cleared once trees regrow.
    pub last_tree_felled_ms: Option<u64>,
    /// When the most recent flag was captured (world creation until then).
    pub last_flag_capture_ms: u64,
    /// Current cavalry spacing, shared by both factions.
    pub cavalry_safety_distance: u32,
    /// Whether any cavalry fought a deserter this tick.
    pub cavalry_combat_occurred: bool,
}

impl SharedCounters {
    /// Fresh counters for a world created at `now_ms`.
    #[must_use]
    pub const fn new(now_ms: u64) -> Self {
        Self {
            last_tree_felled_ms: None,
            last_flag_capture_ms: now_ms,
            cavalry_safety_distance: CAVALRY_INITIAL_SAFETY_DISTANCE,
            cavalry_combat_occurred: false,
        }
    }
}

/// Entities, randomness, clock and shared counters.
#[derive(Debug, Clone)]
pub struct World {
    pub(crate) entities: EntityStorage,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) counters: SharedCounters,
    pub(crate) pending_removal: Vec<EntityId>,
    pub(crate) now_ms: u64,
}

impl World {
    /// A world holding only the two cities.
    #[must_use]
    pub fn new(seed: u64, now_ms: u64) -> Self {
        let mut world = Self {
            entities: EntityStorage::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            counters: SharedCounters::new(now_ms),
            pending_removal: Vec::new(),
            now_ms,
        };
        world.place_cities();
        world
    }

    /// Reset to a world holding only the two cities, keeping the RNG stream.
    pub(crate) fn reset(&mut self, now_ms: u64) {
        self.entities = EntityStorage::new();
        self.counters = SharedCounters::new(now_ms);
        self.pending_removal.clear();
        self.now_ms = now_ms;
        self.place_cities();
    }

    fn place_cities(&mut self) {
        let now_ms = self.now_ms;
        for faction in FactionId::ALL {
            self.entities
                .insert(|id| Entity::City(City::new(id, faction, now_ms)));
        }
    }

    /// Scatter trees over free cells and drop the initial stones.
    pub fn populate(&mut self) -> Result<()> {
        for cell in all_cells() {
            if !self.entities.is_occupied(cell) && self.rng.gen_bool(TREE_SPAWN_CHANCE) {
                self.place_tree(cell);
            }
        }
        for _ in 0..INITIAL_STONE_COUNT {
            let pos = self.random_free_position()?;
            self.place_stone(pos);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// All entities in insertion order.
    #[must_use]
    pub fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Shared counters.
    #[must_use]
    pub fn counters(&self) -> &SharedCounters {
        &self.counters
    }

    /// Mutable shared counters, for scenario setup.
    pub fn counters_mut(&mut self) -> &mut SharedCounters {
        &mut self.counters
    }

    /// Clock reading of the tick in progress (or the last one).
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// The unit with `id`.
    #[must_use]
    pub fn unit_by_id(&self, id: EntityId) -> Option<&Unit> {
        match self.entities.by_id(id) {
            Some(Entity::Unit(u)) => Some(u),
            _ => None,
        }
    }

    /// The unit with `id`, mutably.
    pub fn unit_by_id_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        let slot = self.entities.slot_of(id)?;
        self.entities.unit_mut(slot)
    }

    /// The city owned by `faction`.
    #[must_use]
    pub fn city(&self, faction: FactionId) -> Option<&City> {
        self.entities.city(faction)
    }

    /// The city owned by `faction`, mutably.
    pub fn city_mut(&mut self, faction: FactionId) -> Option<&mut City> {
        self.entities.city_mut(faction)
    }

    // ------------------------------------------------------------------
    // Grid queries
    // ------------------------------------------------------------------

    /// Inside the grid and not blocked by any entity.
    #[must_use]
    pub fn is_move_valid(&self, pos: GridPos) -> bool {
        pos.is_valid() && !self.entities.is_occupied(pos)
    }

    /// Whether any entity blocks `pos`.
    #[must_use]
    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.entities.is_occupied(pos)
    }

    /// A uniformly shuffled pick among unoccupied cells.
    pub fn random_free_position(&mut self) -> Result<GridPos> {
        let mut cells: Vec<GridPos> = all_cells().collect();
        cells.shuffle(&mut self.rng);
        cells
            .into_iter()
            .find(|cell| !self.entities.is_occupied(*cell))
            .ok_or(GameError::NoAvailablePosition)
    }

    /// Living units with their slots, in unit-list order.
    pub fn living_units(&self) -> impl Iterator<Item = (usize, &Unit)> {
        self.entities.units().filter(|(_, u)| u.is_alive())
    }

    /// Nearest living unit to `from` matching `filter`.
    ///
    /// Ties go to the unit earliest in unit-list order.
    pub fn nearest_unit(&self, from: GridPos, filter: impl Fn(&Unit) -> bool) -> Option<usize> {
        self.living_units()
            .filter(|(_, u)| filter(u))
            .min_by_key(|(_, u)| from.distance_squared(u.position))
            .map(|(slot, _)| slot)
    }

    /// Nearest visible tree that still holds wood.
    #[must_use]
    pub fn nearest_harvestable_tree(&self, from: GridPos) -> Option<usize> {
        self.entities
            .trees()
            .filter(|(_, t)| t.is_harvestable())
            .min_by_key(|(_, t)| from.distance_squared(t.position))
            .map(|(slot, _)| slot)
    }

    /// Nearest flag that has not been captured yet.
    #[must_use]
    pub fn nearest_open_flag(&self, from: GridPos) -> Option<usize> {
        self.entities
            .flags()
            .filter(|(_, f)| !f.is_collected())
            .min_by_key(|(_, f)| from.distance_squared(f.position))
            .map(|(slot, _)| slot)
    }

    /// Unused stone lying on `pos`.
    #[must_use]
    pub fn stone_at(&self, pos: GridPos) -> Option<usize> {
        self.entities
            .stones()
            .find(|(_, s)| !s.consumed && s.position == pos)
            .map(|(slot, _)| slot)
    }

    /// Position of the entity at `slot`.
    #[must_use]
    pub fn position_of(&self, slot: usize) -> Option<GridPos> {
        self.entities.get(slot).map(Entity::position)
    }

    // ------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------

    /// Spawn a unit with its archetype's default behavior at `pos`.
    ///
    /// Pikemen draw their rally point from [`Self::random_free_position`].
    pub fn spawn_unit_at(
        &mut self,
        archetype: Archetype,
        faction: FactionId,
        pos: GridPos,
    ) -> Result<EntityId> {
        let behavior = match archetype {
            Archetype::Collector => Behavior::collector(),
            Archetype::Deserter => Behavior::deserter(),
            Archetype::Cavalry => Behavior::cavalry(),
            Archetype::Pikeman => Behavior::pikeman(self.random_free_position()?),
        };
        Ok(self.insert_unit(faction, pos, behavior))
    }

    /// Insert a unit with an explicit behavior.
    pub fn insert_unit(&mut self, faction: FactionId, pos: GridPos, behavior: Behavior) -> EntityId {
        self.entities
            .insert(|id| Entity::Unit(Unit::new(id, faction, pos, behavior)))
    }

    /// Place a full tree at `pos`.
    pub fn place_tree(&mut self, pos: GridPos) -> EntityId {
        self.entities.insert(|id| Entity::Tree(Tree::new(id, pos)))
    }

    /// Place an uncaptured flag at `pos`.
    pub fn place_flag(&mut self, pos: GridPos) -> EntityId {
        self.entities.insert(|id| Entity::Flag(Flag::new(id, pos)))
    }

    /// Place a stone at `pos`.
    pub fn place_stone(&mut self, pos: GridPos) -> EntityId {
        self.entities
            .insert(|id| Entity::Stone(PhilosophicalStone::new(id, pos)))
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Kill the unit at `slot` and queue it for the end-of-tick purge.
    ///
    /// Returns the unit's ID if it was alive.
    pub fn kill_unit(&mut self, slot: usize) -> Option<EntityId> {
        let unit = self.entities.unit_mut(slot)?;
        if unit.health.is_dead() && unit.position.is_off_map() {
            return None;
        }
        unit.die();
        let id = unit.id;
        self.queue_removal(id);
        Some(id)
    }

    /// Queue an entity for removal at the end of the tick.
    pub fn queue_removal(&mut self, id: EntityId) {
        if !self.pending_removal.contains(&id) {
            self.pending_removal.push(id);
        }
    }

    /// Remove every queued entity. Returns how many were removed.
    pub fn purge(&mut self) -> usize {
        if self.pending_removal.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.pending_removal);
        let before = self.entities.len();
        self.entities.retain(|e| !pending.contains(&e.id()));
        before - self.entities.len()
    }

    /// Entities waiting for the purge.
    #[must_use]
    pub fn pending_removal(&self) -> &[EntityId] {
        &self.pending_removal
    }

    /// Draw a uniform index in `0..len`.
    pub(crate) fn roll(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{COLS, ROWS};

    #[test]
    fn test_new_world_has_two_cities() {
        let world = World::new(7, 0);
        assert_eq!(world.entities().len(), 2);
        assert!(world.city(FactionId::White).is_some());
        assert!(world.city(FactionId::Black).is_some());
    }

    #[test]
    fn test_populate_places_stones_on_free_cells() {
        let mut world = World::new(7, 0);
        world.populate().unwrap();
        let stones: Vec<_> = world.entities().stones().collect();
        assert_eq!(stones.len(), INITIAL_STONE_COUNT);
        for (_, stone) in stones {
            assert!(stone.position.is_valid());
            assert!(world.city(FactionId::White).is_some_and(|c| !c.covers(stone.position)));
        }
        for (_, tree) in world.entities().trees() {
            assert!(tree.position.is_valid());
        }
    }

    #[test]
    fn test_random_free_position_single_free_cell() {
        let mut world = World::new(3, 0);
        let free = GridPos::new(19, 19);
        for cell in all_cells() {
            if cell != free && !world.is_occupied(cell) {
                world.place_tree(cell);
            }
        }
        for _ in 0..5 {
            assert_eq!(world.random_free_position(), Ok(free));
        }
        world.place_tree(free);
        assert_eq!(world.random_free_position(), Err(GameError::NoAvailablePosition));
    }

    #[test]
    fn test_nearest_unit_breaks_ties_by_order() {
        let mut world = World::new(1, 0);
        let first = world.insert_unit(FactionId::Black, GridPos::new(3, 10), Behavior::deserter());
        let _second =
            world.insert_unit(FactionId::Black, GridPos::new(5, 10), Behavior::deserter());
        let slot = world
            .nearest_unit(GridPos::new(4, 10), |u| u.faction == FactionId::Black)
            .unwrap();
        assert_eq!(world.entities().unit(slot).map(|u| u.id), Some(first));
    }

    #[test]
    fn test_dead_units_are_not_candidates_and_do_not_block() {
        let mut world = World::new(1, 0);
        let pos = GridPos::new(3, 10);
        let id = world.insert_unit(FactionId::Black, pos, Behavior::deserter());
        let slot = world.entities().slot_of(id).unwrap();
        assert!(world.is_occupied(pos));
        assert_eq!(world.kill_unit(slot), Some(id));
        assert!(!world.is_occupied(pos));
        assert!(world.nearest_unit(GridPos::new(0, 0), |_| true).is_none());
        assert_eq!(world.kill_unit(slot), None);
        assert_eq!(world.purge(), 1);
        assert!(world.unit_by_id(id).is_none());
    }

    #[test]
    fn test_grid_has_expected_capacity() {
        let world = World::new(1, 0);
        let free = all_cells().filter(|c| !world.is_occupied(*c)).count();
        assert_eq!(free as i32, ROWS * COLS - 2 * 25);
    }
}
