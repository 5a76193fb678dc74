//! Core simulation loop.
//!
//! [`Simulation`] owns the [`World`] and advances it one tick at a time.
//! The driver supplies the clock reading for each tick, so the same seed,
//! start time and sequence of tick times always reproduce the same game.
//!
//! # Determinism
//!
//! - All randomness comes from one seeded `ChaCha8Rng` owned by the world
//! - Units act in insertion order, which also breaks distance ties
//! - No floating-point math in combat (uses fixed-point via [`crate::math::Fixed`])
//! - No wall clock inside the crate
//!
//! # Example
//!
//! ```
//! use army_core::components::Archetype;
//! use army_core::factions::FactionId;
//! use army_core::simulation::{Simulation, TICK_INTERVAL_MS};
//!
//! let mut sim = Simulation::new(42, 0);
//! sim.spawn_unit(Archetype::Collector, FactionId::White).unwrap();
//!
//! let mut now = 0;
//! for _ in 0..10 {
//!     now += TICK_INTERVAL_MS;
//!     sim.advance_one_tick(now);
//! }
//! assert_eq!(sim.get_tick(), 10);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::behavior::{self, DepositEvent, FlagCapture, StoneEffect};
use crate::combat::DamageEvent;
use crate::components::{Archetype, Behavior, EntityId};
use crate::economy::TREE_REGROWTH_MS;
use crate::entities::{Entity, EntityView, FLAG_RESPAWN_MS};
use crate::error::Result;
use crate::factions::FactionId;
use crate::world::World;

/// Reference cadence between two ticks.
pub const TICK_INTERVAL_MS: u64 = 130;

/// Events generated during a simulation tick.
///
/// Drivers can use these for logs, sounds or statistics. Ignoring them
/// has no effect on the simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Every attack resolved this tick.
    pub damage_events: Vec<DamageEvent>,
    /// Units that died this tick.
    pub deaths: Vec<EntityId>,
    /// Entities spawned by the scheduler this tick.
    pub spawned: Vec<EntityId>,
    /// Flags captured this tick.
    pub flag_captures: Vec<FlagCapture>,
    /// Stones triggered this tick.
    pub stone_effects: Vec<StoneEffect>,
    /// Wood deposits this tick.
    pub deposits: Vec<DepositEvent>,
    /// Trees that regrew this tick.
    pub trees_regrown: usize,
}

impl TickEvents {
    /// Record an attack, and the death it caused if any.
    pub fn record_damage(&mut self, event: DamageEvent) {
        if event.killed {
            self.deaths.push(event.target);
        }
        self.damage_events.push(event);
    }
}

/// The core game simulation.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Unit Behavior** - every unit's priority chain, in unit-list order
/// 2. **Cavalry Spacing** - grow or keep the shared safety distance
/// 3. **Tree Regrowth** - regrow felled trees once the cooldown passed
/// 4. **Flag Respawn** - place a new flag once the cooldown passed
/// 5. **City Production** - each city may produce one unit
/// 6. **Purge** - drop dead units and used flags and stones
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Current simulation tick.
    tick: u64,
    /// Seed the world RNG started from.
    seed: u64,
    /// All game state.
    world: World,
}

impl Simulation {
    /// Create a populated world: cities, random trees and stones.
    #[must_use]
    pub fn new(seed: u64, now_ms: u64) -> Self {
        let mut sim = Self::bare(seed, now_ms);
        if let Err(err) = sim.world.populate() {
            tracing::warn!(%err, "World population incomplete");
        }
        sim
    }

    /// Create a world holding only the two cities.
    #[must_use]
    pub fn bare(seed: u64, now_ms: u64) -> Self {
        Self {
            tick: 0,
            seed,
            world: World::new(seed, now_ms),
        }
    }

    /// Get the current tick number.
    #[must_use]
    pub fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Seed the world RNG started from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Clock reading of the last tick (or creation).
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.world.now_ms()
    }

    /// Read-only world access.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access, for scenario setup.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Advance the simulation by one tick at clock reading `now_ms`.
    ///
    /// # Example
    ///
    /// ```
    /// use army_core::simulation::Simulation;
    ///
    /// let mut sim = Simulation::bare(1, 0);
    /// sim.advance_one_tick(130);
    /// sim.advance_one_tick(130);
    /// assert_eq!(sim.get_tick(), 2);
    /// ```
    pub fn advance_one_tick(&mut self, now_ms: u64) -> TickEvents {
        let mut events = TickEvents::default();
        self.world.now_ms = now_ms;

        // 1. Unit Behavior System
        for slot in self.world.entities.unit_slots() {
            behavior::run_unit_turn(&mut self.world, slot, &mut events);
        }

        // 2. Cavalry Spacing System
        self.run_cavalry_spacing_system();

        // 3. Tree Regrowth System
        events.trees_regrown = self.run_tree_regrowth_system();

        // 4. Flag Respawn System
        if let Some(flag) = self.run_flag_respawn_system() {
            events.spawned.push(flag);
        }

        // 5. City Production System
        let mut produced = self.run_production_system();
        events.spawned.append(&mut produced);

        // 6. Purge System
        self.world.purge();

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    fn run_cavalry_spacing_system(&mut self) {
        let counters = &mut self.world.counters;
        if !counters.cavalry_combat_occurred {
            counters.cavalry_safety_distance = counters.cavalry_safety_distance.saturating_add(1);
        }
        counters.cavalry_combat_occurred = false;
    }

    fn run_tree_regrowth_system(&mut self) -> usize {
        let Some(felled_at) = self.world.counters.last_tree_felled_ms else {
            return 0;
        };
        if self.world.now_ms.saturating_sub(felled_at) < TREE_REGROWTH_MS {
            return 0;
        }

        let mut regrown = 0;
        for tree in self.world.entities.trees_mut() {
            if !tree.visible {
                tree.regrow();
                regrown += 1;
            }
        }
        self.world.counters.last_tree_felled_ms = None;
        if regrown > 0 {
            tracing::debug!(regrown, "Trees regrew");
        }
        regrown
    }

    fn run_flag_respawn_system(&mut self) -> Option<EntityId> {
        if self.world.entities.flags().next().is_some() {
            return None;
        }
        let since_capture = self
            .world
            .now_ms
            .saturating_sub(self.world.counters.last_flag_capture_ms);
        if since_capture < FLAG_RESPAWN_MS {
            return None;
        }
        match self.world.random_free_position() {
            Ok(pos) => {
                let id = self.world.place_flag(pos);
                tracing::info!(flag = id, %pos, "Flag spawned");
                Some(id)
            }
            Err(err) => {
                tracing::warn!(%err, "Flag respawn skipped");
                None
            }
        }
    }

    fn run_production_system(&mut self) -> Vec<EntityId> {
        let now_ms = self.world.now_ms;
        let mut produced = Vec::new();

        for faction in FactionId::ALL {
            let eligible = match self.world.city(faction) {
                Some(city) => city.eligible_archetypes(now_ms),
                None => continue,
            };
            if eligible.is_empty() {
                continue;
            }
            let archetype = eligible[self.world.roll(eligible.len())];

            let behavior = match archetype {
                Archetype::Collector => Behavior::collector(),
                Archetype::Deserter => Behavior::deserter(),
                Archetype::Cavalry => Behavior::cavalry(),
                Archetype::Pikeman => match self.world.random_free_position() {
                    Ok(rally) => Behavior::pikeman(rally),
                    Err(err) => {
                        tracing::warn!(%err, faction = faction.short_name(), "Production skipped");
                        continue;
                    }
                },
            };

            let paid = self
                .world
                .city_mut(faction)
                .is_some_and(|city| city.record_production(archetype, now_ms));
            if !paid {
                continue;
            }
            let id = self
                .world
                .insert_unit(faction, faction.spawn_point(), behavior);
            tracing::info!(
                unit = id,
                archetype = archetype.name(),
                faction = faction.short_name(),
                "Unit produced"
            );
            produced.push(id);
        }

        produced
    }

    // ------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------

    /// Spawn a unit at its faction's spawn point.
    pub fn spawn_unit(&mut self, archetype: Archetype, faction: FactionId) -> Result<EntityId> {
        let id = self
            .world
            .spawn_unit_at(archetype, faction, faction.spawn_point())?;
        tracing::debug!(unit = id, archetype = archetype.name(), "Debug spawn");
        Ok(id)
    }

    /// Flip the action flag of every unit of `archetype`. Returns how many changed.
    pub fn toggle_action(&mut self, archetype: Archetype) -> usize {
        let mut toggled = 0;
        for unit in self.world.entities.units_mut() {
            if unit.archetype() == archetype {
                unit.action_enabled = !unit.action_enabled;
                toggled += 1;
            }
        }
        toggled
    }

    /// Kill every living unit. Returns how many died.
    pub fn kill_all_units(&mut self) -> usize {
        let slots = self.world.entities.unit_slots();
        slots
            .into_iter()
            .filter_map(|slot| self.world.kill_unit(slot))
            .count()
    }

    /// Place a flag on a random free cell, ignoring the respawn cooldown.
    pub fn spawn_flag(&mut self) -> Result<EntityId> {
        let pos = self.world.random_free_position()?;
        Ok(self.world.place_flag(pos))
    }

    /// Place a philosophical stone on a random free cell.
    pub fn spawn_stone(&mut self) -> Result<EntityId> {
        let pos = self.world.random_free_position()?;
        Ok(self.world.place_stone(pos))
    }

    /// Clear everything and build a fresh populated world at `now_ms`.
    ///
    /// The RNG stream continues, so a restart does not replay the previous game.
    pub fn restart(&mut self, now_ms: u64) {
        self.world.reset(now_ms);
        if let Err(err) = self.world.populate() {
            tracing::warn!(%err, "World population incomplete");
        }
        self.tick = 0;
        tracing::info!(now_ms, "Simulation restarted");
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Every on-grid entity in insertion order, as a renderer sees it.
    #[must_use]
    pub fn render_list(&self) -> Vec<EntityView> {
        self.world
            .entities
            .iter()
            .filter(|e| e.position().is_valid())
            .map(EntityView::from)
            .collect()
    }

    /// Living units of `faction`.
    #[must_use]
    pub fn unit_count(&self, faction: FactionId) -> usize {
        self.world
            .living_units()
            .filter(|(_, u)| u.faction == faction)
            .count()
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.world.now_ms.hash(&mut hasher);
        self.world.counters.hash(&mut hasher);
        self.world.entities.len().hash(&mut hasher);

        for entity in self.world.entities.iter() {
            entity.id().hash(&mut hasher);
            entity.kind().hash(&mut hasher);
            entity.position().hash(&mut hasher);
            match entity {
                Entity::City(city) => {
                    city.wood.hash(&mut hasher);
                    city.last_produced_ms.hash(&mut hasher);
                }
                Entity::Tree(tree) => {
                    tree.wood.hash(&mut hasher);
                    tree.visible.hash(&mut hasher);
                }
                Entity::Flag(flag) => flag.captured_by.hash(&mut hasher),
                Entity::Stone(stone) => stone.consumed.hash(&mut hasher),
                Entity::Unit(unit) => {
                    unit.faction.hash(&mut hasher);
                    unit.health.hash(&mut hasher);
                    unit.action_enabled.hash(&mut hasher);
                    unit.behavior.hash(&mut hasher);
                }
            }
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::GridPos;

    #[test]
    fn test_tick_increments() {
        let mut sim = Simulation::bare(1, 0);
        sim.advance_one_tick(TICK_INTERVAL_MS);
        assert_eq!(sim.get_tick(), 1);
        assert_eq!(sim.now_ms(), TICK_INTERVAL_MS);
    }

    #[test]
    fn test_safety_distance_grows_without_combat() {
        let mut sim = Simulation::bare(1, 0);
        assert_eq!(sim.world().counters().cavalry_safety_distance, 1);
        sim.advance_one_tick(100);
        sim.advance_one_tick(200);
        assert_eq!(sim.world().counters().cavalry_safety_distance, 3);
    }

    #[test]
    fn test_first_collector_after_cooldown() {
        let mut sim = Simulation::bare(1, 0);
        let events = sim.advance_one_tick(4_999);
        assert!(events.spawned.is_empty());
        let events = sim.advance_one_tick(5_000);
        assert_eq!(events.spawned.len(), 2);
        let white = sim.world().unit_by_id(events.spawned[0]).unwrap();
        assert_eq!(white.archetype(), Archetype::Collector);
        assert_eq!(white.position, FactionId::White.spawn_point());
    }

    #[test]
    fn test_flag_respawns_after_cooldown() {
        let mut sim = Simulation::bare(1, 0);
        let events = sim.advance_one_tick(FLAG_RESPAWN_MS - 1);
        assert!(sim.world().entities().flags().next().is_none());
        assert!(!events.spawned.is_empty());
        sim.advance_one_tick(FLAG_RESPAWN_MS);
        assert_eq!(sim.world().entities().flags().count(), 1);
    }

    #[test]
    fn test_trees_regrow_together() {
        let mut sim = Simulation::bare(1, 0);
        let a = sim.world_mut().place_tree(GridPos::new(0, 0));
        let b = sim.world_mut().place_tree(GridPos::new(19, 19));
        for tree in sim.world_mut().entities.trees_mut() {
            tree.harvest(100);
        }
        sim.world_mut().counters_mut().last_tree_felled_ms = Some(1_000);

        let events = sim.advance_one_tick(30_999);
        assert_eq!(events.trees_regrown, 0);
        let events = sim.advance_one_tick(31_000);
        assert_eq!(events.trees_regrown, 2);
        for (_, tree) in sim.world().entities().trees() {
            assert!(tree.visible);
            assert!(tree.id == a || tree.id == b);
        }
        assert_eq!(sim.world().counters().last_tree_felled_ms, None);
    }

    #[test]
    fn test_render_list_skips_off_map() {
        let mut sim = Simulation::bare(1, 0);
        let id = sim.spawn_unit(Archetype::Deserter, FactionId::Black).unwrap();
        assert_eq!(sim.render_list().len(), 3);
        sim.kill_all_units();
        let views = sim.render_list();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.id != id));
    }

    #[test]
    fn test_toggle_action_per_archetype() {
        let mut sim = Simulation::bare(1, 0);
        let c = sim.spawn_unit(Archetype::Collector, FactionId::White).unwrap();
        let d = sim.spawn_unit(Archetype::Deserter, FactionId::Black).unwrap();
        assert_eq!(sim.toggle_action(Archetype::Collector), 1);
        assert!(!sim.world().unit_by_id(c).unwrap().action_enabled);
        assert!(sim.world().unit_by_id(d).unwrap().action_enabled);
        sim.toggle_action(Archetype::Collector);
        assert!(sim.world().unit_by_id(c).unwrap().action_enabled);
    }

    #[test]
    fn test_restart_resets_world() {
        let mut sim = Simulation::new(9, 0);
        sim.spawn_unit(Archetype::Cavalry, FactionId::White).unwrap();
        sim.advance_one_tick(130);
        sim.restart(10_000);
        assert_eq!(sim.get_tick(), 0);
        assert_eq!(sim.unit_count(FactionId::White), 0);
        assert_eq!(sim.world().counters().last_flag_capture_ms, 10_000);
        assert_eq!(sim.world().entities().stones().count(), 2);
    }

    #[test]
    fn test_same_seed_same_hash() {
        let run = || {
            let mut sim = Simulation::new(77, 0);
            let mut now = 0;
            for _ in 0..200 {
                now += TICK_INTERVAL_MS;
                sim.advance_one_tick(now);
            }
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }
}
