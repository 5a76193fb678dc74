//! Wood economy: trees that collectors harvest and the cities they feed.
//!
//! Cities accrue wood from their own collectors and spend it on units. Each
//! archetype has a fixed cost and cooldown; a city produces at most one
//! unit per tick, picked uniformly among the archetypes it can afford and
//! whose cooldown has elapsed.
//!
//! All calculations use integer math for deterministic simulation.

use serde::{Deserialize, Serialize};

use crate::components::{Archetype, EntityId};
use crate::factions::{FactionId, CITY_SIZE};
use crate::math::GridPos;

/// Wood in a fully grown tree.
pub const TREE_MAX_WOOD: u32 = 100;

/// Time after the last felling before invisible trees regrow.
pub const TREE_REGROWTH_MS: u64 = 30_000;

/// Chance per free cell of a tree at world creation.
pub const TREE_SPAWN_CHANCE: f64 = 0.04;

/// A tree that collectors harvest wood from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Entity identifier.
    pub id: EntityId,
    /// Cell the tree grows on and regrows at.
    pub home: GridPos,
    /// Current cell; [`GridPos::OFF_MAP`] while felled.
    pub position: GridPos,
    /// Remaining wood.
    pub wood: u32,
    /// False while felled.
    pub visible: bool,
}

impl Tree {
    /// Create a fully grown tree.
    #[must_use]
    pub const fn new(id: EntityId, home: GridPos) -> Self {
        Self {
            id,
            home,
            position: home,
            wood: TREE_MAX_WOOD,
            visible: true,
        }
    }

    /// Visible and holding wood.
    #[must_use]
    pub const fn is_harvestable(&self) -> bool {
        self.visible && self.wood > 0
    }

    /// Take up to `requested` wood.
    ///
    /// Returns the amount actually extracted. A tree that runs out is felled
    /// immediately: it turns invisible and leaves the grid.
    pub fn harvest(&mut self, requested: u32) -> u32 {
        let extracted = requested.min(self.wood);
        self.wood -= extracted;
        if self.wood == 0 {
            self.visible = false;
            self.position = GridPos::OFF_MAP;
        }
        extracted
    }

    /// Restore full wood at the home cell.
    pub fn regrow(&mut self) {
        self.wood = TREE_MAX_WOOD;
        self.visible = true;
        self.position = self.home;
    }
}

/// A faction's city: wood stock and production timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// Entity identifier.
    pub id: EntityId,
    /// Owning faction.
    pub faction: FactionId,
    /// Top-left corner of the footprint.
    pub origin: GridPos,
    /// Wood in stock.
    pub wood: u32,
    /// Per-archetype time of last production, indexed by [`Archetype::index`].
    pub last_produced_ms: [u64; 4],
}

impl City {
    /// Create a city with empty stock; every cooldown starts at `now_ms`.
    #[must_use]
    pub const fn new(id: EntityId, faction: FactionId, now_ms: u64) -> Self {
        Self {
            id,
            faction,
            origin: faction.city_origin(),
            wood: 0,
            last_produced_ms: [now_ms; 4],
        }
    }

    /// Whether the footprint covers `pos`.
    #[must_use]
    pub const fn covers(&self, pos: GridPos) -> bool {
        pos.x >= self.origin.x
            && pos.x < self.origin.x + CITY_SIZE
            && pos.y >= self.origin.y
            && pos.y < self.origin.y + CITY_SIZE
    }

    /// Where this city's units appear.
    #[must_use]
    pub const fn spawn_point(&self) -> GridPos {
        self.faction.spawn_point()
    }

    /// Where this city's collectors deposit wood.
    #[must_use]
    pub const fn depot_point(&self) -> GridPos {
        self.faction.depot_point()
    }

    /// Credit wood from a collector. Rejected unless the collector is ours.
    pub fn add_wood(&mut self, from: FactionId, amount: u32) -> bool {
        if from != self.faction {
            return false;
        }
        self.wood = self.wood.saturating_add(amount);
        true
    }

    /// Check if this city can afford `cost`.
    #[must_use]
    pub const fn can_afford(&self, cost: u32) -> bool {
        self.wood >= cost
    }

    /// Whether `archetype` is affordable and off cooldown at `now_ms`.
    #[must_use]
    pub const fn can_produce(&self, archetype: Archetype, now_ms: u64) -> bool {
        let stats = archetype.stats();
        let last = self.last_produced_ms[archetype.index()];
        self.can_afford(stats.cost) && now_ms.saturating_sub(last) >= stats.cooldown_ms
    }

    /// Archetypes eligible for production, in [`Archetype::ALL`] order.
    #[must_use]
    pub fn eligible_archetypes(&self, now_ms: u64) -> Vec<Archetype> {
        Archetype::ALL
            .into_iter()
            .filter(|a| self.can_produce(*a, now_ms))
            .collect()
    }

    /// Pay for `archetype` and restart its cooldown.
    ///
    /// Returns false (and changes nothing) if the city cannot afford it.
    pub fn record_production(&mut self, archetype: Archetype, now_ms: u64) -> bool {
        let cost = archetype.stats().cost;
        if !self.can_afford(cost) {
            return false;
        }
        self.wood -= cost;
        self.last_produced_ms[archetype.index()] = now_ms;
        true
    }

    /// Opaque key renderers map to a sprite.
    #[must_use]
    pub fn visual_key(&self) -> String {
        format!("{}_city", self.faction.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_harvest_fells_at_zero() {
        let mut tree = Tree::new(1, GridPos::new(3, 3));
        for _ in 0..19 {
            assert_eq!(tree.harvest(5), 5);
        }
        assert!(tree.visible);
        assert_eq!(tree.harvest(5), 5);
        assert_eq!(tree.wood, 0);
        assert!(!tree.visible);
        assert_eq!(tree.position, GridPos::OFF_MAP);
        assert_eq!(tree.harvest(5), 0);
    }

    #[test]
    fn test_tree_harvest_clamps_to_remaining() {
        let mut tree = Tree::new(1, GridPos::new(3, 3));
        tree.wood = 3;
        assert_eq!(tree.harvest(5), 3);
        assert_eq!(tree.wood, 0);
    }

    #[test]
    fn test_tree_regrows_at_home() {
        let mut tree = Tree::new(1, GridPos::new(4, 8));
        tree.harvest(TREE_MAX_WOOD);
        tree.regrow();
        assert_eq!(tree.position, GridPos::new(4, 8));
        assert_eq!(tree.wood, TREE_MAX_WOOD);
        assert!(tree.is_harvestable());
    }

    #[test]
    fn test_city_footprint() {
        let city = City::new(1, FactionId::White, 0);
        assert!(city.covers(GridPos::new(7, 0)));
        assert!(city.covers(GridPos::new(11, 4)));
        assert!(!city.covers(GridPos::new(12, 4)));
        assert!(!city.covers(city.spawn_point()));
        assert!(!city.covers(city.depot_point()));
    }

    #[test]
    fn test_add_wood_rejects_other_faction() {
        let mut city = City::new(1, FactionId::Black, 0);
        assert!(!city.add_wood(FactionId::White, 25));
        assert_eq!(city.wood, 0);
        assert!(city.add_wood(FactionId::Black, 25));
        assert_eq!(city.wood, 25);
    }

    #[test]
    fn test_cooldowns_start_at_creation() {
        let city = City::new(1, FactionId::White, 1_000);
        assert!(city.eligible_archetypes(5_999).is_empty());
        assert_eq!(city.eligible_archetypes(6_000), vec![Archetype::Collector]);
    }

    #[test]
    fn test_eligibility_requires_wood() {
        let mut city = City::new(1, FactionId::White, 0);
        city.wood = 80;
        let eligible = city.eligible_archetypes(20_000);
        assert_eq!(
            eligible,
            vec![Archetype::Collector, Archetype::Deserter, Archetype::Pikeman]
        );
    }

    #[test]
    fn test_record_production_never_goes_negative() {
        let mut city = City::new(1, FactionId::White, 0);
        city.wood = 60;
        assert!(!city.record_production(Archetype::Cavalry, 20_000));
        assert_eq!(city.wood, 60);
        assert!(city.record_production(Archetype::Deserter, 20_000));
        assert_eq!(city.wood, 10);
        assert!(!city.can_produce(Archetype::Deserter, 29_999));
    }
}
