//! Unit archetypes, their fixed stats, and per-unit state.
//!
//! Every unit is one of four closed archetypes. The archetype decides the
//! unit's attack, starting health, production cost and cooldown, bonus
//! table, and which state machine drives it each tick. Archetype-specific
//! state travels inside [`Behavior`] so that the shared priority chain in
//! [`crate::behavior`] can dispatch on a single `match`.

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::factions::FactionId;
use crate::math::{Fixed, GridPos};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Health granted by the philosophical stone's invincibility effect.
pub const INVINCIBLE_HEALTH: u32 = 999_999_999;

/// Wood a collector takes from a tree per harvest.
pub const COLLECTOR_HARVEST_AMOUNT: u32 = 5;

/// Wood a collector can carry before it must return to the depot.
pub const COLLECTOR_CAPACITY: u32 = 25;

/// A deserter flees when a non-collector enemy is at most this far.
pub const DESERTER_ESCAPE_DISTANCE: i64 = 2;

/// A fleeing deserter calms down once its threat is farther than this.
pub const DESERTER_CALM_DISTANCE: i64 = 6;

/// Initial value of the shared cavalry safety distance.
pub const CAVALRY_INITIAL_SAFETY_DISTANCE: u32 = 1;

/// Vision cells a pikeman gains per allied pikeman.
pub const PIKEMAN_VISION_PER_ALLY: i64 = 1;

// ============================================================================
// Archetypes
// ============================================================================

/// The four unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Harvests wood and brings it back to the city.
    Collector,
    /// Raids enemy collectors and runs from everything else.
    Deserter,
    /// Hunts deserters while keeping its distance from other cavalry.
    Cavalry,
    /// Holds a rally point and engages enemies within shared vision.
    Pikeman,
}

impl Archetype {
    /// All archetypes in production order.
    pub const ALL: [Self; 4] = [Self::Collector, Self::Deserter, Self::Cavalry, Self::Pikeman];

    /// Lowercase name used in visual keys and the control protocol.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Collector => "collector",
            Self::Deserter => "deserter",
            Self::Cavalry => "cavalry",
            Self::Pikeman => "pikeman",
        }
    }

    /// Stable index into per-archetype arrays.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Collector => 0,
            Self::Deserter => 1,
            Self::Cavalry => 2,
            Self::Pikeman => 3,
        }
    }

    /// Fixed stats for this archetype.
    #[must_use]
    pub const fn stats(&self) -> ArchetypeStats {
        match self {
            Self::Collector => ArchetypeStats {
                attack: 5,
                health: 150,
                cost: 0,
                cooldown_ms: 5_000,
                bonus: BonusTable::NONE,
            },
            Self::Deserter => ArchetypeStats {
                attack: 10,
                health: 125,
                cost: 50,
                cooldown_ms: 10_000,
                bonus: BonusTable::new(&[(Self::Pikeman, 150), (Self::Deserter, 125)]),
            },
            Self::Cavalry => ArchetypeStats {
                attack: 10,
                health: 200,
                cost: 100,
                cooldown_ms: 15_000,
                bonus: BonusTable::new(&[(Self::Deserter, 200)]),
            },
            Self::Pikeman => ArchetypeStats {
                attack: 15,
                health: 175,
                cost: 75,
                cooldown_ms: 5_000,
                bonus: BonusTable::new(&[(Self::Cavalry, 300)]),
            },
        }
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Archetype {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GameError::UnknownArchetype(s.to_string()))
    }
}

/// Fixed per-archetype values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchetypeStats {
    /// Base damage per attack.
    pub attack: u32,
    /// Starting health.
    pub health: u32,
    /// Wood the city pays to produce one.
    pub cost: u32,
    /// Minimum time between two productions of this archetype by one city.
    pub cooldown_ms: u64,
    /// Damage multipliers against specific opponents.
    pub bonus: BonusTable,
}

/// Mapping from opposing archetype to damage multiplier.
///
/// Multipliers are stored as whole percentages so the tables can be
/// `const`; lookups return them as [`Fixed`]. Opponents missing from the
/// table use a multiplier of exactly 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusTable(&'static [(Archetype, u32)]);

impl BonusTable {
    /// A table with no bonuses.
    pub const NONE: Self = Self(&[]);

    /// Create a table from `(opponent, percent)` pairs.
    #[must_use]
    pub const fn new(entries: &'static [(Archetype, u32)]) -> Self {
        Self(entries)
    }

    /// Damage multiplier against `target`.
    #[must_use]
    pub fn multiplier_against(&self, target: Archetype) -> Fixed {
        self.0
            .iter()
            .find(|(archetype, _)| *archetype == target)
            .map_or(Fixed::ONE, |&(_, percent)| {
                Fixed::from_num(percent) / Fixed::from_num(100)
            })
    }

    /// Raw `(opponent, percent)` entries.
    #[must_use]
    pub const fn entries(&self) -> &'static [(Archetype, u32)] {
        self.0
    }
}

// ============================================================================
// Health
// ============================================================================

/// Unit health. Never negative; zero means dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
}

impl Health {
    /// Create health with the given points.
    #[must_use]
    pub const fn new(current: u32) -> Self {
        Self { current }
    }

    /// Apply damage, clamping at zero. Returns true if this killed the unit.
    pub fn apply_damage(&mut self, amount: u32) -> bool {
        let was_alive = !self.is_dead();
        self.current = self.current.saturating_sub(amount);
        was_alive && self.is_dead()
    }

    /// Add health, saturating at `u32::MAX`.
    pub fn heal(&mut self, amount: u32) {
        self.current = self.current.saturating_add(amount);
    }

    /// Check if health is depleted.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }
}

// ============================================================================
// Per-archetype state machines
// ============================================================================

/// Collector states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectorState {
    /// Walking to or harvesting the nearest tree.
    Collecting,
    /// Carrying a full load back to the depot.
    Returning,
    /// Handing the load to the city.
    Depositing,
}

/// Deserter states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeserterState {
    /// Hunting enemy collectors.
    Attacking,
    /// Running from a nearby threat.
    Escaping,
}

/// Cavalry states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CavalryState {
    /// Chasing the nearest enemy deserter.
    Pursuing,
    /// Adjusting spacing against the nearest allied cavalry.
    Repositioning,
}

/// Pikeman states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PikemanState {
    /// Walking to the rally point.
    MovingToPosition,
    /// Fighting the nearest visible enemy.
    EngagingEnemy,
    /// Walking back to the rally point after losing sight of enemies.
    ReturningToPosition,
}

/// Archetype tag plus the state its machine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    /// Collector machine.
    Collector {
        /// Current state.
        state: CollectorState,
        /// Wood currently carried.
        carried: u32,
    },
    /// Deserter machine.
    Deserter {
        /// Current state.
        state: DeserterState,
    },
    /// Cavalry machine.
    Cavalry {
        /// Current state.
        state: CavalryState,
    },
    /// Pikeman machine.
    Pikeman {
        /// Current state.
        state: PikemanState,
        /// Cell assigned at creation.
        rally_point: GridPos,
    },
}

impl Behavior {
    /// Initial behavior for a freshly produced collector.
    #[must_use]
    pub const fn collector() -> Self {
        Self::Collector {
            state: CollectorState::Collecting,
            carried: 0,
        }
    }

    /// Initial behavior for a freshly produced deserter.
    #[must_use]
    pub const fn deserter() -> Self {
        Self::Deserter {
            state: DeserterState::Attacking,
        }
    }

    /// Initial behavior for a freshly produced cavalry unit.
    #[must_use]
    pub const fn cavalry() -> Self {
        Self::Cavalry {
            state: CavalryState::Pursuing,
        }
    }

    /// Initial behavior for a pikeman holding `rally_point`.
    #[must_use]
    pub const fn pikeman(rally_point: GridPos) -> Self {
        Self::Pikeman {
            state: PikemanState::MovingToPosition,
            rally_point,
        }
    }

    /// The archetype this behavior drives.
    #[must_use]
    pub const fn archetype(&self) -> Archetype {
        match self {
            Self::Collector { .. } => Archetype::Collector,
            Self::Deserter { .. } => Archetype::Deserter,
            Self::Cavalry { .. } => Archetype::Cavalry,
            Self::Pikeman { .. } => Archetype::Pikeman,
        }
    }

    /// Short label for the current state.
    #[must_use]
    pub const fn state_name(&self) -> &'static str {
        match self {
            Self::Collector { state, .. } => match state {
                CollectorState::Collecting => "collecting",
                CollectorState::Returning => "returning",
                CollectorState::Depositing => "depositing",
            },
            Self::Deserter { state } => match state {
                DeserterState::Attacking => "attacking",
                DeserterState::Escaping => "escaping",
            },
            Self::Cavalry { state } => match state {
                CavalryState::Pursuing => "pursuing",
                CavalryState::Repositioning => "repositioning",
            },
            Self::Pikeman { state, .. } => match state {
                PikemanState::MovingToPosition => "moving_to_position",
                PikemanState::EngagingEnemy => "engaging_enemy",
                PikemanState::ReturningToPosition => "returning_to_position",
            },
        }
    }
}

// ============================================================================
// Unit
// ============================================================================

/// An autonomous soldier owned by the world and tagged with its city's faction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Entity identifier.
    pub id: EntityId,
    /// Owning faction. Units reference their city through it.
    pub faction: FactionId,
    /// Current cell, or [`GridPos::OFF_MAP`] once dead.
    pub position: GridPos,
    /// Current health.
    pub health: Health,
    /// Base damage per attack.
    pub attack: u32,
    /// Damage multipliers against specific opponents.
    pub bonus: BonusTable,
    /// Whether the unit acts at all this tick.
    pub action_enabled: bool,
    /// Archetype plus state machine data.
    pub behavior: Behavior,
}

impl Unit {
    /// Create a unit with its archetype's base stats.
    #[must_use]
    pub fn new(id: EntityId, faction: FactionId, position: GridPos, behavior: Behavior) -> Self {
        let stats = behavior.archetype().stats();
        Self {
            id,
            faction,
            position,
            health: Health::new(stats.health),
            attack: stats.attack,
            bonus: stats.bonus,
            action_enabled: true,
            behavior,
        }
    }

    /// This unit's archetype.
    #[must_use]
    pub const fn archetype(&self) -> Archetype {
        self.behavior.archetype()
    }

    /// Alive and on the grid.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.health.is_dead() && !self.position.is_off_map()
    }

    /// Pin health to zero and move off-map.
    pub fn die(&mut self) {
        self.health.current = 0;
        self.position = GridPos::OFF_MAP;
    }

    /// Wood carried, for collectors.
    #[must_use]
    pub const fn carried_wood(&self) -> Option<u32> {
        match self.behavior {
            Behavior::Collector { carried, .. } => Some(carried),
            _ => None,
        }
    }

    /// Opaque key renderers map to a sprite, e.g. `white_collector`.
    #[must_use]
    pub fn visual_key(&self) -> String {
        format!("{}_{}", self.faction.short_name(), self.archetype().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_opponent_uses_unit_multiplier() {
        let bonus = Archetype::Collector.stats().bonus;
        for target in Archetype::ALL {
            assert_eq!(bonus.multiplier_against(target), Fixed::ONE);
        }
        let cavalry = Archetype::Cavalry.stats().bonus;
        assert_eq!(cavalry.multiplier_against(Archetype::Pikeman), Fixed::ONE);
    }

    #[test]
    fn test_bonus_multipliers_are_exact() {
        let deserter = Archetype::Deserter.stats().bonus;
        assert_eq!(deserter.multiplier_against(Archetype::Pikeman), Fixed::from_num(1.5));
        assert_eq!(deserter.multiplier_against(Archetype::Deserter), Fixed::from_num(1.25));
        let pikeman = Archetype::Pikeman.stats().bonus;
        assert_eq!(pikeman.multiplier_against(Archetype::Cavalry), Fixed::from_num(3));
    }

    #[test]
    fn test_health_clamps_at_zero() {
        let mut health = Health::new(15);
        assert!(!health.apply_damage(10));
        assert_eq!(health.current, 5);
        assert!(health.apply_damage(10));
        assert_eq!(health.current, 0);
        // Already dead: no second death.
        assert!(!health.apply_damage(10));
    }

    #[test]
    fn test_heal_saturates() {
        let mut health = Health::new(u32::MAX - 1);
        health.heal(10);
        assert_eq!(health.current, u32::MAX);
    }

    #[test]
    fn test_parse_archetype() {
        assert_eq!("Pikeman".parse::<Archetype>(), Ok(Archetype::Pikeman));
        assert_eq!(
            "wizard".parse::<Archetype>(),
            Err(GameError::UnknownArchetype("wizard".to_string()))
        );
    }

    #[test]
    fn test_new_unit_uses_archetype_stats() {
        let unit = Unit::new(1, FactionId::White, GridPos::new(3, 3), Behavior::cavalry());
        assert_eq!(unit.health.current, 200);
        assert_eq!(unit.attack, 10);
        assert!(unit.action_enabled);
        assert_eq!(unit.visual_key(), "white_cavalry");
        assert_eq!(unit.carried_wood(), None);
    }
}
