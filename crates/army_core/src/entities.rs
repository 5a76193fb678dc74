//! Entity model and ordered storage.
//!
//! The world owns every entity in a single insertion-ordered list. Units are
//! entities too; "unit-list order" is simply the order of the unit entries
//! in that list, so the two views can never disagree. Iteration order is
//! part of the simulation contract: it decides who acts first and breaks
//! ties between equally distant targets.

use serde::{Deserialize, Serialize};

use crate::components::{Archetype, EntityId, Unit};
use crate::economy::{City, Tree};
use crate::factions::FactionId;
use crate::math::GridPos;

/// Time after the last capture before a new flag appears.
pub const FLAG_RESPAWN_MS: u64 = 120_000;

/// Philosophical stones placed at world creation.
pub const INITIAL_STONE_COUNT: usize = 2;

/// A capturable flag. Capturing it buffs the whole capturing army.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Entity identifier.
    pub id: EntityId,
    /// Current cell; [`GridPos::OFF_MAP`] once captured.
    pub position: GridPos,
    /// Faction that captured the flag, if any.
    pub captured_by: Option<FactionId>,
}

impl Flag {
    /// Create an uncaptured flag.
    #[must_use]
    pub const fn new(id: EntityId, position: GridPos) -> Self {
        Self {
            id,
            position,
            captured_by: None,
        }
    }

    /// Whether the flag has already been captured.
    #[must_use]
    pub const fn is_collected(&self) -> bool {
        self.captured_by.is_some()
    }

    /// Mark captured by `faction` and take it off the grid.
    pub fn capture(&mut self, faction: FactionId) {
        self.captured_by = Some(faction);
        self.position = GridPos::OFF_MAP;
    }
}

/// A one-shot stone that either kills or immortalises the unit that steps on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhilosophicalStone {
    /// Entity identifier.
    pub id: EntityId,
    /// Current cell; [`GridPos::OFF_MAP`] once used.
    pub position: GridPos,
    /// Set once the effect has fired.
    pub consumed: bool,
}

impl PhilosophicalStone {
    /// Create an unused stone.
    #[must_use]
    pub const fn new(id: EntityId, position: GridPos) -> Self {
        Self {
            id,
            position,
            consumed: false,
        }
    }

    /// Mark used and take it off the grid.
    pub fn consume(&mut self) {
        self.consumed = true;
        self.position = GridPos::OFF_MAP;
    }
}

/// Every kind of thing on the battlefield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// A faction city.
    City(City),
    /// A harvestable tree.
    Tree(Tree),
    /// A capturable flag.
    Flag(Flag),
    /// A philosophical stone.
    Stone(PhilosophicalStone),
    /// A unit.
    Unit(Unit),
}

/// Entity kind without payload, for renderers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "archetype")]
pub enum EntityKind {
    /// A faction city.
    City,
    /// A tree.
    Tree,
    /// A flag.
    Flag,
    /// A philosophical stone.
    Stone,
    /// A unit of the given archetype.
    Unit(Archetype),
}

impl Entity {
    /// Entity identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        match self {
            Self::City(c) => c.id,
            Self::Tree(t) => t.id,
            Self::Flag(f) => f.id,
            Self::Stone(s) => s.id,
            Self::Unit(u) => u.id,
        }
    }

    /// Current cell. For cities this is the footprint's top-left corner.
    #[must_use]
    pub const fn position(&self) -> GridPos {
        match self {
            Self::City(c) => c.origin,
            Self::Tree(t) => t.position,
            Self::Flag(f) => f.position,
            Self::Stone(s) => s.position,
            Self::Unit(u) => u.position,
        }
    }

    /// Payload-free kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::City(_) => EntityKind::City,
            Self::Tree(_) => EntityKind::Tree,
            Self::Flag(_) => EntityKind::Flag,
            Self::Stone(_) => EntityKind::Stone,
            Self::Unit(u) => EntityKind::Unit(u.archetype()),
        }
    }

    /// Owning faction, for cities and units.
    #[must_use]
    pub const fn faction(&self) -> Option<FactionId> {
        match self {
            Self::City(c) => Some(c.faction),
            Self::Unit(u) => Some(u.faction),
            _ => None,
        }
    }

    /// Whether this entity makes `pos` unavailable for movement.
    ///
    /// Flags and stones never block; cities block their whole footprint.
    #[must_use]
    pub const fn occupies(&self, pos: GridPos) -> bool {
        match self {
            Self::City(c) => c.covers(pos),
            Self::Tree(t) => t.position.x == pos.x && t.position.y == pos.y,
            Self::Unit(u) => u.position.x == pos.x && u.position.y == pos.y,
            Self::Flag(_) | Self::Stone(_) => false,
        }
    }

    /// Opaque key renderers map to a sprite.
    #[must_use]
    pub fn visual_key(&self) -> String {
        match self {
            Self::City(c) => c.visual_key(),
            Self::Tree(_) => "tree".to_string(),
            Self::Flag(_) => "flag".to_string(),
            Self::Stone(_) => "stone".to_string(),
            Self::Unit(u) => u.visual_key(),
        }
    }
}

/// What a renderer needs to draw one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    /// Entity identifier.
    pub id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Current cell.
    pub position: GridPos,
    /// Owning faction, if any.
    pub faction: Option<FactionId>,
    /// Opaque sprite key.
    pub visual_key: String,
}

impl From<&Entity> for EntityView {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id(),
            kind: entity.kind(),
            position: entity.position(),
            faction: entity.faction(),
            visual_key: entity.visual_key(),
        }
    }
}

/// Storage for all entities in the simulation.
///
/// A `Vec` in insertion order. Slots are stable within a tick because
/// nothing is removed until the end-of-tick purge.
#[derive(Debug, Clone, Default)]
pub struct EntityStorage {
    /// Entities in insertion order.
    entities: Vec<Entity>,
    /// Next entity ID to assign.
    next_id: EntityId,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            next_id: 1,
        }
    }

    /// Append an entity built from its freshly assigned ID.
    pub fn insert(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        self.entities.push(build(id));
        id
    }

    /// Get the entity at `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Entity> {
        self.entities.get(slot)
    }

    /// Get a mutable reference to the entity at `slot`.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Entity> {
        self.entities.get_mut(slot)
    }

    /// Slot currently holding `id`.
    #[must_use]
    pub fn slot_of(&self, id: EntityId) -> Option<usize> {
        self.entities.iter().position(|e| e.id() == id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn by_id(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// The unit at `slot`, if that slot holds a unit.
    #[must_use]
    pub fn unit(&self, slot: usize) -> Option<&Unit> {
        match self.entities.get(slot) {
            Some(Entity::Unit(u)) => Some(u),
            _ => None,
        }
    }

    /// Mutable access to the unit at `slot`.
    pub fn unit_mut(&mut self, slot: usize) -> Option<&mut Unit> {
        match self.entities.get_mut(slot) {
            Some(Entity::Unit(u)) => Some(u),
            _ => None,
        }
    }

    /// The tree at `slot`, mutably.
    pub fn tree_mut(&mut self, slot: usize) -> Option<&mut Tree> {
        match self.entities.get_mut(slot) {
            Some(Entity::Tree(t)) => Some(t),
            _ => None,
        }
    }

    /// The flag at `slot`, mutably.
    pub fn flag_mut(&mut self, slot: usize) -> Option<&mut Flag> {
        match self.entities.get_mut(slot) {
            Some(Entity::Flag(f)) => Some(f),
            _ => None,
        }
    }

    /// The stone at `slot`, mutably.
    pub fn stone_mut(&mut self, slot: usize) -> Option<&mut PhilosophicalStone> {
        match self.entities.get_mut(slot) {
            Some(Entity::Stone(s)) => Some(s),
            _ => None,
        }
    }

    /// Slots of all units in unit-list order.
    #[must_use]
    pub fn unit_slots(&self) -> Vec<usize> {
        self.units().map(|(slot, _)| slot).collect()
    }

    /// All units with their slots, in unit-list order.
    pub fn units(&self) -> impl Iterator<Item = (usize, &Unit)> {
        self.entities.iter().enumerate().filter_map(|(slot, e)| match e {
            Entity::Unit(u) => Some((slot, u)),
            _ => None,
        })
    }

    /// All units, mutably.
    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.entities.iter_mut().filter_map(|e| match e {
            Entity::Unit(u) => Some(u),
            _ => None,
        })
    }

    /// All trees with their slots.
    pub fn trees(&self) -> impl Iterator<Item = (usize, &Tree)> {
        self.entities.iter().enumerate().filter_map(|(slot, e)| match e {
            Entity::Tree(t) => Some((slot, t)),
            _ => None,
        })
    }

    /// All trees, mutably.
    pub fn trees_mut(&mut self) -> impl Iterator<Item = &mut Tree> {
        self.entities.iter_mut().filter_map(|e| match e {
            Entity::Tree(t) => Some(t),
            _ => None,
        })
    }

    /// All flags with their slots.
    pub fn flags(&self) -> impl Iterator<Item = (usize, &Flag)> {
        self.entities.iter().enumerate().filter_map(|(slot, e)| match e {
            Entity::Flag(f) => Some((slot, f)),
            _ => None,
        })
    }

    /// All stones with their slots.
    pub fn stones(&self) -> impl Iterator<Item = (usize, &PhilosophicalStone)> {
        self.entities.iter().enumerate().filter_map(|(slot, e)| match e {
            Entity::Stone(s) => Some((slot, s)),
            _ => None,
        })
    }

    /// The city owned by `faction`.
    #[must_use]
    pub fn city(&self, faction: FactionId) -> Option<&City> {
        self.entities.iter().find_map(|e| match e {
            Entity::City(c) if c.faction == faction => Some(c),
            _ => None,
        })
    }

    /// The city owned by `faction`, mutably.
    pub fn city_mut(&mut self, faction: FactionId) -> Option<&mut City> {
        self.entities.iter_mut().find_map(|e| match e {
            Entity::City(c) if c.faction == faction => Some(c),
            _ => None,
        })
    }

    /// Whether any entity blocks `pos`.
    #[must_use]
    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.entities.iter().any(|e| e.occupies(pos))
    }

    /// Iterate over all entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Keep only entities matching `keep`, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&Entity) -> bool) {
        self.entities.retain(keep);
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
