//! # Army Core
//!
//! Deterministic simulation core for a two-faction grid war game.
//!
//! Two cities on a 20x20 grid produce units that gather wood, hunt, flee,
//! escort and guard, chase flags and step on philosophical stones. This
//! crate contains **only** the game logic:
//! - No rendering
//! - No IO
//! - No wall clock (the driver passes the time of each tick)
//! - No system randomness (one seeded RNG per world)
//!
//! This separation enables:
//! - Headless runs and batch experiments
//! - Replays from a seed and a list of tick times
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`math`] - Grid coordinates and fixed-point helpers
//! - [`components`] - Unit archetypes, stats, health and behavior state
//! - [`economy`] - Trees and cities
//! - [`entities`] - Flags, stones and the entity list
//! - [`world`] - Mutable world state shared during a tick
//! - [`movement`] - Single-step grid movement
//! - [`combat`] - Melee damage resolution
//! - [`behavior`] - Per-unit priority chain and state machines
//! - [`simulation`] - Tick scheduler and control surface

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod combat;
pub mod components;
pub mod economy;
pub mod entities;
pub mod error;
pub mod factions;
pub mod math;
pub mod movement;
pub mod simulation;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::behavior::{DepositEvent, FlagCapture, StoneEffect, StoneOutcome};
    pub use crate::combat::DamageEvent;
    pub use crate::components::*;
    pub use crate::economy::{City, Tree};
    pub use crate::entities::{Entity, EntityKind, EntityView, Flag, PhilosophicalStone};
    pub use crate::error::{GameError, Result};
    pub use crate::factions::FactionId;
    pub use crate::math::{Fixed, GridPos};
    pub use crate::simulation::{Simulation, TickEvents, TICK_INTERVAL_MS};
    pub use crate::world::World;
}
