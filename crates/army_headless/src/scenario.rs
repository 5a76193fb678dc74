//! Scenario loading and configuration.
//!
//! Scenarios describe how a run starts: seed, clock, starting units and
//! extra objects on the board. They never change the rules.

use std::path::Path;

use army_core::components::{Archetype, Behavior};
use army_core::error::GameError;
use army_core::factions::FactionId;
use army_core::math::GridPos;
use army_core::simulation::{Simulation, TICK_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A placement falls outside the grid.
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),
    /// The simulation rejected a setup step.
    #[error("Scenario setup failed: {0}")]
    Setup(#[from] GameError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// World RNG seed.
    #[serde(default)]
    pub seed: u64,
    /// Clock reading the world is created at.
    #[serde(default)]
    pub start_ms: u64,
    /// Simulated time between ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Ticks to run before stopping (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,
    /// Scatter trees and stones at creation.
    #[serde(default = "default_populate")]
    pub populate: bool,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Extra objects and stock placed after the units.
    #[serde(default)]
    pub objectives: Vec<Objective>,
}

fn default_tick_interval() -> u64 {
    TICK_INTERVAL_MS
}

fn default_populate() -> bool {
    true
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Open Field".to_string(),
            description: "A populated board with no starting units".to_string(),
            seed: 0,
            start_ms: 0,
            tick_interval_ms: TICK_INTERVAL_MS,
            max_ticks: 0,
            populate: true,
            units: Vec::new(),
            objectives: Vec::new(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Two of every archetype per side, plus a flag in the middle.
    #[must_use]
    pub fn skirmish() -> Self {
        let units = FactionId::ALL
            .into_iter()
            .flat_map(|faction| {
                Archetype::ALL
                    .into_iter()
                    .map(move |archetype| UnitPlacement::new(archetype, faction, 2))
            })
            .collect();

        Self {
            name: "Skirmish".to_string(),
            description: "Both sides start with two units of every archetype".to_string(),
            seed: 42,
            max_ticks: 3_000,
            units,
            objectives: vec![Objective::Flag {
                position: Some((10, 10)),
            }],
            ..Self::default()
        }
    }

    /// The same scenario with another seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the starting simulation.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        let mut sim = if self.populate {
            Simulation::new(self.seed, self.start_ms)
        } else {
            Simulation::bare(self.seed, self.start_ms)
        };

        for placement in &self.units {
            for _ in 0..placement.count {
                match placement.position {
                    Some(pos) => {
                        let pos = to_grid(pos)?;
                        let behavior = match placement.archetype {
                            Archetype::Collector => Behavior::collector(),
                            Archetype::Deserter => Behavior::deserter(),
                            Archetype::Cavalry => Behavior::cavalry(),
                            Archetype::Pikeman => {
                                Behavior::pikeman(sim.world_mut().random_free_position()?)
                            }
                        };
                        sim.world_mut().insert_unit(placement.faction, pos, behavior);
                    }
                    None => {
                        sim.spawn_unit(placement.archetype, placement.faction)?;
                    }
                }
            }
        }

        for objective in &self.objectives {
            objective.apply(&mut sim)?;
        }

        tracing::info!(
            scenario = %self.name,
            seed = self.seed,
            entities = sim.world().entities().len(),
            "Scenario built"
        );
        Ok(sim)
    }
}

fn to_grid((x, y): (i32, i32)) -> Result<GridPos, ScenarioError> {
    let pos = GridPos::new(x, y);
    if pos.is_valid() {
        Ok(pos)
    } else {
        Err(ScenarioError::InvalidPlacement(format!("{pos} is outside the grid")))
    }
}

/// Placement of units at scenario start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit archetype.
    pub archetype: Archetype,
    /// Owning faction.
    pub faction: FactionId,
    /// Number of units to place.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Cell (x, y); the faction's spawn point when absent.
    #[serde(default)]
    pub position: Option<(i32, i32)>,
}

fn default_count() -> u32 {
    1
}

impl UnitPlacement {
    /// Place `count` units at the faction's spawn point.
    #[must_use]
    pub fn new(archetype: Archetype, faction: FactionId, count: u32) -> Self {
        Self {
            archetype,
            faction,
            count,
            position: None,
        }
    }
}

/// Extra setup applied after units are placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// A flag, on a random free cell when no position is given.
    Flag {
        /// Cell (x, y).
        #[serde(default)]
        position: Option<(i32, i32)>,
    },
    /// A philosophical stone, on a random free cell when no position is given.
    Stone {
        /// Cell (x, y).
        #[serde(default)]
        position: Option<(i32, i32)>,
    },
    /// A full tree at a fixed cell.
    Tree {
        /// Cell (x, y).
        position: (i32, i32),
    },
    /// Starting wood in a city.
    Wood {
        /// Receiving city.
        faction: FactionId,
        /// Wood to add.
        amount: u32,
    },
}

impl Objective {
    fn apply(&self, sim: &mut Simulation) -> Result<(), ScenarioError> {
        match *self {
            Self::Flag { position: Some(pos) } => {
                sim.world_mut().place_flag(to_grid(pos)?);
            }
            Self::Flag { position: None } => {
                sim.spawn_flag()?;
            }
            Self::Stone { position: Some(pos) } => {
                sim.world_mut().place_stone(to_grid(pos)?);
            }
            Self::Stone { position: None } => {
                sim.spawn_stone()?;
            }
            Self::Tree { position } => {
                let pos = to_grid(position)?;
                if sim.world().is_occupied(pos) {
                    return Err(ScenarioError::InvalidPlacement(format!(
                        "tree at {pos} overlaps another entity"
                    )));
                }
                sim.world_mut().place_tree(pos);
            }
            Self::Wood { faction, amount } => {
                let city = sim
                    .world_mut()
                    .city_mut(faction)
                    .ok_or_else(|| GameError::InvalidState(format!("no city for {faction:?}")))?;
                city.add_wood(faction, amount);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario() {
        let scenario = Scenario::default();
        assert!(scenario.populate);
        assert_eq!(scenario.tick_interval_ms, TICK_INTERVAL_MS);
        assert!(scenario.units.is_empty());
    }

    #[test]
    fn test_skirmish_scenario() {
        let scenario = Scenario::skirmish();
        assert_eq!(scenario.units.len(), 8);
        let sim = scenario.build().unwrap();
        assert_eq!(sim.unit_count(FactionId::White), 8);
        assert_eq!(sim.unit_count(FactionId::Black), 8);
        assert_eq!(sim.world().entities().flags().count(), 1);
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                seed: 9,
                populate: false,
                units: [
                    UnitPlacement(archetype: cavalry, faction: white, count: 2),
                    UnitPlacement(archetype: deserter, faction: black, position: Some((3, 10))),
                ],
                objectives: [
                    Stone(position: Some((4, 4))),
                    Wood(faction: black, amount: 60),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.tick_interval_ms, TICK_INTERVAL_MS);

        let sim = scenario.build().unwrap();
        assert_eq!(sim.unit_count(FactionId::White), 2);
        assert_eq!(sim.world().entities().trees().count(), 0);
        assert_eq!(sim.world().city(FactionId::Black).unwrap().wood, 60);
        let stone = sim.world().entities().stones().next().unwrap().1;
        assert_eq!(stone.position, GridPos::new(4, 4));
    }

    #[test]
    fn test_rejects_off_grid_placement() {
        let scenario = Scenario {
            populate: false,
            objectives: vec![Objective::Tree { position: (25, 0) }],
            ..Scenario::default()
        };
        assert!(matches!(scenario.build(), Err(ScenarioError::InvalidPlacement(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("does/not/exist.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
