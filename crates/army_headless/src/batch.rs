//! Batch game runner.
//!
//! Runs one scenario over many seeds in parallel using rayon and collects
//! per-game results and an aggregate summary.

use std::path::{Path, PathBuf};
use std::time::Instant;

use army_core::factions::FactionId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::driver::{Driver, DriverConfig, SteppedClock};
use crate::protocol::TickSummary;
use crate::scenario::Scenario;

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario to run; each game overrides its seed
    pub scenario: Scenario,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Starting seed for deterministic runs
    pub seed_start: u64,
    /// Ticks per game (0 = the scenario's own limit)
    pub max_ticks: u64,
    /// Where to write the results file
    pub output: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::skirmish(),
            game_count: 100,
            parallel_games: 0,
            seed_start: 0,
            max_ticks: 0,
            output: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: Scenario, game_count: u32) -> Self {
        Self {
            scenario,
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set per-game tick limit
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }

    fn ticks_per_game(&self) -> u64 {
        match (self.max_ticks, self.scenario.max_ticks) {
            (0, 0) => 3_000,
            (0, scenario) => scenario,
            (limit, _) => limit,
        }
    }
}

/// Which side ended ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// White has more living units.
    White,
    /// Black has more living units.
    Black,
    /// Same number of living units.
    Even,
}

/// Result of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// Seed used
    pub seed: u64,
    /// Ticks run
    pub ticks: u64,
    /// State hash after the last tick
    pub final_hash: u64,
    /// Living units per faction, white then black
    pub units: [usize; 2],
    /// Wood in stock per faction, white then black
    pub wood: [u32; 2],
    /// Event totals
    pub summary: TickSummary,
    /// Side ahead at the end
    pub outcome: Outcome,
}

/// Aggregate over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games completed
    pub total_games: usize,
    /// Games white ended ahead
    pub white_ahead: usize,
    /// Games black ended ahead
    pub black_ahead: usize,
    /// Games that ended even
    pub even: usize,
    /// Mean deaths per game
    pub mean_deaths: f64,
    /// Mean flag captures per game
    pub mean_flag_captures: f64,
}

impl BatchSummary {
    /// Summarize completed games.
    pub fn from_games(games: &[GameResult]) -> Self {
        let total_games = games.len();
        let count = |o| games.iter().filter(|g| g.outcome == o).count();
        let mean = |f: fn(&GameResult) -> usize| {
            if total_games == 0 {
                0.0
            } else {
                games.iter().map(f).sum::<usize>() as f64 / total_games as f64
            }
        };
        Self {
            total_games,
            white_ahead: count(Outcome::White),
            black_ahead: count(Outcome::Black),
            even: count(Outcome::Even),
            mean_deaths: mean(|g| g.summary.deaths),
            mean_flag_captures: mean(|g| g.summary.flag_captures),
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game results
    pub games: Vec<GameResult>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Run a single game headlessly on a stepped clock.
pub fn run_single_game(scenario: &Scenario, seed: u64, max_ticks: u64) -> Result<GameResult, BatchError> {
    let scenario = scenario.clone().with_seed(seed);
    let mut sim = scenario.build().map_err(|e| BatchError {
        seed,
        message: e.to_string(),
    })?;

    let mut clock = SteppedClock::new(scenario.start_ms, scenario.tick_interval_ms);
    let report = Driver::new(DriverConfig {
        max_ticks,
        min_ticks: 0,
        frame_every: 0,
    })
    .run(&mut sim, &mut clock, |_, _| {});

    let units = FactionId::ALL.map(|f| sim.unit_count(f));
    let wood = FactionId::ALL.map(|f| sim.world().city(f).map_or(0, |c| c.wood));
    let outcome = match units[0].cmp(&units[1]) {
        std::cmp::Ordering::Greater => Outcome::White,
        std::cmp::Ordering::Less => Outcome::Black,
        std::cmp::Ordering::Equal => Outcome::Even,
    };

    Ok(GameResult {
        seed,
        ticks: report.ticks,
        final_hash: report.final_hash,
        units,
        wood,
        summary: report.summary,
        outcome,
    })
}

/// Run a batch of games
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let ticks = config.ticks_per_game();

    info!(
        games = config.game_count,
        scenario = %config.scenario.name,
        ticks,
        "Starting batch run"
    );

    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<GameResult, BatchError>> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            let result = run_single_game(&config.scenario, seed, ticks);
            if let Err(e) = &result {
                warn!(seed, error = %e.message, "Game failed");
            }
            result
        })
        .collect();

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameResult> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s",
        games.len(),
        duration_seconds
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Run the same seed `runs` times and compare final hashes.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32, max_ticks: u64) -> bool {
    let hashes: Vec<Option<u64>> = (0..runs)
        .into_par_iter()
        .map(|_| {
            run_single_game(scenario, seed, max_ticks)
                .ok()
                .map(|g| g.final_hash)
        })
        .collect();

    match hashes.first() {
        Some(Some(first)) => hashes.iter().all(|h| *h == Some(*first)),
        _ => false,
    }
}
