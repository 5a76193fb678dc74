//! Headless army simulation runner.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p army_headless
//!
//! # Interactive mode with a scenario
//! cargo run -p army_headless -- run --scenario crates/army_headless/scenarios/skirmish.ron
//!
//! # Watch a game in the terminal
//! cargo run -p army_headless -- play --speed 2
//!
//! # Verify determinism
//! cargo run -p army_headless -- verify --seed 42 --runs 5
//!
//! # Run a batch of seeds in parallel
//! cargo run -p army_headless -- batch --count 200 --output results/batch.json
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::path::PathBuf;
use std::process::ExitCode;

use army_core::simulation::{Simulation, TickEvents};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use army_headless::{
    ascii::{render_frame, AsciiConfig},
    batch::{run_batch, verify_determinism, BatchConfig},
    driver::{Driver, DriverConfig, SteppedClock, WallClock},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "army_headless")]
#[command(about = "Headless runner for the army simulation")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive JSON-lines session
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: Option<String>,

        /// Seed when no scenario is given
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Output state after every tick command
        #[arg(long)]
        auto_state: bool,
    },

    /// Watch a game as ASCII frames
    Play {
        /// Scenario file to load (default: skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scenario seed
        #[arg(long)]
        seed: Option<u64>,

        /// Real-time speed multiplier
        #[arg(long, default_value = "1")]
        speed: u32,

        /// Do not sleep between ticks
        #[arg(long)]
        fast: bool,

        /// Ticks to run (0 = until one side is wiped out)
        #[arg(short, long, default_value = "2000")]
        ticks: u64,

        /// Print a frame every N ticks
        #[arg(long, default_value = "1")]
        frame_every: u64,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario file to load (default: skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "2000")]
        ticks: u64,
    },

    /// Run many seeds in parallel and write a JSON summary
    Batch {
        /// Scenario file to load (default: skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Ticks per game (0 = the scenario's limit)
        #[arg(short, long, default_value = "0")]
        ticks: u64,

        /// Results file
        #[arg(short, long, default_value = "results/batch.json")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            seed,
            auto_state,
        }) => cmd_run(scenario, seed, auto_state),
        Some(Commands::Play {
            scenario,
            seed,
            speed,
            fast,
            ticks,
            frame_every,
            no_color,
        }) => cmd_play(scenario, seed, speed, fast, ticks, frame_every, no_color),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        }) => cmd_verify(scenario, seed, runs, ticks),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            seed,
            ticks,
            output,
        }) => cmd_batch(scenario, count, parallel, seed, ticks, output),
        // Default: interactive mode
        None => cmd_run(None, 0, false),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            eprintln!("FATAL: {message}");
            ExitCode::FAILURE
        }
    }
}

fn load_scenario(path: Option<PathBuf>) -> Result<Scenario, String> {
    match path {
        Some(path) => Scenario::load(&path).map_err(|e| e.to_string()),
        None => Ok(Scenario::skirmish()),
    }
}

/// Run an interactive session on stdin/stdout
fn cmd_run(scenario: Option<String>, seed: u64, auto_state: bool) -> Result<(), String> {
    tracing::info!("Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        scenario_path: scenario,
        seed,
        ..HeadlessConfig::default()
    };

    let mut runner = HeadlessRunner::with_config(config).map_err(|e| e.to_string())?;
    runner.run_stdio().map_err(|e| e.to_string())
}

/// Drive a game and print ASCII frames to stdout
fn cmd_play(
    scenario: Option<PathBuf>,
    seed: Option<u64>,
    speed: u32,
    fast: bool,
    ticks: u64,
    frame_every: u64,
    no_color: bool,
) -> Result<(), String> {
    let mut scenario = load_scenario(scenario)?;
    if let Some(seed) = seed {
        scenario.seed = seed;
    }
    let mut sim = scenario.build().map_err(|e| e.to_string())?;

    let driver = Driver::new(DriverConfig {
        max_ticks: ticks,
        min_ticks: 0,
        frame_every,
    });
    let ascii = AsciiConfig {
        show_legend: true,
        use_color: !no_color,
    };
    let on_frame = |sim: &Simulation, _: &TickEvents| {
        // Clear screen and home the cursor before each frame.
        print!("\x1b[2J\x1b[H{}", render_frame(sim, &ascii));
    };

    tracing::info!(
        scenario = %scenario.name,
        seed = scenario.seed,
        speed,
        fast,
        "Starting play"
    );

    let report = if fast {
        let mut clock = SteppedClock::new(scenario.start_ms, scenario.tick_interval_ms);
        driver.run(&mut sim, &mut clock, on_frame)
    } else {
        let mut clock = WallClock::new(scenario.start_ms, scenario.tick_interval_ms, speed);
        driver.run(&mut sim, &mut clock, on_frame)
    };

    eprintln!(
        "Finished after {} ticks ({:.1}s game time), {} deaths, {} flags captured",
        report.ticks,
        report.final_ms.saturating_sub(scenario.start_ms) as f64 / 1_000.0,
        report.summary.deaths,
        report.summary.flag_captures
    );
    Ok(())
}

/// Verify determinism by running same seed multiple times
fn cmd_verify(scenario: Option<PathBuf>, seed: u64, runs: u32, ticks: u64) -> Result<(), String> {
    let scenario = load_scenario(scenario)?;
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs, {} ticks)",
        scenario.name,
        seed,
        runs,
        ticks
    );

    if verify_determinism(&scenario, seed, runs, ticks.max(1)) {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(())
    } else {
        Err("Non-determinism detected!".to_string())
    }
}

/// Run a batch of seeds and write the results file
fn cmd_batch(
    scenario: Option<PathBuf>,
    count: u32,
    parallel: u32,
    seed: u64,
    ticks: u64,
    output: PathBuf,
) -> Result<(), String> {
    let scenario = load_scenario(scenario)?;
    let config = BatchConfig {
        scenario,
        game_count: count,
        parallel_games: parallel,
        seed_start: seed,
        max_ticks: ticks,
        output: Some(output.clone()),
    };

    let results = run_batch(config);
    results
        .save(&output)
        .map_err(|e| format!("Cannot write '{}': {e}", output.display()))?;

    let summary = &results.summary;
    eprintln!("Games: {}  errors: {}", summary.total_games, results.errors.len());
    eprintln!(
        "White ahead: {}  Black ahead: {}  Even: {}",
        summary.white_ahead, summary.black_ahead, summary.even
    );
    eprintln!(
        "Mean deaths: {:.1}  mean flag captures: {:.2}",
        summary.mean_deaths, summary.mean_flag_captures
    );
    eprintln!("Results written to {}", output.display());
    Ok(())
}
