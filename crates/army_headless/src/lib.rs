//! Headless runner for the army simulation.
//!
//! This crate drives [`army_core`] without graphics:
//!
//! - **Interactive sessions**: a controller sends JSON commands on stdin
//!   and reads responses on stdout
//! - **Terminal play**: a real-time or accelerated driver prints ASCII frames
//! - **Verification and batches**: many seeded games, run in parallel
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (tick, spawn_unit, toggle, etc.)
//! - **stdout**: Responses and state snapshots (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See [`protocol`] module for the full command/response specification.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p army_headless -- run
//!
//! # Watch a game in the terminal, four times faster than real time
//! cargo run -p army_headless -- play --speed 4
//!
//! # Verify determinism
//! cargo run -p army_headless -- verify --seed 42 --runs 5
//! ```

pub mod ascii;
pub mod batch;
pub mod driver;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use ascii::{render_ascii, render_frame, AsciiConfig};
pub use batch::{run_batch, BatchConfig, BatchResults};
pub use driver::{Clock, Driver, DriverConfig, SteppedClock, WallClock};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner, RunnerError};
pub use scenario::{Scenario, ScenarioError};
