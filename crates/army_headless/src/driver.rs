//! Periodic tick driver.
//!
//! The core never reads a clock; the driver does. [`WallClock`] follows
//! real time (optionally sped up) and sleeps between ticks to hold the
//! cadence. [`SteppedClock`] advances by a fixed amount per tick and never
//! sleeps, which gives accelerated and fully reproducible runs.

use std::thread;
use std::time::{Duration, Instant};

use army_core::factions::FactionId;
use army_core::simulation::{Simulation, TickEvents, TICK_INTERVAL_MS};
use serde::{Deserialize, Serialize};

use crate::protocol::TickSummary;

/// Source of tick timestamps.
pub trait Clock {
    /// Timestamp for the next tick.
    fn now_ms(&mut self) -> u64;

    /// Block until the next tick is due.
    fn wait_for_next_tick(&mut self) {}
}

/// Real-time clock, scaled by an integer speed factor.
#[derive(Debug, Clone)]
pub struct WallClock {
    origin_ms: u64,
    started: Instant,
    speed: u32,
    interval: Duration,
    next_deadline: Instant,
}

impl WallClock {
    /// Start at `origin_ms` simulated time, ticking every `interval_ms`
    /// simulated milliseconds.
    pub fn new(origin_ms: u64, interval_ms: u64, speed: u32) -> Self {
        let speed = speed.max(1);
        let interval = Duration::from_millis(interval_ms) / speed;
        let started = Instant::now();
        Self {
            origin_ms,
            started,
            speed,
            interval,
            next_deadline: started + interval,
        }
    }
}

impl Clock for WallClock {
    fn now_ms(&mut self) -> u64 {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.origin_ms
            .saturating_add(elapsed.saturating_mul(u64::from(self.speed)))
    }

    fn wait_for_next_tick(&mut self) {
        let now = Instant::now();
        if let Some(remaining) = self.next_deadline.checked_duration_since(now) {
            thread::sleep(remaining);
        }
        // Late ticks do not try to catch up.
        self.next_deadline = self.next_deadline.max(now) + self.interval;
    }
}

/// Fixed-step clock that never sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteppedClock {
    now: u64,
    step: u64,
}

impl SteppedClock {
    /// First tick lands at `origin_ms + step_ms`.
    pub fn new(origin_ms: u64, step_ms: u64) -> Self {
        Self {
            now: origin_ms,
            step: step_ms,
        }
    }
}

impl Default for SteppedClock {
    fn default() -> Self {
        Self::new(0, TICK_INTERVAL_MS)
    }
}

impl Clock for SteppedClock {
    fn now_ms(&mut self) -> u64 {
        self.now += self.step;
        self.now
    }
}

/// Driver limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Ticks to run (0 = until one side has no units left after `min_ticks`).
    pub max_ticks: u64,
    /// Ticks that always run before the elimination check applies.
    pub min_ticks: u64,
    /// Call the frame callback every N ticks (0 = never).
    pub frame_every: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_ticks: 1_000,
            min_ticks: 0,
            frame_every: 1,
        }
    }
}

/// What a driven run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverReport {
    /// Ticks executed.
    pub ticks: u64,
    /// Clock reading of the last tick.
    pub final_ms: u64,
    /// State hash after the last tick.
    pub final_hash: u64,
    /// Totals over the run.
    pub summary: TickSummary,
}

/// Drives a simulation from a clock.
#[derive(Debug, Clone, Default)]
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    /// Create a driver.
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    /// Tick `sim` until the configured limit, calling `on_frame` on frame ticks.
    pub fn run<C, F>(&self, sim: &mut Simulation, clock: &mut C, mut on_frame: F) -> DriverReport
    where
        C: Clock,
        F: FnMut(&Simulation, &TickEvents),
    {
        let mut summary = TickSummary::default();
        let mut ticks = 0;

        loop {
            if self.config.max_ticks > 0 && ticks >= self.config.max_ticks {
                break;
            }
            if self.config.max_ticks == 0 && ticks >= self.config.min_ticks && is_decided(sim) {
                break;
            }

            let now = clock.now_ms();
            let events = sim.advance_one_tick(now);
            summary.absorb(&events);
            ticks += 1;

            if self.config.frame_every > 0 && ticks % self.config.frame_every == 0 {
                on_frame(sim, &events);
            }
            clock.wait_for_next_tick();
        }

        tracing::info!(ticks, final_ms = sim.now_ms(), "Driver finished");
        DriverReport {
            ticks,
            final_ms: sim.now_ms(),
            final_hash: sim.state_hash(),
            summary,
        }
    }
}

/// One side has units and the other has none.
fn is_decided(sim: &Simulation) -> bool {
    let white = sim.unit_count(FactionId::White);
    let black = sim.unit_count(FactionId::Black);
    (white == 0) != (black == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stepped_clock_advances_by_step() {
        let mut clock = SteppedClock::new(1_000, 130);
        assert_eq!(clock.now_ms(), 1_130);
        assert_eq!(clock.now_ms(), 1_260);
    }

    #[test]
    fn test_wall_clock_is_monotonic() {
        let mut clock = WallClock::new(500, 10, 4);
        let a = clock.now_ms();
        clock.wait_for_next_tick();
        let b = clock.now_ms();
        assert!(a >= 500);
        assert!(b >= a);
    }

    #[test]
    fn test_driver_runs_max_ticks_and_reports_frames() {
        let mut sim = Simulation::bare(3, 0);
        let mut clock = SteppedClock::default();
        let driver = Driver::new(DriverConfig {
            max_ticks: 40,
            min_ticks: 0,
            frame_every: 10,
        });
        let mut frames = 0;
        let report = driver.run(&mut sim, &mut clock, |_, _| frames += 1);
        assert_eq!(report.ticks, 40);
        assert_eq!(frames, 4);
        assert_eq!(report.final_ms, 40 * TICK_INTERVAL_MS);
        // One collector per side, on the first tick past the 5s cooldown.
        assert_eq!(report.summary.spawned, 2);
    }

    #[test]
    fn test_driver_is_reproducible() {
        let run = || {
            let mut sim = Simulation::new(11, 0);
            let mut clock = SteppedClock::default();
            Driver::new(DriverConfig {
                max_ticks: 300,
                min_ticks: 0,
                frame_every: 0,
            })
            .run(&mut sim, &mut clock, |_, _| {})
        };
        assert_eq!(run(), run());
    }
}
