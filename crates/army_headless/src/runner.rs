//! Interactive JSON-lines session.
//!
//! The runner owns one [`Simulation`] and a simulated clock. Every `tick`
//! advances the clock by the configured interval, so a session replays
//! exactly from its seed and command log.

use std::io::{self, BufRead, Write};

use army_core::components::Archetype;
use army_core::simulation::{Simulation, TICK_INTERVAL_MS};
use thiserror::Error;

use crate::protocol::{Command, Response, TickSummary};
use crate::scenario::{Scenario, ScenarioError};

/// Error type for runner sessions.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Reading commands or writing responses failed.
    #[error("Session IO failed: {0}")]
    Io(#[from] io::Error),
    /// The startup scenario could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// Headless runner configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Output state after every tick command (vs only on query).
    pub auto_state_output: bool,
    /// Scenario file to load on startup.
    pub scenario_path: Option<String>,
    /// Seed used when no scenario is given.
    pub seed: u64,
    /// Simulated time between ticks when no scenario is given.
    pub tick_interval_ms: u64,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            auto_state_output: false,
            scenario_path: None,
            seed: 0,
            tick_interval_ms: TICK_INTERVAL_MS,
        }
    }
}

/// Headless runner for controller-driven sessions.
#[derive(Debug)]
pub struct HeadlessRunner {
    config: HeadlessConfig,
    sim: Simulation,
    quit: bool,
}

impl HeadlessRunner {
    /// Create a runner around an existing simulation.
    pub fn new(sim: Simulation, config: HeadlessConfig) -> Self {
        Self {
            config,
            sim,
            quit: false,
        }
    }

    /// Create a runner from configuration, loading the scenario if any.
    pub fn with_config(mut config: HeadlessConfig) -> Result<Self, RunnerError> {
        let sim = match &config.scenario_path {
            Some(path) => {
                let scenario = Scenario::load(path)?;
                config.tick_interval_ms = scenario.tick_interval_ms;
                scenario.build()?
            }
            None => Simulation::new(config.seed, 0),
        };
        Ok(Self::new(sim, config))
    }

    /// The simulation being driven.
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Whether a `quit` command was processed.
    pub fn is_finished(&self) -> bool {
        self.quit
    }

    /// Parse and handle one input line. Blank lines produce nothing.
    pub fn handle_line(&mut self, line: &str) -> Vec<Response> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        match Command::from_json(line) {
            Ok(cmd) => self.handle(cmd),
            Err(e) => vec![Response::error(format!("Parse error: {e}"), None)],
        }
    }

    /// Handle one command.
    pub fn handle(&mut self, cmd: Command) -> Vec<Response> {
        let cmd_name = cmd.name();
        tracing::debug!(cmd = cmd_name, "Processing command");

        match cmd {
            Command::Tick { count } => {
                let mut summary = TickSummary::default();
                for _ in 0..count {
                    let now = self.sim.now_ms() + self.config.tick_interval_ms;
                    summary.absorb(&self.sim.advance_one_tick(now));
                }
                let mut responses = vec![Response::Ticked {
                    tick: self.sim.get_tick(),
                    now_ms: self.sim.now_ms(),
                    summary,
                }];
                if self.config.auto_state_output {
                    responses.push(Response::state(&self.sim));
                }
                responses
            }

            Command::Query => vec![Response::state(&self.sim)],

            Command::SpawnUnit { archetype, faction } => {
                let spawned = archetype
                    .parse::<Archetype>()
                    .and_then(|parsed| Ok((parsed, self.sim.spawn_unit(parsed, faction)?)));
                match spawned {
                    Ok((parsed, entity_id)) => vec![Response::Spawned {
                        entity_id,
                        kind: parsed.name().to_string(),
                    }],
                    Err(e) => vec![Response::error(e.to_string(), Some(cmd_name))],
                }
            }

            Command::Toggle { archetype } => match archetype.parse::<Archetype>() {
                Ok(parsed) => vec![Response::Toggled {
                    archetype: parsed.name().to_string(),
                    count: self.sim.toggle_action(parsed),
                }],
                Err(e) => vec![Response::error(e.to_string(), Some(cmd_name))],
            },

            Command::KillAll => vec![Response::Killed {
                count: self.sim.kill_all_units(),
            }],

            Command::SpawnFlag => match self.sim.spawn_flag() {
                Ok(entity_id) => vec![Response::Spawned {
                    entity_id,
                    kind: "flag".to_string(),
                }],
                Err(e) => vec![Response::error(e.to_string(), Some(cmd_name))],
            },

            Command::SpawnStone => match self.sim.spawn_stone() {
                Ok(entity_id) => vec![Response::Spawned {
                    entity_id,
                    kind: "stone".to_string(),
                }],
                Err(e) => vec![Response::error(e.to_string(), Some(cmd_name))],
            },

            Command::Restart => {
                let now = self.sim.now_ms();
                self.sim.restart(now);
                vec![Response::ack(cmd_name)]
            }

            Command::Hash => vec![Response::StateHash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            }],

            Command::Quit => {
                self.quit = true;
                vec![Response::Bye]
            }
        }
    }

    /// Run a session: ready message, then one command per line until
    /// `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<(), RunnerError> {
        write!(
            output,
            "{}",
            Response::ready(self.sim.get_tick(), self.sim.seed()).to_json_line()
        )?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            for response in self.handle_line(&line) {
                write!(output, "{}", response.to_json_line())?;
            }
            output.flush()?;
            if self.quit {
                return Ok(());
            }
        }

        // End of input without an explicit quit.
        write!(output, "{}", Response::Bye.to_json_line())?;
        output.flush()?;
        Ok(())
    }

    /// Run against the process stdin and stdout.
    pub fn run_stdio(&mut self) -> Result<(), RunnerError> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(stdin.lock(), stdout.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use army_core::factions::FactionId;

    fn runner() -> HeadlessRunner {
        HeadlessRunner::new(Simulation::bare(5, 0), HeadlessConfig::default())
    }

    #[test]
    fn test_tick_advances_simulated_clock() {
        let mut runner = runner();
        let responses = runner.handle(Command::Tick { count: 10 });
        assert_eq!(
            responses[0],
            Response::Ticked {
                tick: 10,
                now_ms: 10 * TICK_INTERVAL_MS,
                summary: TickSummary::default(),
            }
        );
    }

    #[test]
    fn test_auto_state_adds_snapshot() {
        let config = HeadlessConfig {
            auto_state_output: true,
            ..HeadlessConfig::default()
        };
        let mut runner = HeadlessRunner::new(Simulation::bare(5, 0), config);
        let responses = runner.handle(Command::Tick { count: 1 });
        assert_eq!(responses.len(), 2);
        assert!(matches!(responses[1], Response::State { tick: 1, .. }));
    }

    #[test]
    fn test_unknown_archetype_is_an_error_response() {
        let mut runner = runner();
        let responses = runner.handle(Command::SpawnUnit {
            archetype: "wizard".to_string(),
            faction: FactionId::White,
        });
        assert!(matches!(
            &responses[0],
            Response::Error { cmd: Some(cmd), .. } if cmd == "spawn_unit"
        ));
    }

    #[test]
    fn test_spawned_kind_is_the_canonical_name() {
        let mut runner = runner();
        let responses = runner.handle(Command::SpawnUnit {
            archetype: " Cavalry ".to_string(),
            faction: FactionId::White,
        });
        assert!(matches!(
            &responses[0],
            Response::Spawned { kind, .. } if kind == "cavalry"
        ));
        assert_eq!(runner.simulation().unit_count(FactionId::White), 1);
    }

    #[test]
    fn test_parse_error_keeps_session_alive() {
        let mut runner = runner();
        let responses = runner.handle_line("{not json");
        assert!(matches!(responses[0], Response::Error { cmd: None, .. }));
        assert!(!runner.is_finished());
        assert!(runner.handle_line("   ").is_empty());
    }

    #[test]
    fn test_toggle_and_kill_all_report_counts() {
        let mut runner = runner();
        runner.handle(Command::SpawnUnit {
            archetype: "Deserter".to_string(),
            faction: FactionId::Black,
        });
        let toggled = runner.handle(Command::Toggle {
            archetype: "deserter".to_string(),
        });
        assert_eq!(
            toggled[0],
            Response::Toggled {
                archetype: "deserter".to_string(),
                count: 1
            }
        );
        assert_eq!(runner.handle(Command::KillAll)[0], Response::Killed { count: 1 });
    }
}
