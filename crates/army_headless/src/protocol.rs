//! JSON protocol for headless game communication.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses and state snapshots
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0",...}`
//! 2. Controller sends commands as JSON lines
//! 3. Runner answers every command with one or more responses
//! 4. On `quit` (or end of input), outputs `{"type":"bye"}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0,"seed":42}
//! -> {"cmd":"spawn_unit","archetype":"collector","faction":"white"}
//! <- {"type":"spawned","entity_id":40,"kind":"collector"}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"ticked","tick":60,"now_ms":7800,"summary":{...}}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":60,"now_ms":7800,"entities":[...],...}
//! ```

use army_core::entities::EntityView;
use army_core::factions::FactionId;
use army_core::simulation::{Simulation, TickEvents};
use serde::{Deserialize, Serialize};

/// Protocol version reported in the ready message.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance simulation by N ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Query current game state without advancing time.
    Query,

    /// Spawn a unit at its faction's spawn point.
    SpawnUnit { archetype: String, faction: FactionId },

    /// Flip the action flag of every unit of an archetype.
    Toggle { archetype: String },

    /// Kill every unit.
    KillAll,

    /// Place a flag on a random free cell.
    SpawnFlag,

    /// Place a philosophical stone on a random free cell.
    SpawnStone,

    /// Rebuild the world at the current clock reading.
    Restart,

    /// Report the current state hash (for determinism verification).
    Hash,

    /// Quit the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready { version: String, tick: u64, seed: u64 },

    /// Acknowledgment of a command.
    Ack { cmd: String },

    /// Error processing a command.
    Error {
        message: String,
        cmd: Option<String>,
    },

    /// Ticks were advanced.
    Ticked {
        tick: u64,
        now_ms: u64,
        summary: TickSummary,
    },

    /// Current game state.
    State {
        tick: u64,
        now_ms: u64,
        entities: Vec<EntityView>,
        cities: Vec<CityState>,
        hash: u64,
    },

    /// Entity was spawned.
    Spawned { entity_id: u64, kind: String },

    /// Units were toggled.
    Toggled { archetype: String, count: usize },

    /// Units were killed.
    Killed { count: usize },

    /// State hash for determinism verification.
    StateHash { tick: u64, hash: u64 },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// One city's stock and army size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityState {
    pub faction: FactionId,
    pub wood: u32,
    pub units: usize,
}

/// Counts of what happened over one or more ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub attacks: usize,
    pub deaths: usize,
    pub spawned: usize,
    pub flag_captures: usize,
    pub stone_effects: usize,
    pub wood_deposited: u32,
    pub trees_regrown: usize,
}

impl TickSummary {
    /// Fold one tick's events into the running totals.
    pub fn absorb(&mut self, events: &TickEvents) {
        self.attacks += events.damage_events.len();
        self.deaths += events.deaths.len();
        self.spawned += events.spawned.len();
        self.flag_captures += events.flag_captures.len();
        self.stone_effects += events.stone_effects.len();
        self.wood_deposited += events.deposits.iter().map(|d| d.amount).sum::<u32>();
        self.trees_regrown += events.trees_regrown;
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(tick: u64, seed: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
            seed,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Snapshot of the simulation.
    pub fn state(sim: &Simulation) -> Self {
        let cities = FactionId::ALL
            .into_iter()
            .map(|faction| CityState {
                faction,
                wood: sim.world().city(faction).map_or(0, |c| c.wood),
                units: sim.unit_count(faction),
            })
            .collect();

        Self::State {
            tick: sim.get_tick(),
            now_ms: sim.now_ms(),
            entities: sim.render_list(),
            cities,
            hash: sim.state_hash(),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::SpawnUnit { .. } => "spawn_unit",
            Self::Toggle { .. } => "toggle",
            Self::KillAll => "kill_all",
            Self::SpawnFlag => "spawn_flag",
            Self::SpawnStone => "spawn_stone",
            Self::Restart => "restart",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}
