//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A world is fully described by its seed, its creation time and the
//! sequence of tick times and control actions applied to it. Sources of
//! non-determinism to watch for:
//!
//! - **Floating-point math**: damage multipliers use
//!   [`army_core::math::Fixed`], never `f32`.
//!
//! - **HashMap iteration order**: entities live in one insertion-ordered
//!   list and units always act in that order.
//!
//! - **System randomness**: every roll goes through the world's seeded RNG.
//!
//! - **Wall clock**: the core never reads it; the driver passes the time.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual rules (movement, combat, production)
//! 2. **Property tests**: Random control sequences still replay exactly
//! 3. **Integration tests**: Full games are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use army_core::simulation::{Simulation, TickEvents, TICK_INTERVAL_MS};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Advance `sim` by one tick at the reference cadence.
pub fn step(sim: &mut Simulation) -> TickEvents {
    let now = sim.now_ms() + TICK_INTERVAL_MS;
    sim.advance_one_tick(now)
}

/// Advance `sim` by `ticks` ticks at the reference cadence.
pub fn run_ticks(sim: &mut Simulation, ticks: u64) -> Vec<TickEvents> {
    (0..ticks).map(|_| step(sim)).collect()
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use army_core::simulation::Simulation;
/// use army_test_utils::determinism::{step, verify_determinism};
///
/// let result = verify_determinism(
///     3,
///     50,
///     || Simulation::new(7, 0),
///     |sim| { step(sim); },
///     Simulation::state_hash,
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Runs the simulation twice with identical setup and compares final hashes.
///
/// # Example
///
/// ```
/// use army_core::prelude::*;
/// use army_test_utils::determinism::verify_simulation_determinism;
///
/// let ok = verify_simulation_determinism(
///     || {
///         let mut sim = Simulation::new(3, 0);
///         sim.spawn_unit(Archetype::Cavalry, FactionId::White).unwrap();
///         sim
///     },
///     100,
/// );
/// assert!(ok);
/// ```
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            step(sim);
        },
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// or memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    run_ticks(&mut sim, num_ticks);
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        step(&mut sim1);
        step(&mut sim2);

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use army_core::components::Archetype;
    use army_core::factions::FactionId;
    use army_core::math::{GridPos, COLS, ROWS};
    use army_core::simulation::Simulation;
    use proptest::prelude::*;

    /// One operator action on a running simulation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ControlAction {
        /// Advance this many ticks.
        Tick(u8),
        /// Spawn a unit at its faction's spawn point.
        Spawn(Archetype, FactionId),
        /// Toggle every unit of an archetype.
        Toggle(Archetype),
        /// Kill every unit.
        KillAll,
        /// Force a flag.
        SpawnFlag,
        /// Force a stone.
        SpawnStone,
    }

    impl ControlAction {
        /// Apply the action, ignoring placement failures on a full board.
        pub fn apply(self, sim: &mut Simulation) {
            match self {
                Self::Tick(n) => {
                    super::run_ticks(sim, u64::from(n));
                }
                Self::Spawn(archetype, faction) => {
                    let _ = sim.spawn_unit(archetype, faction);
                }
                Self::Toggle(archetype) => {
                    sim.toggle_action(archetype);
                }
                Self::KillAll => {
                    sim.kill_all_units();
                }
                Self::SpawnFlag => {
                    let _ = sim.spawn_flag();
                }
                Self::SpawnStone => {
                    let _ = sim.spawn_stone();
                }
            }
        }
    }

    /// Any in-bounds cell.
    pub fn arb_grid_pos() -> impl Strategy<Value = GridPos> {
        (0..ROWS, 0..COLS).prop_map(|(x, y)| GridPos::new(x, y))
    }

    /// Any archetype.
    pub fn arb_archetype() -> impl Strategy<Value = Archetype> {
        prop::sample::select(Archetype::ALL.to_vec())
    }

    /// Either faction.
    pub fn arb_faction() -> impl Strategy<Value = FactionId> {
        prop::sample::select(FactionId::ALL.to_vec())
    }

    /// Any RNG seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Any single control action, weighted toward ticking and spawning.
    pub fn arb_control_action() -> impl Strategy<Value = ControlAction> {
        prop_oneof![
            4 => (1u8..20).prop_map(ControlAction::Tick),
            4 => (arb_archetype(), arb_faction()).prop_map(|(a, f)| ControlAction::Spawn(a, f)),
            1 => arb_archetype().prop_map(ControlAction::Toggle),
            1 => Just(ControlAction::KillAll),
            1 => Just(ControlAction::SpawnFlag),
            1 => Just(ControlAction::SpawnStone),
        ]
    }

    /// A sequence of control actions.
    pub fn arb_control_sequence(max_len: usize) -> impl Strategy<Value = Vec<ControlAction>> {
        proptest::collection::vec(arb_control_action(), 0..max_len)
    }
}
