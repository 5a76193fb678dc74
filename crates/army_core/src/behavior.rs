//! Per-unit decision making.
//!
//! Every living unit runs the same priority chain once per tick:
//!
//! 1. Disabled units do nothing.
//! 2. If any uncaptured flag exists, step toward the nearest one and
//!    capture it on arrival. Nothing else happens this tick.
//! 3. If standing on a philosophical stone, trigger it. Nothing else
//!    happens this tick.
//! 4. Run the archetype state machine.
//! 5. Attack a random adjacent enemy, if there is one.
//!
//! Each archetype's machine is a function from its current state to its
//! next state, reading and mutating the shared [`World`].

use serde::{Deserialize, Serialize};

use crate::combat::{self, DamageEvent};
use crate::components::{
    Archetype, Behavior, CavalryState, CollectorState, DeserterState, EntityId, PikemanState,
    CAVALRY_INITIAL_SAFETY_DISTANCE, COLLECTOR_CAPACITY, COLLECTOR_HARVEST_AMOUNT,
    DESERTER_CALM_DISTANCE, DESERTER_ESCAPE_DISTANCE, INVINCIBLE_HEALTH, PIKEMAN_VISION_PER_ALLY,
};
use crate::factions::FactionId;
use crate::math::GridPos;
use crate::movement;
use crate::simulation::TickEvents;
use crate::world::World;

/// A flag changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCapture {
    /// The captured flag.
    pub flag: EntityId,
    /// Unit that reached it.
    pub captured_by: EntityId,
    /// Faction that gets the health bonus.
    pub faction: FactionId,
    /// Living allies that received the bonus.
    pub units_buffed: usize,
}

/// What a philosophical stone did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoneOutcome {
    /// The unit died.
    Death,
    /// The unit's health became [`INVINCIBLE_HEALTH`].
    Invincibility,
}

/// A philosophical stone fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoneEffect {
    /// The consumed stone.
    pub stone: EntityId,
    /// Unit standing on it.
    pub unit: EntityId,
    /// Result of the roll.
    pub outcome: StoneOutcome,
}

/// A collector handed wood to its city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    /// Depositing collector.
    pub collector: EntityId,
    /// Receiving city's faction.
    pub faction: FactionId,
    /// Wood deposited.
    pub amount: u32,
}

/// Run one unit's full turn.
pub fn run_unit_turn(world: &mut World, slot: usize, events: &mut TickEvents) {
    let Some(unit) = world.entities.unit(slot) else {
        return;
    };
    if !unit.is_alive() || !unit.action_enabled {
        return;
    }

    if pursue_flag(world, slot, events) {
        return;
    }
    if trigger_stone(world, slot, events) {
        return;
    }

    run_state_machine(world, slot, events);

    if let Some(event) = combat::fight_adjacent_enemies(world, slot) {
        events.record_damage(event);
    }
}

/// Run only the archetype state machine for the unit at `slot`.
pub fn run_state_machine(world: &mut World, slot: usize, events: &mut TickEvents) {
    let Some(behavior) = world.entities.unit(slot).map(|u| u.behavior) else {
        return;
    };

    let next = match behavior {
        Behavior::Collector { state, carried } => {
            let (state, carried) = collector_step(world, slot, state, carried, events);
            Behavior::Collector { state, carried }
        }
        Behavior::Deserter { state } => Behavior::Deserter {
            state: deserter_step(world, slot, state, events),
        },
        Behavior::Cavalry { state } => Behavior::Cavalry {
            state: cavalry_step(world, slot, state, events),
        },
        Behavior::Pikeman { state, rally_point } => Behavior::Pikeman {
            state: pikeman_step(world, slot, state, rally_point, events),
            rally_point,
        },
    };

    if let Some(unit) = world.entities.unit_mut(slot) {
        if unit.behavior.state_name() != next.state_name() {
            tracing::debug!(
                unit = unit.id,
                from = unit.behavior.state_name(),
                to = next.state_name(),
                "State transition"
            );
        }
        unit.behavior = next;
    }
}

// ============================================================================
// Shared priorities
// ============================================================================

/// Step toward the nearest open flag and capture it on arrival.
///
/// Returns true if a flag exists, which pre-empts the rest of the turn.
fn pursue_flag(world: &mut World, slot: usize, events: &mut TickEvents) -> bool {
    let Some(position) = world.position_of(slot) else {
        return false;
    };
    let Some(flag_slot) = world.nearest_open_flag(position) else {
        return false;
    };
    let Some(target) = world.position_of(flag_slot) else {
        return false;
    };

    movement::move_toward(world, slot, target);
    if world.position_of(slot) == Some(target) {
        capture_flag(world, slot, flag_slot, events);
    }
    true
}

fn capture_flag(world: &mut World, slot: usize, flag_slot: usize, events: &mut TickEvents) {
    let Some((unit_id, faction)) = world.entities.unit(slot).map(|u| (u.id, u.faction)) else {
        return;
    };
    let Some(flag) = world.entities.flag_mut(flag_slot) else {
        return;
    };
    if flag.is_collected() {
        return;
    }
    flag.capture(faction);
    let flag_id = flag.id;
    world.queue_removal(flag_id);
    world.counters.last_flag_capture_ms = world.now_ms;

    let mut units_buffed = 0;
    for ally in world.entities.units_mut() {
        if ally.faction == faction && ally.is_alive() {
            let bonus = ally.health.current / 2;
            ally.health.heal(bonus);
            units_buffed += 1;
        }
    }

    tracing::info!(
        flag = flag_id,
        unit = unit_id,
        faction = faction.short_name(),
        units_buffed,
        "Flag captured"
    );
    events.flag_captures.push(FlagCapture {
        flag: flag_id,
        captured_by: unit_id,
        faction,
        units_buffed,
    });
}

/// Fire the stone under the unit, if any.
fn trigger_stone(world: &mut World, slot: usize, events: &mut TickEvents) -> bool {
    let Some(position) = world.position_of(slot) else {
        return false;
    };
    let Some(stone_slot) = world.stone_at(position) else {
        return false;
    };

    let roll = world.roll(2);
    let Some(stone) = world.entities.stone_mut(stone_slot) else {
        return false;
    };
    stone.consume();
    let stone_id = stone.id;
    world.queue_removal(stone_id);

    let outcome = if roll == 0 {
        StoneOutcome::Death
    } else {
        StoneOutcome::Invincibility
    };
    let unit_id = match outcome {
        StoneOutcome::Death => {
            let id = world.kill_unit(slot);
            if let Some(id) = id {
                events.deaths.push(id);
            }
            id
        }
        StoneOutcome::Invincibility => world.entities.unit_mut(slot).map(|u| {
            u.health.current = INVINCIBLE_HEALTH;
            u.id
        }),
    };

    if let Some(unit) = unit_id {
        tracing::info!(stone = stone_id, unit, ?outcome, "Philosophical stone triggered");
        events.stone_effects.push(StoneEffect {
            stone: stone_id,
            unit,
            outcome,
        });
    }
    true
}

// ============================================================================
// Archetype machines
// ============================================================================

/// Shared read of the acting unit.
fn actor(world: &World, slot: usize) -> Option<(EntityId, FactionId, GridPos)> {
    world
        .entities
        .unit(slot)
        .map(|u| (u.id, u.faction, u.position))
}

/// Attack the unit at `target` if adjacent, otherwise step toward it.
fn close_and_attack(
    world: &mut World,
    slot: usize,
    target: usize,
    events: &mut TickEvents,
) -> Option<DamageEvent> {
    let (_, _, position) = actor(world, slot)?;
    let target_pos = world.position_of(target)?;
    if position.is_adjacent(target_pos) {
        match combat::attack(world, slot, target) {
            Ok(event) => {
                events.record_damage(event);
                Some(event)
            }
            Err(err) => {
                tracing::debug!(%err, "Attack skipped");
                None
            }
        }
    } else {
        movement::move_toward(world, slot, target_pos);
        None
    }
}

/// Harvest, haul, deposit.
pub fn collector_step(
    world: &mut World,
    slot: usize,
    state: CollectorState,
    carried: u32,
    events: &mut TickEvents,
) -> (CollectorState, u32) {
    let Some((id, faction, position)) = actor(world, slot) else {
        return (state, carried);
    };

    match state {
        CollectorState::Collecting => {
            if carried >= COLLECTOR_CAPACITY {
                return (CollectorState::Returning, carried);
            }
            let Some(tree_slot) = world.nearest_harvestable_tree(position) else {
                return (state, carried);
            };
            let Some(tree_pos) = world.position_of(tree_slot) else {
                return (state, carried);
            };

            if !position.is_adjacent(tree_pos) {
                movement::move_toward(world, slot, tree_pos);
                return (state, carried);
            }

            let now_ms = world.now_ms;
            let request = COLLECTOR_HARVEST_AMOUNT.min(COLLECTOR_CAPACITY - carried);
            let Some(tree) = world.entities.tree_mut(tree_slot) else {
                return (state, carried);
            };
            let taken = tree.harvest(request);
            if !tree.visible {
                world.counters.last_tree_felled_ms = Some(now_ms);
                tracing::debug!(tree = tree.id, "Tree felled");
            }

            let carried = carried + taken;
            if carried >= COLLECTOR_CAPACITY {
                (CollectorState::Returning, carried)
            } else {
                (state, carried)
            }
        }
        CollectorState::Returning => {
            let depot = faction.depot_point();
            if position.is_adjacent(depot) {
                (CollectorState::Depositing, carried)
            } else {
                movement::move_toward(world, slot, depot);
                (state, carried)
            }
        }
        CollectorState::Depositing => {
            let accepted = world
                .entities
                .city_mut(faction)
                .is_some_and(|city| city.add_wood(faction, carried));
            if accepted && carried > 0 {
                events.deposits.push(DepositEvent {
                    collector: id,
                    faction,
                    amount: carried,
                });
            }
            (CollectorState::Collecting, 0)
        }
    }
}

/// Raid collectors, flee from anything that fights back.
pub fn deserter_step(
    world: &mut World,
    slot: usize,
    state: DeserterState,
    events: &mut TickEvents,
) -> DeserterState {
    let Some((_, faction, _)) = actor(world, slot) else {
        return state;
    };
    let enemy = faction.opponent();

    match state {
        DeserterState::Attacking => {
            let Some((_, _, position)) = actor(world, slot) else {
                return state;
            };
            if let Some(prey) = world.nearest_unit(position, |u| {
                u.faction == enemy && u.archetype() == Archetype::Collector
            }) {
                close_and_attack(world, slot, prey, events);
            }

            let Some((_, _, position)) = actor(world, slot) else {
                return state;
            };
            let threat = world.nearest_unit(position, |u| {
                u.faction == enemy && u.archetype() != Archetype::Collector
            });
            match threat.and_then(|t| world.position_of(t)) {
                Some(threat_pos) if position.within(threat_pos, DESERTER_ESCAPE_DISTANCE) => {
                    DeserterState::Escaping
                }
                _ => DeserterState::Attacking,
            }
        }
        DeserterState::Escaping => {
            let Some((_, _, position)) = actor(world, slot) else {
                return state;
            };
            let threat_pos = world
                .nearest_unit(position, |u| u.faction == enemy)
                .and_then(|t| world.position_of(t));
            match threat_pos {
                Some(threat_pos) if position.within(threat_pos, DESERTER_ESCAPE_DISTANCE) => {
                    if !movement::move_away(world, slot, threat_pos) {
                        return DeserterState::Escaping;
                    }
                    let moved_to = world.position_of(slot).unwrap_or(position);
                    if moved_to.within(threat_pos, DESERTER_CALM_DISTANCE) {
                        DeserterState::Escaping
                    } else {
                        DeserterState::Attacking
                    }
                }
                _ => DeserterState::Attacking,
            }
        }
    }
}

/// Hunt deserters while keeping spacing from allied cavalry.
pub fn cavalry_step(
    world: &mut World,
    slot: usize,
    state: CavalryState,
    events: &mut TickEvents,
) -> CavalryState {
    let Some((id, faction, position)) = actor(world, slot) else {
        return state;
    };
    let safety = i64::from(world.counters.cavalry_safety_distance);
    let safety_sq = safety * safety;
    let ally_pos = world
        .nearest_unit(position, |u| {
            u.faction == faction && u.id != id && u.archetype() == Archetype::Cavalry
        })
        .and_then(|s| world.position_of(s));

    match state {
        CavalryState::Pursuing => {
            if let Some(ally_pos) = ally_pos {
                if position.distance_squared(ally_pos) < safety_sq {
                    return CavalryState::Repositioning;
                }
            }

            let enemy = faction.opponent();
            if let Some(prey) = world.nearest_unit(position, |u| {
                u.faction == enemy && u.archetype() == Archetype::Deserter
            }) {
                if let Some(event) = close_and_attack(world, slot, prey, events) {
                    tracing::debug!(cavalry = id, target = event.target, "Cavalry engaged");
                    world.counters.cavalry_combat_occurred = true;
                    world.counters.cavalry_safety_distance = CAVALRY_INITIAL_SAFETY_DISTANCE;
                }
            }
            CavalryState::Pursuing
        }
        CavalryState::Repositioning => {
            let Some(ally_pos) = ally_pos else {
                return CavalryState::Pursuing;
            };
            let d_sq = position.distance_squared(ally_pos);
            if d_sq < safety_sq {
                movement::move_away(world, slot, ally_pos);
            } else if d_sq > safety_sq {
                movement::move_toward(world, slot, ally_pos);
            }
            CavalryState::Repositioning
        }
    }
}

/// Hold a rally point, engage what the pikemen can collectively see.
pub fn pikeman_step(
    world: &mut World,
    slot: usize,
    state: PikemanState,
    rally_point: GridPos,
    events: &mut TickEvents,
) -> PikemanState {
    let Some((id, faction, position)) = actor(world, slot) else {
        return state;
    };

    match state {
        PikemanState::MovingToPosition => {
            if position == rally_point {
                PikemanState::EngagingEnemy
            } else {
                movement::move_toward(world, slot, rally_point);
                state
            }
        }
        PikemanState::EngagingEnemy => {
            let allies = world
                .living_units()
                .filter(|(_, u)| {
                    u.faction == faction && u.id != id && u.archetype() == Archetype::Pikeman
                })
                .count();
            let vision = allies as i64 * PIKEMAN_VISION_PER_ALLY;

            let enemy = faction.opponent();
            let target = world.nearest_unit(position, |u| u.faction == enemy);
            let in_sight = target
                .and_then(|t| world.position_of(t))
                .filter(|pos| position.within(*pos, vision));
            match (target, in_sight) {
                (Some(target), Some(_)) => {
                    close_and_attack(world, slot, target, events);
                    state
                }
                _ => PikemanState::ReturningToPosition,
            }
        }
        PikemanState::ReturningToPosition => {
            if position == rally_point {
                PikemanState::MovingToPosition
            } else {
                movement::move_toward(world, slot, rally_point);
                state
            }
        }
    }
}
