//! Integration tests for whole-tick behavior.

use army_core::behavior::StoneOutcome;
use army_core::combat;
use army_core::components::{Archetype, Behavior, CollectorState, INVINCIBLE_HEALTH};
use army_core::error::GameError;
use army_core::factions::FactionId;
use army_core::math::GridPos;
use army_core::simulation::{Simulation, TICK_INTERVAL_MS};
use army_test_utils::determinism::{run_ticks, step, verify_simulation_determinism};
use army_test_utils::fixtures::{empty_board, fill_board_except, health, place, position, slot};
use proptest::prelude::*;

#[test]
fn test_two_hits_kill_and_purge() {
    let mut sim = empty_board(1);
    let attacker = place(&mut sim, FactionId::White, GridPos::new(2, 10), Behavior::deserter());
    let target = place(&mut sim, FactionId::Black, GridPos::new(3, 10), Behavior::collector());
    sim.world_mut().unit_by_id_mut(target).unwrap().health.current = 15;

    let (a, t) = (slot(sim.world(), attacker), slot(sim.world(), target));
    let first = combat::attack(sim.world_mut(), a, t).unwrap();
    assert_eq!(first.damage, 10);
    assert!(!first.killed);
    assert_eq!(health(&sim, target), Some(5));

    let second = combat::attack(sim.world_mut(), a, t).unwrap();
    assert!(second.killed);
    assert_eq!(health(&sim, target), Some(0));
    assert_eq!(position(&sim, target), Some(GridPos::OFF_MAP));
    assert_eq!(sim.world().pending_removal(), &[target]);

    sim.toggle_action(Archetype::Deserter);
    step(&mut sim);
    assert_eq!(health(&sim, target), None);
}

#[test]
fn test_full_collector_returns_deposits_then_goes_back_to_work() {
    let mut sim = empty_board(1);
    let collector = place(
        &mut sim,
        FactionId::White,
        GridPos::new(5, 2),
        Behavior::Collector {
            state: CollectorState::Collecting,
            carried: 25,
        },
    );
    let behavior = |sim: &Simulation| sim.world().unit_by_id(collector).unwrap().behavior;

    // Full on arrival: switches to returning without moving.
    let events = step(&mut sim);
    assert!(events.deposits.is_empty());
    assert_eq!(position(&sim, collector), Some(GridPos::new(5, 2)));
    assert_eq!(
        behavior(&sim),
        Behavior::Collector {
            state: CollectorState::Returning,
            carried: 25
        }
    );

    // Already next to the depot.
    step(&mut sim);
    assert_eq!(
        behavior(&sim),
        Behavior::Collector {
            state: CollectorState::Depositing,
            carried: 25
        }
    );

    let events = step(&mut sim);
    assert_eq!(events.deposits.len(), 1);
    assert_eq!(events.deposits[0].amount, 25);
    assert_eq!(sim.world().city(FactionId::White).unwrap().wood, 25);
    assert_eq!(sim.world().city(FactionId::Black).unwrap().wood, 0);
    assert_eq!(
        behavior(&sim),
        Behavior::Collector {
            state: CollectorState::Collecting,
            carried: 0
        }
    );

    // No trees on the board: the collector idles.
    step(&mut sim);
    assert_eq!(position(&sim, collector), Some(GridPos::new(5, 2)));
}

#[test]
fn test_collectors_fell_tree_and_tree_regrows() {
    let mut sim = empty_board(1);
    let home = GridPos::new(0, 1);
    sim.world_mut().place_tree(home);
    let crew: Vec<_> = [(0, 0), (0, 2), (1, 0), (1, 1)]
        .into_iter()
        .map(|(x, y)| place(&mut sim, FactionId::White, GridPos::new(x, y), Behavior::collector()))
        .collect();

    for now in [100, 200, 300, 400] {
        sim.advance_one_tick(now);
    }
    assert_eq!(sim.world().entities().trees().next().unwrap().1.wood, 20);
    assert_eq!(sim.world().counters().last_tree_felled_ms, None);

    sim.advance_one_tick(500);
    assert_eq!(sim.world().counters().last_tree_felled_ms, Some(500));
    let felled = sim.world().entities().trees().next().unwrap().1;
    assert!(!felled.visible);
    assert_eq!(felled.position, GridPos::OFF_MAP);
    for id in &crew {
        let unit = sim.world().unit_by_id(*id).unwrap();
        assert_eq!(
            unit.behavior,
            Behavior::Collector {
                state: CollectorState::Returning,
                carried: 25
            }
        );
    }

    let events = sim.advance_one_tick(30_499);
    assert_eq!(events.trees_regrown, 0);

    let events = sim.advance_one_tick(30_500);
    assert_eq!(events.trees_regrown, 1);
    let regrown = sim.world().entities().trees().next().unwrap().1;
    assert!(regrown.visible);
    assert_eq!(regrown.wood, 100);
    assert_eq!(regrown.position, home);
    assert_eq!(sim.world().counters().last_tree_felled_ms, None);
}

#[test]
fn test_flag_is_captured_exactly_once() {
    let mut sim = empty_board(1);
    let white = place(&mut sim, FactionId::White, GridPos::new(3, 8), Behavior::collector());
    let black = place(&mut sim, FactionId::Black, GridPos::new(3, 12), Behavior::collector());
    let flag = sim.world_mut().place_flag(GridPos::new(3, 10));

    let first = sim.advance_one_tick(1_000);
    assert!(first.flag_captures.is_empty());
    assert_eq!(position(&sim, white), Some(GridPos::new(3, 9)));
    assert_eq!(position(&sim, black), Some(GridPos::new(3, 11)));

    let second = sim.advance_one_tick(2_000);
    assert_eq!(second.flag_captures.len(), 1);
    let capture = second.flag_captures[0];
    assert_eq!(capture.flag, flag);
    assert_eq!(capture.captured_by, white);
    assert_eq!(capture.faction, FactionId::White);
    assert_eq!(capture.units_buffed, 1);

    // 150 + 75 from the bonus, then one hit from the adjacent black collector.
    assert_eq!(health(&sim, white), Some(220));
    assert_eq!(health(&sim, black), Some(150));
    assert_eq!(sim.world().counters().last_flag_capture_ms, 2_000);
    assert!(sim.world().entities().flags().next().is_none());

    let third = sim.advance_one_tick(3_000);
    assert!(third.flag_captures.is_empty());
}

#[test]
fn test_stone_fires_once() {
    let mut sim = empty_board(8);
    let cell = GridPos::new(15, 10);
    let unit = place(&mut sim, FactionId::Black, cell, Behavior::deserter());
    let stone = sim.world_mut().place_stone(cell);

    let events = step(&mut sim);
    assert_eq!(events.stone_effects.len(), 1);
    let effect = events.stone_effects[0];
    assert_eq!(effect.stone, stone);
    assert_eq!(effect.unit, unit);
    match effect.outcome {
        StoneOutcome::Death => {
            assert_eq!(events.deaths, vec![unit]);
            assert_eq!(health(&sim, unit), None);
        }
        StoneOutcome::Invincibility => {
            assert_eq!(health(&sim, unit), Some(INVINCIBLE_HEALTH));
        }
    }
    assert!(sim.world().entities().stones().next().is_none());

    let events = step(&mut sim);
    assert!(events.stone_effects.is_empty());
}

#[test]
fn test_stone_outcomes_are_even_odds() {
    let runs: u64 = 2_000;
    let deaths = (0..runs)
        .filter(|&seed| {
            let mut sim = empty_board(seed);
            let cell = GridPos::new(15, 10);
            place(&mut sim, FactionId::Black, cell, Behavior::deserter());
            sim.world_mut().place_stone(cell);
            step(&mut sim).stone_effects[0].outcome == StoneOutcome::Death
        })
        .count();
    let rate = deaths as f64 / runs as f64;
    assert!((0.45..=0.55).contains(&rate), "death rate {rate}");
}

#[test]
fn test_cavalry_combat_resets_safety_distance() {
    let mut sim = empty_board(1);
    sim.world_mut().counters_mut().cavalry_safety_distance = 6;
    place(&mut sim, FactionId::White, GridPos::new(0, 10), Behavior::cavalry());
    let deserter = place(&mut sim, FactionId::Black, GridPos::new(1, 10), Behavior::deserter());

    sim.advance_one_tick(100);
    assert_eq!(sim.world().counters().cavalry_safety_distance, 1);
    assert!(!sim.world().counters().cavalry_combat_occurred);
    assert!(health(&sim, deserter).is_some_and(|h| h < 125));
}

#[test]
fn test_safety_distance_grows_while_idle() {
    let mut sim = empty_board(1);
    run_ticks(&mut sim, 5);
    assert_eq!(sim.world().counters().cavalry_safety_distance, 6);
}

#[test]
fn test_flag_lands_on_only_free_cell() {
    let mut sim = empty_board(4);
    let free = GridPos::new(12, 19);
    fill_board_except(&mut sim, &[free]);

    let id = sim.spawn_flag().unwrap();
    let flag = sim.world().entities().flags().next().unwrap().1;
    assert_eq!(flag.id, id);
    assert_eq!(flag.position, free);

    // Flags do not block, so the cell stays free for a stone.
    assert!(sim.spawn_stone().is_ok());
    let stone_on_flag = sim.world().entities().stones().next().unwrap().1;
    assert_eq!(stone_on_flag.position, free);
}

#[test]
fn test_full_board_reports_no_position() {
    let mut sim = empty_board(4);
    fill_board_except(&mut sim, &[]);
    assert_eq!(sim.spawn_flag(), Err(GameError::NoAvailablePosition));
    assert_eq!(
        sim.spawn_unit(Archetype::Pikeman, FactionId::White),
        Err(GameError::NoAvailablePosition)
    );
    // Other archetypes still stack on the spawn point.
    assert!(sim.spawn_unit(Archetype::Collector, FactionId::White).is_ok());
}

#[test]
fn test_one_production_per_city_per_tick() {
    let mut sim = empty_board(1);
    sim.world_mut().city_mut(FactionId::White).unwrap().wood = 1_000;

    let events = sim.advance_one_tick(15_000);
    assert_eq!(events.spawned.len(), 2);
    let white = sim.world().unit_by_id(events.spawned[0]).unwrap();
    assert_eq!(white.faction, FactionId::White);
    let cost = white.archetype().stats().cost;
    assert_eq!(sim.world().city(FactionId::White).unwrap().wood, 1_000 - cost);

    let black = sim.world().unit_by_id(events.spawned[1]).unwrap();
    assert_eq!(black.archetype(), Archetype::Collector);
}

#[test]
fn test_kill_all_then_purge() {
    let mut sim = Simulation::new(3, 0);
    for archetype in Archetype::ALL {
        sim.spawn_unit(archetype, FactionId::White).unwrap();
    }
    assert_eq!(sim.kill_all_units(), 4);
    assert_eq!(sim.unit_count(FactionId::White), 0);
    step(&mut sim);
    assert_eq!(sim.world().entities().units().count(), 0);
}

#[test]
fn test_disabled_units_do_nothing() {
    let mut sim = empty_board(1);
    let unit = place(&mut sim, FactionId::White, GridPos::new(3, 8), Behavior::deserter());
    sim.world_mut().place_flag(GridPos::new(3, 12));
    sim.toggle_action(Archetype::Deserter);
    run_ticks(&mut sim, 3);
    assert_eq!(position(&sim, unit), Some(GridPos::new(3, 8)));
}

#[test]
fn test_full_game_is_deterministic() {
    let setup = || {
        let mut sim = Simulation::new(2024, 0);
        for archetype in Archetype::ALL {
            for faction in FactionId::ALL {
                sim.spawn_unit(archetype, faction).unwrap();
            }
        }
        sim
    };
    assert!(verify_simulation_determinism(setup, 1_500));
}

#[test]
fn test_clock_drives_cooldowns_not_tick_count() {
    let mut fast = empty_board(1);
    for _ in 0..100 {
        fast.advance_one_tick(10);
    }
    assert_eq!(fast.unit_count(FactionId::White), 0);

    let mut slow = empty_board(1);
    slow.advance_one_tick(5 * 1_000 + TICK_INTERVAL_MS);
    assert_eq!(slow.unit_count(FactionId::White), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_living_units_stay_on_open_ground(seed in any::<u64>(), ticks in 50u64..400) {
        let mut sim = Simulation::new(seed, 0);
        for archetype in Archetype::ALL {
            for faction in FactionId::ALL {
                let _ = sim.spawn_unit(archetype, faction);
            }
        }
        for _ in 0..ticks {
            step(&mut sim);
            let world = sim.world();
            for (_, unit) in world.entities().units() {
                prop_assert!(unit.is_alive());
                prop_assert!(unit.position.is_valid());
                for faction in FactionId::ALL {
                    prop_assert!(!world.city(faction).unwrap().covers(unit.position));
                }
            }
        }
    }
}
