//! Melee combat with per-matchup damage multipliers.
//!
//! Every attack is melee: the attacker must already be adjacent to its
//! target. Damage is the attacker's attack value scaled by its bonus
//! multiplier against the target's archetype and floored. A unit whose
//! health reaches zero dies on the spot: it leaves the grid and is queued
//! for the end-of-tick purge.

use serde::{Deserialize, Serialize};

use crate::components::{Archetype, BonusTable, EntityId};
use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::world::World;

/// One resolved attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// The entity dealing damage.
    pub attacker: EntityId,
    /// The entity receiving damage.
    pub target: EntityId,
    /// Amount of damage dealt.
    pub damage: u32,
    /// Whether this attack killed the target.
    pub killed: bool,
}

/// `floor(attack * multiplier)` against `target`.
#[must_use]
pub fn calculate_damage(attack: u32, bonus: &BonusTable, target: Archetype) -> u32 {
    let scaled = Fixed::from_num(attack) * bonus.multiplier_against(target);
    scaled.floor().to_num::<u32>()
}

/// Resolve one attack from the unit at `attacker` on the unit at `target`.
///
/// Fails with [`GameError::InvalidTarget`] if either slot is not a living
/// unit or both belong to the same faction. Nothing changes in that case.
pub fn attack(world: &mut World, attacker: usize, target: usize) -> Result<DamageEvent> {
    let (attacker_id, faction, attack, bonus) = match world.entities.unit(attacker) {
        Some(u) if u.is_alive() => (u.id, u.faction, u.attack, u.bonus),
        _ => {
            return Err(GameError::InvalidTarget(format!(
                "attacker in slot {attacker} is not a living unit"
            )))
        }
    };

    let Some(defender) = world.entities.unit_mut(target) else {
        return Err(GameError::InvalidTarget(format!(
            "slot {target} does not hold a unit"
        )));
    };
    if !defender.is_alive() {
        return Err(GameError::InvalidTarget(format!(
            "unit {} is already dead",
            defender.id
        )));
    }
    if defender.faction == faction {
        return Err(GameError::InvalidTarget(format!(
            "unit {} is an ally of {attacker_id}",
            defender.id
        )));
    }

    let damage = calculate_damage(attack, &bonus, defender.archetype());
    let target_id = defender.id;
    let killed = defender.health.apply_damage(damage);
    if killed {
        world.kill_unit(target);
        tracing::debug!(attacker = attacker_id, target = target_id, "Unit killed");
    }

    Ok(DamageEvent {
        attacker: attacker_id,
        target: target_id,
        damage,
        killed,
    })
}

/// Attack one adjacent enemy picked uniformly at random, if any.
pub fn fight_adjacent_enemies(world: &mut World, slot: usize) -> Option<DamageEvent> {
    let unit = world.entities.unit(slot).filter(|u| u.is_alive())?;
    let (faction, position) = (unit.faction, unit.position);

    let adjacent: Vec<usize> = world
        .living_units()
        .filter(|(_, u)| u.faction != faction && position.is_adjacent(u.position))
        .map(|(s, _)| s)
        .collect();
    if adjacent.is_empty() {
        return None;
    }

    let pick = adjacent[world.roll(adjacent.len())];
    match attack(world, slot, pick) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::debug!(%err, "Adjacent attack skipped");
            None
        }
    }
}
