//! Modifier lifecycle sweeps run by the driver every tick: expiry first,
//! then probabilistic renewal.

use chrono::NaiveDateTime;
use tw_core::{ModifierId, WorldState};

use crate::error::SimResult;

/// Deactivate every still-flagged modifier whose window has ended.
///
/// Returns the ids that were deactivated on this call.
pub fn expire_modifiers(world: &mut WorldState, now: NaiveDateTime) -> Vec<ModifierId> {
    let expired: Vec<ModifierId> = world
        .modifiers()
        .filter(|m| m.is_flagged_active() && m.has_expired(now))
        .map(|m| m.id)
        .collect();

    for id in &expired {
        world.deactivate_modifier(*id);
        tracing::debug!(modifier = %id, "modifier expired");
    }
    expired
}

/// Roll renewal for every expired modifier due for a check at `now`.
///
/// Each due modifier draws exactly one value from the world RNG, in id
/// order. A roll below the policy's probability stores a successor and
/// links it to its parent. Returns the ids of the new records.
pub fn renew_modifiers(world: &mut WorldState, now: NaiveDateTime) -> SimResult<Vec<ModifierId>> {
    let due: Vec<ModifierId> = world
        .modifiers()
        .filter(|m| m.renewal_due(now))
        .map(|m| m.id)
        .collect();

    let mut renewed = Vec::new();
    for id in due {
        let roll = world.rng_mut().next_f64();
        let Some(parent) = world.modifier_mut(id) else {
            continue;
        };
        parent.mark_renewal_checked(now);
        let probability = parent.renewal.as_ref().map_or(0.0, |p| p.probability);
        if roll >= probability {
            tracing::debug!(modifier = %id, roll, probability, "renewal roll failed");
            continue;
        }

        let child_id = world.next_modifier_id();
        let Some(parent) = world.modifier_mut(id) else {
            continue;
        };
        let child = parent.renew(child_id, now)?;
        tracing::info!(
            name = %child.name,
            target = %child.target,
            start = child.start_period(),
            end = child.end_period(),
            "modifier renewed"
        );
        world.insert_modifier(child)?;
        renewed.push(child_id);
    }
    Ok(renewed)
}
