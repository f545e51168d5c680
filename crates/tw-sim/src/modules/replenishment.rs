use chrono::NaiveDateTime;
use tw_core::{ValueDomain, WorldState};

use crate::error::SimResult;
use crate::module::BehaviorModule;

/// Refills renewable resources at the start of each replenishment period.
///
/// The configured rate passes through every active modifier on the
/// resource, so a drought at -30% refills 70% of the usual amount.
#[derive(Debug, Default)]
pub struct ReplenishmentModule;

impl ReplenishmentModule {
    /// Registry id.
    pub const ID: &'static str = "replenishment";

    /// The module; it takes no settings.
    pub fn new() -> Self {
        Self
    }
}

impl BehaviorModule for ReplenishmentModule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(&mut self, world: &mut WorldState, _config: &serde_json::Value) -> SimResult<()> {
        let renewable = world.resources().filter(|r| !r.is_finite()).count();
        tracing::debug!(renewable, "replenishment initialized");
        Ok(())
    }

    fn on_tick(&mut self, world: &mut WorldState, now: NaiveDateTime) -> SimResult<()> {
        let due: Vec<(String, f64)> = world
            .resources()
            .filter(|r| r.should_replenish(now) && !r.is_at_capacity())
            .filter_map(|r| r.replenishment_rate().map(|rate| (r.id.clone(), rate)))
            .collect();

        for (id, base) in due {
            let rate = world.effective_resource_value(&id, base, ValueDomain::NonNegative);
            let added = world.add_to_resource(&id, rate);
            tracing::trace!(resource = %id, rate, added, "replenished");
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
