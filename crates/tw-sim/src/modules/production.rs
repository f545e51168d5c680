use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tw_core::{Frequency, ValueDomain, WorldState};

use crate::error::{SimError, SimResult};
use crate::module::BehaviorModule;
use crate::modules::parse_config;

/// Baseline output of one resource (harvests, springs, mining).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductionRate {
    /// Resource credited.
    pub resource: String,
    /// Units added per period before modifiers.
    pub amount: f64,
    /// Period of the output.
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
}

fn default_frequency() -> Frequency {
    Frequency::Hourly
}

/// Settings of the `production` module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Outputs applied each tick, in order.
    #[serde(default)]
    pub rates: Vec<ProductionRate>,
}

/// Adds configured amounts at each period start.
///
/// Unlike replenishment this runs for finite resources too, and the output
/// passes through modifiers on the resource first, then modifiers on the
/// `production` module. Capacity still caps the result.
#[derive(Debug, Default)]
pub struct ProductionModule {
    config: ProductionConfig,
}

impl ProductionModule {
    /// Registry id.
    pub const ID: &'static str = "production";

    /// An unconfigured module; settings arrive in `init`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured outputs.
    pub fn rates(&self) -> &[ProductionRate] {
        &self.config.rates
    }
}

impl BehaviorModule for ProductionModule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(&mut self, world: &mut WorldState, config: &serde_json::Value) -> SimResult<()> {
        let parsed: ProductionConfig = parse_config(Self::ID, config)?;
        if let Some(bad) = parsed
            .rates
            .iter()
            .find(|r| !r.amount.is_finite() || r.amount < 0.0)
        {
            return Err(SimError::Module {
                module: Self::ID.to_string(),
                reason: format!("negative production {} for \"{}\"", bad.amount, bad.resource),
            });
        }
        for rate in &parsed.rates {
            if world.resource(&rate.resource).is_none() {
                tracing::warn!(resource = %rate.resource, "production configured for unknown resource");
            }
        }
        tracing::debug!(rates = parsed.rates.len(), "production initialized");
        self.config = parsed;
        Ok(())
    }

    fn on_tick(&mut self, world: &mut WorldState, now: NaiveDateTime) -> SimResult<()> {
        for rate in &self.config.rates {
            if !rate.frequency.is_period_start(now) || world.resource(&rate.resource).is_none() {
                continue;
            }
            let adjusted =
                world.effective_resource_value(&rate.resource, rate.amount, ValueDomain::NonNegative);
            let adjusted = world.effective_module_value(Self::ID, adjusted, ValueDomain::NonNegative);
            let added = world.add_to_resource(&rate.resource, adjusted);
            tracing::trace!(resource = %rate.resource, requested = adjusted, added, "produced");
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
