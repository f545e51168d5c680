use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tw_core::{Frequency, ValueDomain, WorldState};

use crate::error::{SimError, SimResult};
use crate::module::BehaviorModule;
use crate::modules::parse_config;

/// Baseline draw on one resource (evaporation, spoilage, upkeep).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRate {
    /// Resource drawn from.
    pub resource: String,
    /// Units removed per period before modifiers.
    pub amount: f64,
    /// Period of the draw.
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
}

fn default_frequency() -> Frequency {
    Frequency::Hourly
}

/// Settings of the `consumption` module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionConfig {
    /// Draws applied each tick, in order.
    #[serde(default)]
    pub rates: Vec<ConsumptionRate>,
}

/// Consumes configured amounts at each period start.
///
/// The amount is adjusted first by modifiers on the resource, then by
/// modifiers on the `consumption` module itself.
#[derive(Debug, Default)]
pub struct ConsumptionModule {
    config: ConsumptionConfig,
}

impl ConsumptionModule {
    /// Registry id.
    pub const ID: &'static str = "consumption";

    /// An unconfigured module; settings arrive in `init`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured draws.
    pub fn rates(&self) -> &[ConsumptionRate] {
        &self.config.rates
    }
}

impl BehaviorModule for ConsumptionModule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(&mut self, world: &mut WorldState, config: &serde_json::Value) -> SimResult<()> {
        let parsed: ConsumptionConfig = parse_config(Self::ID, config)?;
        if let Some(bad) = parsed
            .rates
            .iter()
            .find(|r| !r.amount.is_finite() || r.amount < 0.0)
        {
            return Err(SimError::Module {
                module: Self::ID.to_string(),
                reason: format!("negative consumption {} for \"{}\"", bad.amount, bad.resource),
            });
        }
        for rate in &parsed.rates {
            if world.resource(&rate.resource).is_none() {
                tracing::warn!(resource = %rate.resource, "consumption configured for unknown resource");
            }
        }
        self.config = parsed;
        Ok(())
    }

    fn on_tick(&mut self, world: &mut WorldState, now: NaiveDateTime) -> SimResult<()> {
        for rate in &self.config.rates {
            if !rate.frequency.is_period_start(now) {
                continue;
            }
            let Some(was_depleted) = world.resource(&rate.resource).map(|r| r.is_depleted()) else {
                continue;
            };
            let adjusted =
                world.effective_resource_value(&rate.resource, rate.amount, ValueDomain::NonNegative);
            let adjusted = world.effective_module_value(Self::ID, adjusted, ValueDomain::NonNegative);
            let consumed = world.consume_resource(&rate.resource, adjusted);
            if consumed < adjusted && !was_depleted {
                tracing::warn!(
                    resource = %rate.resource,
                    requested = adjusted,
                    consumed,
                    "resource depleted"
                );
            }
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
