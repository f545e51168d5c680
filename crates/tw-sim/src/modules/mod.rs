//! Built-in behavior modules.

mod consumption;
mod needs;
mod production;
mod replenishment;

pub use consumption::{ConsumptionConfig, ConsumptionModule, ConsumptionRate};
pub use needs::{NeedRule, NeedsConfig, NeedsModule};
pub use production::{ProductionConfig, ProductionModule, ProductionRate};
pub use replenishment::ReplenishmentModule;

use serde::de::DeserializeOwned;

use crate::error::{SimError, SimResult};

/// Decode a module's settings. A missing (`null`) block means defaults.
pub(crate) fn parse_config<T>(module: &str, value: &serde_json::Value) -> SimResult<T>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| SimError::Module {
        module: module.to_string(),
        reason: format!("invalid config: {e}"),
    })
}
