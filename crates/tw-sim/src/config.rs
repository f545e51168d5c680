use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tw_core::{Component, Frequency, ModifierSpec, Resource, ResourceSpec, WorldState};

use crate::error::{SimError, SimResult};

/// Configuration for a simulation run.
///
/// Everything domain-specific enters through here: resources, modifiers,
/// initial entities, and the ordered list of modules with their settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// RNG seed for deterministic simulation.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Simulated timestamp at tick 0.
    #[serde(default = "default_start")]
    pub start: NaiveDateTime,
    /// Stop after this many ticks in one run. `None` runs until stopped.
    #[serde(default)]
    pub max_ticks: Option<u64>,
    /// Persist a snapshot every N ticks. 0 disables periodic snapshots.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u64,
    /// When world summaries are logged.
    #[serde(default)]
    pub summary: SummaryConfig,
    /// Global resources to create.
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    /// Modifiers to create.
    #[serde(default)]
    pub modifiers: Vec<ModifierSpec>,
    /// Entity groups to spawn.
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    /// Modules in registration (and tick) order.
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

/// When the driver logs a world summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Log summaries at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Period counted by `interval`.
    #[serde(default = "default_summary_frequency")]
    pub frequency: Frequency,
    /// Log every N periods.
    #[serde(default = "default_interval")]
    pub interval: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: default_summary_frequency(),
            interval: 1,
        }
    }
}

/// A group of identical entities to spawn when a fresh world is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// How many entities to spawn.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Components each entity starts with.
    #[serde(default)]
    pub components: Vec<Component>,
}

/// One module to attach, with its free-form settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Registry id of the module.
    pub id: String,
    /// Module-specific settings, passed to `init`.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ModuleEntry {
    /// An entry with no settings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: serde_json::Value::Null,
        }
    }

    /// Set the module settings.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

fn default_seed() -> u64 {
    42
}

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn default_snapshot_interval() -> u64 {
    24
}

fn default_summary_frequency() -> Frequency {
    Frequency::Weekly
}

fn default_interval() -> u32 {
    1
}

fn default_count() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            start: default_start(),
            max_ticks: None,
            snapshot_interval: default_snapshot_interval(),
            summary: SummaryConfig::default(),
            resources: Vec::new(),
            modifiers: Vec::new(),
            entities: Vec::new(),
            modules: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Reject settings that would only fail later, mid-run.
    pub fn validate(&self) -> SimResult<()> {
        if self.summary.interval == 0 {
            return Err(SimError::Config(
                "summary interval must be at least 1".to_string(),
            ));
        }
        for (i, entry) in self.modules.iter().enumerate() {
            if self.modules[..i].iter().any(|m| m.id == entry.id) {
                return Err(SimError::Core(tw_core::CoreError::DuplicateModule(
                    entry.id.clone(),
                )));
            }
        }
        Ok(())
    }

    /// Settings for one module, `Null` when it is not listed.
    pub fn module_config(&self, id: &str) -> &serde_json::Value {
        static NULL: serde_json::Value = serde_json::Value::Null;
        self.modules
            .iter()
            .find(|m| m.id == id)
            .map_or(&NULL, |m| &m.config)
    }

    /// Build the tick-0 world: resources, modifiers, then entities.
    ///
    /// Modules are registered by the driver, not here.
    pub fn build_world(&self) -> SimResult<WorldState> {
        let mut world = WorldState::new(self.start, self.seed);
        for spec in &self.resources {
            world.add_resource(Resource::new(spec.clone())?)?;
        }
        for spec in &self.modifiers {
            world.add_modifier(spec.clone())?;
        }
        for group in &self.entities {
            for _ in 0..group.count {
                world.spawn_entity(group.components.iter().cloned());
            }
        }
        Ok(world)
    }

    /// Set the RNG seed for deterministic simulation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the simulated start timestamp.
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    /// Set the per-run tick limit.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Set the snapshot cadence in ticks (0 = only on shutdown).
    pub fn with_snapshot_interval(mut self, ticks: u64) -> Self {
        self.snapshot_interval = ticks;
        self
    }

    /// Set the summary schedule.
    pub fn with_summary(mut self, summary: SummaryConfig) -> Self {
        self.summary = summary;
        self
    }

    /// Add a resource declaration.
    pub fn with_resource(mut self, spec: ResourceSpec) -> Self {
        self.resources.push(spec);
        self
    }

    /// Add a modifier declaration.
    pub fn with_modifier(mut self, spec: ModifierSpec) -> Self {
        self.modifiers.push(spec);
        self
    }

    /// Spawn `count` entities with `components`.
    pub fn with_entities(mut self, count: u32, components: Vec<Component>) -> Self {
        self.entities.push(EntitySpec { count, components });
        self
    }

    /// Attach a module; order is tick order.
    pub fn with_module(mut self, entry: ModuleEntry) -> Self {
        self.modules.push(entry);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_core::{InventoryComponent, ResourceStatus};

    #[test]
    fn config_default_values() {
        let config = SimConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.snapshot_interval, 24);
        assert_eq!(config.max_ticks, None);
        assert_eq!(config.summary.frequency, Frequency::Weekly);
        assert_eq!(config.start.to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn config_builder_chain() {
        let config = SimConfig::default()
            .with_seed(123)
            .with_max_ticks(48)
            .with_snapshot_interval(6)
            .with_module(ModuleEntry::new("replenishment"));
        assert_eq!(config.seed, 123);
        assert_eq!(config.max_ticks, Some(48));
        assert_eq!(config.snapshot_interval, 6);
        assert_eq!(config.modules.len(), 1);
    }

    #[test]
    fn parses_minimal_json() {
        let config = SimConfig::from_json_str(
            r#"{
                "seed": 7,
                "start": "2023-06-01T00:00:00",
                "resources": [
                    { "id": "water", "initial_amount": 500.0, "max_capacity": 1000.0,
                      "replenishment_rate": 10.0, "replenishment_frequency": "daily" }
                ],
                "modifiers": [
                    { "name": "drought",
                      "target": { "type": "resource", "id": "water" },
                      "effect": { "structured": { "kind": "percentage", "magnitude": 0.3, "direction": "decrease" } },
                      "start_period": 2023, "end_period": 2024,
                      "renewal": { "probability": 0.5, "frequency": "yearly" } }
                ],
                "modules": [ { "id": "replenishment" } ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.resources[0].replenishment_frequency, Frequency::Daily);
        assert_eq!(config.modifiers[0].renewal.as_ref().unwrap().interval, 1);
        assert!(config.module_config("replenishment").is_null());
    }

    #[test]
    fn rejects_unknown_frequency() {
        let err = SimConfig::from_json_str(
            r#"{ "summary": { "frequency": "fortnightly" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Json(_)));
    }

    #[test]
    fn rejects_duplicate_modules() {
        let err = SimConfig::default()
            .with_module(ModuleEntry::new("needs"))
            .with_module(ModuleEntry::new("needs"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("needs"));
    }

    #[test]
    fn build_world_validates_resources() {
        let bad = SimConfig::default().with_resource(ResourceSpec::new("x", 20.0).with_capacity(10.0));
        assert!(matches!(
            bad.build_world(),
            Err(SimError::Core(tw_core::CoreError::InvalidResource { .. }))
        ));
    }

    #[test]
    fn build_world_spawns_entities() {
        let config = SimConfig::default()
            .with_resource(ResourceSpec::new("grain", 50.0).with_capacity(100.0))
            .with_entities(3, vec![InventoryComponent::default().with("grain", 1.0).into()]);
        let world = config.build_world().unwrap();
        assert_eq!(world.entity_count(), 3);
        assert_eq!(world.resource("grain").unwrap().status(), ResourceStatus::Sufficient);
    }
}
