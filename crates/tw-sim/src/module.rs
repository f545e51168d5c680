use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use tw_core::WorldState;

use crate::error::{SimError, SimResult};

/// A pluggable behavior that runs each tick.
///
/// Modules are executed in registration order and never call each other;
/// they communicate only through the [`WorldState`] they are handed. Any
/// state a module needs across a pause/resume must live in the world (as
/// resources, components, or modifiers), because only the world is
/// persisted.
pub trait BehaviorModule: fmt::Debug {
    /// Unique identifier, also used as a modifier target.
    fn id(&self) -> &str;

    /// Called once when a run starts, including when it resumes from a
    /// snapshot. Parse settings here; do not mutate persisted world state.
    fn init(&mut self, world: &mut WorldState, config: &serde_json::Value) -> SimResult<()>;

    /// Called once per tick, after the clock has advanced.
    fn on_tick(&mut self, world: &mut WorldState, now: NaiveDateTime) -> SimResult<()>;

    /// Called once when the run stops, before the final snapshot.
    fn shutdown(&mut self, _world: &mut WorldState) -> SimResult<()> {
        Ok(())
    }

    /// Support downcasting to concrete types.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Support downcasting to concrete types.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Builds a fresh module instance.
pub type ModuleFactory = Box<dyn Fn() -> Box<dyn BehaviorModule>>;

/// Maps module ids to factories so runs can be started or resumed by id.
#[derive(Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, ModuleFactory>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in modules.
    pub fn with_builtins() -> Self {
        use crate::modules::{
            ConsumptionModule, NeedsModule, ProductionModule, ReplenishmentModule,
        };

        let mut registry = Self::new();
        registry.register(ReplenishmentModule::ID, || {
            Box::new(ReplenishmentModule::new())
        });
        registry.register(ProductionModule::ID, || Box::new(ProductionModule::new()));
        registry.register(ConsumptionModule::ID, || Box::new(ConsumptionModule::new()));
        registry.register(NeedsModule::ID, || Box::new(NeedsModule::new()));
        registry
    }

    /// Add or replace the factory for `id`.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn BehaviorModule> + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// True if `id` has a factory.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the module registered under `id`.
    pub fn create(&self, id: &str) -> SimResult<Box<dyn BehaviorModule>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| SimError::UnknownModule(id.to_string()))?;
        let module = factory();
        if module.id() != id {
            return Err(SimError::Config(format!(
                "factory for \"{id}\" built module \"{}\"",
                module.id()
            )));
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Probe;

    impl BehaviorModule for Probe {
        fn id(&self) -> &str {
            "probe"
        }
        fn init(&mut self, _world: &mut WorldState, _config: &serde_json::Value) -> SimResult<()> {
            Ok(())
        }
        fn on_tick(&mut self, _world: &mut WorldState, _now: NaiveDateTime) -> SimResult<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = ModuleRegistry::with_builtins();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["consumption", "needs", "production", "replenishment"]);
        assert!(registry.create("production").is_ok());
        assert!(registry.create("needs").is_ok());
    }

    #[test]
    fn unknown_module_is_an_error() {
        let registry = ModuleRegistry::new();
        assert!(matches!(
            registry.create("ghost"),
            Err(SimError::UnknownModule(id)) if id == "ghost"
        ));
    }

    #[test]
    fn mismatched_factory_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.register("not-probe", || Box::new(Probe));
        assert!(matches!(registry.create("not-probe"), Err(SimError::Config(_))));
        registry.register("probe", || Box::new(Probe));
        let module = registry.create("probe").unwrap();
        assert!(module.as_any().downcast_ref::<Probe>().is_some());
    }
}
