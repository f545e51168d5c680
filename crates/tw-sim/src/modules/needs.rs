use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tw_core::{EntityId, Frequency, NeedsComponent, PressureComponent, ValueDomain, WorldState};

use crate::error::{SimError, SimResult};
use crate::module::BehaviorModule;
use crate::modules::parse_config;
use crate::resolver::{RequirementResolver, ResolverConfig};

/// Links one need to the requirement that relieves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedRule {
    /// Need name on the entity's `Needs` component.
    pub name: String,
    /// Requirement resolved when the need is pressing.
    pub requirement: String,
    /// Level above which the entity seeks relief.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Requirement units requested per unit of need level.
    #[serde(default = "default_one")]
    pub scale: f64,
    /// Need relieved per delivered unit is drawn from `[restore_min, restore_max)`.
    #[serde(default = "default_one")]
    pub restore_min: f64,
    /// Upper end of the relief range.
    #[serde(default = "default_one")]
    pub restore_max: f64,
}

fn default_threshold() -> f64 {
    0.5
}

fn default_one() -> f64 {
    1.0
}

impl NeedRule {
    /// A rule with default threshold, scale and relief.
    pub fn new(name: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirement: requirement.into(),
            threshold: default_threshold(),
            scale: 1.0,
            restore_min: 1.0,
            restore_max: 1.0,
        }
    }

    /// Level above which the need is resolved.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Requirement units per unit of need level.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Relief per delivered unit, drawn from `[min, max)`.
    pub fn with_restore(mut self, min: f64, max: f64) -> Self {
        self.restore_min = min;
        self.restore_max = max;
        self
    }

    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold {} is outside [0, 1]", self.threshold));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(format!("scale {} must be positive", self.scale));
        }
        if !(self.restore_min >= 0.0 && self.restore_min <= self.restore_max)
            || !self.restore_max.is_finite()
        {
            return Err(format!(
                "restore range [{}, {}] is invalid",
                self.restore_min, self.restore_max
            ));
        }
        Ok(())
    }
}

/// Settings of the `needs` module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedsConfig {
    /// How often pressing needs are resolved. Accumulation is always hourly.
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    /// Needs to resolve, in order.
    #[serde(default)]
    pub needs: Vec<NeedRule>,
    /// Sources for the requirements the needs name.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

fn default_frequency() -> Frequency {
    Frequency::Hourly
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            needs: Vec::new(),
            resolver: ResolverConfig::default(),
        }
    }
}

/// Accumulates entity needs and resolves them through a [`RequirementResolver`].
///
/// The hourly growth rate of every need is scaled by modifiers targeting
/// the `needs` module. Whatever a resolution leaves unmet is recorded on
/// the entity's `Pressure` component.
#[derive(Debug, Default)]
pub struct NeedsModule {
    config: NeedsConfig,
    resolver: RequirementResolver,
}

impl NeedsModule {
    /// Registry id.
    pub const ID: &'static str = "needs";

    /// An unconfigured module; settings arrive in `init`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed settings.
    pub fn config(&self) -> &NeedsConfig {
        &self.config
    }

    /// Resolver built from the settings.
    pub fn resolver(&self) -> &RequirementResolver {
        &self.resolver
    }

    fn satisfy(&self, world: &mut WorldState, id: EntityId, rule: &NeedRule) {
        let Some(level) = world
            .get_component::<NeedsComponent>(id)
            .filter(|needs| needs.needs.contains_key(&rule.name))
            .map(|needs| needs.level(&rule.name))
        else {
            return;
        };
        if level <= rule.threshold {
            return;
        }

        let outcome = self
            .resolver
            .resolve(world, id, &rule.requirement, level * rule.scale);

        if outcome.fulfilled > 0.0 {
            let restore = world.rng_mut().range_f64(rule.restore_min, rule.restore_max);
            if let Some(needs) = world.get_component_mut::<NeedsComponent>(id) {
                needs.relieve(&rule.name, outcome.fulfilled * restore);
            }
        }
        if outcome.unmet > 0.0 {
            if let Some(pressure) = world
                .entity_mut(id)
                .and_then(|e| e.get_or_default::<PressureComponent>())
            {
                pressure.add(&rule.requirement, outcome.unmet);
            }
            tracing::debug!(
                entity = %id,
                need = %rule.name,
                requirement = %rule.requirement,
                unmet = outcome.unmet,
                "need left unmet"
            );
        }
    }
}

impl BehaviorModule for NeedsModule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(&mut self, world: &mut WorldState, config: &serde_json::Value) -> SimResult<()> {
        let parsed: NeedsConfig = parse_config(Self::ID, config)?;
        for rule in &parsed.needs {
            rule.validate().map_err(|reason| SimError::Module {
                module: Self::ID.to_string(),
                reason: format!("need \"{}\": {reason}", rule.name),
            })?;
        }
        self.resolver = RequirementResolver::from_config(parsed.resolver.clone())?;
        self.config = parsed;
        tracing::debug!(
            rules = self.config.needs.len(),
            entities = world.query::<NeedsComponent>().count(),
            "needs initialized"
        );
        Ok(())
    }

    fn on_tick(&mut self, world: &mut WorldState, now: NaiveDateTime) -> SimResult<()> {
        let ids: Vec<EntityId> = world.query::<NeedsComponent>().map(|(id, _)| id).collect();
        let hours = world.effective_module_value(Self::ID, 1.0, ValueDomain::NonNegative);
        for id in &ids {
            if let Some(needs) = world.get_component_mut::<NeedsComponent>(*id) {
                needs.accumulate(hours);
            }
        }

        if !self.config.frequency.is_period_start(now) {
            return Ok(());
        }
        for id in ids {
            for rule in &self.config.needs {
                self.satisfy(world, id, rule);
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
