use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tw_core::{EmploymentComponent, Entity, HouseholdComponent};

use crate::error::{SimError, SimResult};

/// How a source turns a request into delivered units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentStrategy {
    /// Debit the entity's own `Inventory`.
    Inventory,
    /// Debit the `Inventory` of the entity's household.
    Household,
    /// Pay per-unit costs from `Wealth`.
    Market,
    /// Convert `Inventory` inputs using the entity's employment.
    Production,
    /// Draw from a global resource.
    World,
}

impl FulfillmentStrategy {
    /// Config tag of the strategy.
    pub fn label(self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Household => "household",
            Self::Market => "market",
            Self::Production => "production",
            Self::World => "world",
        }
    }
}

impl fmt::Display for FulfillmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FulfillmentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inventory" => Ok(Self::Inventory),
            "household" => Ok(Self::Household),
            "market" => Ok(Self::Market),
            "production" => Ok(Self::Production),
            "world" => Ok(Self::World),
            other => Err(other.to_string()),
        }
    }
}

/// Applicability predicate. Every field that is set must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceCondition {
    /// The entity carries a component with this type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_component: Option<String>,
    /// The entity's `Employment` has this job type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    /// The entity belongs to a household.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_household: bool,
}

impl SourceCondition {
    /// True if `entity` satisfies every set field.
    pub fn matches(&self, entity: &Entity) -> bool {
        if self
            .has_component
            .as_ref()
            .is_some_and(|name| !entity.has(name))
        {
            return false;
        }
        if let Some(job) = &self.employment_type {
            match entity.get::<EmploymentComponent>() {
                Some(employment) if employment.job_type.as_deref() == Some(job.as_str()) => {}
                _ => return false,
            }
        }
        if self.has_household && entity.get::<HouseholdComponent>().is_none() {
            return false;
        }
        true
    }
}

/// One configured way to satisfy a requirement, as written in config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    /// Identifier reported in outcomes.
    pub id: String,
    /// Lower ranks are tried first; ties keep declaration order.
    #[serde(default)]
    pub priority: i32,
    /// When the source applies; empty matches everyone.
    #[serde(default)]
    pub condition: SourceCondition,
    /// Per-unit costs, by resource id.
    #[serde(default)]
    pub costs: BTreeMap<String, f64>,
    /// Strategy tag, validated when the resolver is built.
    pub strategy: String,
    /// Global resource drawn by `market` and `world` sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply: Option<String>,
    /// Units produced per unit of cost, overriding the employment rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

impl SourceSpec {
    /// A rank-0 source with no condition or costs.
    pub fn new(id: impl Into<String>, strategy: FulfillmentStrategy) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            condition: SourceCondition::default(),
            costs: BTreeMap::new(),
            strategy: strategy.label().to_string(),
            supply: None,
            rate: None,
        }
    }

    /// Set the rank.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restrict the source to matching entities.
    pub fn with_condition(mut self, condition: SourceCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Add a per-unit cost.
    pub fn with_cost(mut self, resource_id: &str, per_unit: f64) -> Self {
        self.costs.insert(resource_id.to_string(), per_unit);
        self
    }

    /// Set the global resource drawn.
    pub fn with_supply(mut self, resource_id: &str) -> Self {
        self.supply = Some(resource_id.to_string());
        self
    }

    /// Override the production rate.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }
}

/// A validated source ready for the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementSource {
    /// Identifier reported in outcomes.
    pub id: String,
    /// Rank; lower is tried first.
    pub priority: i32,
    /// When the source applies.
    pub condition: SourceCondition,
    /// Per-unit costs, by resource id.
    pub costs: BTreeMap<String, f64>,
    /// How units are delivered.
    pub strategy: FulfillmentStrategy,
    /// Global resource drawn, if any.
    pub supply: Option<String>,
    /// Production rate override.
    pub rate: Option<f64>,
}

impl TryFrom<SourceSpec> for RequirementSource {
    type Error = SimError;

    fn try_from(spec: SourceSpec) -> SimResult<Self> {
        let strategy = spec
            .strategy
            .parse::<FulfillmentStrategy>()
            .map_err(|strategy| SimError::UnknownStrategy {
                source_id: spec.id.clone(),
                strategy,
            })?;
        if let Some((resource, cost)) = spec
            .costs
            .iter()
            .find(|(_, cost)| !cost.is_finite() || **cost < 0.0)
        {
            return Err(SimError::Config(format!(
                "source \"{}\" has invalid cost {cost} for \"{resource}\"",
                spec.id
            )));
        }
        if let Some(rate) = spec.rate.filter(|r| !r.is_finite() || *r <= 0.0) {
            return Err(SimError::Config(format!(
                "source \"{}\" has non-positive rate {rate}",
                spec.id
            )));
        }
        Ok(Self {
            id: spec.id,
            priority: spec.priority,
            condition: spec.condition,
            costs: spec.costs,
            strategy,
            supply: spec.supply,
            rate: spec.rate,
        })
    }
}
