//! Priority-ordered fulfillment of entity requirements.
//!
//! A requirement ("food", "water", ...) maps to a list of sources. The
//! resolver walks them cheapest-rank first, asking each to cover what is
//! still missing, and records every attempt so callers can see why a need
//! went unmet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tw_core::{
    EmploymentComponent, EntityId, HouseholdComponent, InventoryComponent, ResourceHoldings,
    WealthComponent, WorldState,
};

use crate::error::SimResult;
use crate::source::{FulfillmentStrategy, RequirementSource, SourceSpec};

/// Requirement sources as they appear in config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Whether a source that covers only part of the request still counts.
    #[serde(default = "default_allow_partial")]
    pub allow_partial: bool,
    /// Sources per requirement.
    #[serde(default)]
    pub requirements: BTreeMap<String, Vec<SourceSpec>>,
}

fn default_allow_partial() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            allow_partial: true,
            requirements: BTreeMap::new(),
        }
    }
}

impl ResolverConfig {
    /// Set whether partial deliveries count.
    pub fn with_allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    /// Add a source for `requirement`.
    pub fn with_source(mut self, requirement: &str, source: SourceSpec) -> Self {
        self.requirements
            .entry(requirement.to_string())
            .or_default()
            .push(source);
        self
    }
}

/// What happened when one source was asked.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    /// The source delivered this many units.
    Fulfilled(f64),
    /// The source did not apply to the entity.
    Skipped(String),
    /// The source applied but could not deliver; nothing was debited.
    Failed(String),
}

/// One source asked during a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAttempt {
    /// The source asked.
    pub source_id: String,
    /// What it did.
    pub result: AttemptResult,
}

/// Result of resolving one requirement for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    /// Requirement resolved.
    pub requirement: String,
    /// Units asked for.
    pub requested: f64,
    /// Units delivered.
    pub fulfilled: f64,
    /// `requested - fulfilled`, never negative.
    pub unmet: f64,
    /// Sources that delivered something, in the order they were tried.
    pub sources_used: Vec<String>,
    /// Every source considered, skipped ones included.
    pub attempts: Vec<SourceAttempt>,
}

impl ResolutionOutcome {
    fn new(requirement: &str, requested: f64) -> Self {
        Self {
            requirement: requirement.to_string(),
            requested,
            fulfilled: 0.0,
            unmet: requested.max(0.0),
            sources_used: Vec::new(),
            attempts: Vec::new(),
        }
    }

    /// Nothing is left unmet.
    pub fn is_complete(&self) -> bool {
        self.unmet <= 0.0
    }

    /// Some but not all of the request was delivered.
    pub fn is_partial(&self) -> bool {
        self.fulfilled > 0.0 && self.unmet > 0.0
    }
}

/// Resolves requirements against validated, priority-sorted sources.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementResolver {
    allow_partial: bool,
    sources: BTreeMap<String, Vec<RequirementSource>>,
}

impl Default for RequirementResolver {
    fn default() -> Self {
        Self {
            allow_partial: true,
            sources: BTreeMap::new(),
        }
    }
}

impl RequirementResolver {
    /// Validate every source. Unknown strategy tags fail here, not mid-run.
    pub fn from_config(config: ResolverConfig) -> SimResult<Self> {
        let mut resolver = Self {
            allow_partial: config.allow_partial,
            sources: BTreeMap::new(),
        };
        for (requirement, specs) in config.requirements {
            resolver.add_sources(&requirement, specs)?;
        }
        Ok(resolver)
    }

    /// Append sources for `requirement`, keeping the list priority-sorted.
    pub fn add_sources(&mut self, requirement: &str, specs: Vec<SourceSpec>) -> SimResult<()> {
        let parsed = specs
            .into_iter()
            .map(RequirementSource::try_from)
            .collect::<SimResult<Vec<_>>>()?;
        let list = self.sources.entry(requirement.to_string()).or_default();
        list.extend(parsed);
        // Stable: equal ranks keep declaration order.
        list.sort_by_key(|s| s.priority);
        Ok(())
    }

    /// Whether partial deliveries count.
    pub fn allow_partial(&self) -> bool {
        self.allow_partial
    }

    /// Sources for `requirement`, in the order tried.
    pub fn sources_for(&self, requirement: &str) -> &[RequirementSource] {
        self.sources
            .get(requirement)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Requirements with at least one source.
    pub fn requirements(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Try each source in order until `quantity` units of `requirement`
    /// are delivered or the sources run out.
    pub fn resolve(
        &self,
        world: &mut WorldState,
        entity: EntityId,
        requirement: &str,
        quantity: f64,
    ) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::new(requirement, quantity);
        if !quantity.is_finite() || quantity <= 0.0 {
            return outcome;
        }

        for source in self.sources_for(requirement) {
            if outcome.unmet <= 0.0 {
                break;
            }
            let applicable = world.entity(entity).map(|e| source.condition.matches(e));
            let result = match applicable {
                None => AttemptResult::Skipped("entity not found".to_string()),
                Some(false) => AttemptResult::Skipped("condition not met".to_string()),
                Some(true) => self.attempt(world, entity, source, requirement, outcome.unmet),
            };

            tracing::debug!(
                entity = %entity,
                requirement,
                source = %source.id,
                ?result,
                "requirement source attempted"
            );
            if let AttemptResult::Fulfilled(amount) = result {
                outcome.fulfilled += amount;
                outcome.unmet = (quantity - outcome.fulfilled).max(0.0);
                outcome.sources_used.push(source.id.clone());
            }
            outcome.attempts.push(SourceAttempt {
                source_id: source.id.clone(),
                result,
            });
        }
        outcome
    }

    fn attempt(
        &self,
        world: &mut WorldState,
        entity: EntityId,
        source: &RequirementSource,
        requirement: &str,
        wanted: f64,
    ) -> AttemptResult {
        match source.strategy {
            FulfillmentStrategy::Inventory => self.take_owned(world, entity, requirement, wanted),
            FulfillmentStrategy::Household => {
                let Some(household) = world.get_component::<HouseholdComponent>(entity) else {
                    return AttemptResult::Failed("no household".to_string());
                };
                let household_id = household.household_id;
                self.take_owned(world, household_id, requirement, wanted)
            }
            FulfillmentStrategy::Market => self.purchase(world, entity, source, wanted),
            FulfillmentStrategy::Production => produce(world, entity, source, wanted),
            FulfillmentStrategy::World => {
                let pool = source.supply.as_deref().unwrap_or(requirement);
                self.draw_pool(world, pool, wanted)
            }
        }
    }

    /// Clip `wanted` to `available`, or refuse when partial takes are off.
    fn clip(&self, wanted: f64, available: f64) -> Result<f64, AttemptResult> {
        if available <= 0.0 {
            return Err(AttemptResult::Failed("none available".to_string()));
        }
        if available < wanted && !self.allow_partial {
            return Err(AttemptResult::Failed(format!(
                "only {available} of {wanted} available"
            )));
        }
        Ok(wanted.min(available))
    }

    fn take_owned(
        &self,
        world: &mut WorldState,
        owner: EntityId,
        requirement: &str,
        wanted: f64,
    ) -> AttemptResult {
        let Some(inventory) = world.get_component_mut::<InventoryComponent>(owner) else {
            return AttemptResult::Failed("no inventory".to_string());
        };
        match self.clip(wanted, inventory.amount(requirement)) {
            Ok(amount) => AttemptResult::Fulfilled(inventory.take_up_to(requirement, amount)),
            Err(failure) => failure,
        }
    }

    fn draw_pool(&self, world: &mut WorldState, pool: &str, wanted: f64) -> AttemptResult {
        let Some(available) = world.resource_amount(pool) else {
            return AttemptResult::Failed(format!("unknown resource \"{pool}\""));
        };
        match self.clip(wanted, available) {
            Ok(amount) => AttemptResult::Fulfilled(world.consume_resource(pool, amount)),
            Err(failure) => failure,
        }
    }

    fn purchase(
        &self,
        world: &mut WorldState,
        entity: EntityId,
        source: &RequirementSource,
        wanted: f64,
    ) -> AttemptResult {
        let quantity = match &source.supply {
            Some(pool) => match world.resource_amount(pool) {
                Some(available) => match self.clip(wanted, available) {
                    Ok(q) => q,
                    Err(failure) => return failure,
                },
                None => return AttemptResult::Failed(format!("unknown resource \"{pool}\"")),
            },
            None => wanted,
        };

        let total = scaled_costs(&source.costs, quantity);
        if !total.is_empty() {
            let Some(wealth) = world.get_component_mut::<WealthComponent>(entity) else {
                return AttemptResult::Failed("no wealth".to_string());
            };
            // Check every cost before debiting any of them.
            if let Some((id, cost)) = total.iter().find(|(id, cost)| !wealth.has(id, **cost)) {
                return AttemptResult::Failed(format!(
                    "cannot afford {cost} {id} (have {})",
                    wealth.amount(id)
                ));
            }
            for (id, cost) in &total {
                wealth.withdraw(id, *cost);
            }
        }

        if let Some(pool) = &source.supply {
            world.consume_resource(pool, quantity);
        }
        AttemptResult::Fulfilled(quantity)
    }
}

fn produce(
    world: &mut WorldState,
    entity: EntityId,
    source: &RequirementSource,
    wanted: f64,
) -> AttemptResult {
    let Some(employment) = world.get_component::<EmploymentComponent>(entity) else {
        return AttemptResult::Failed("not employed".to_string());
    };
    if !employment.is_employed() {
        return AttemptResult::Failed("not employed".to_string());
    }
    let rate = source
        .rate
        .or(employment.production_rate)
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(1.0);

    let inputs = scaled_costs(&source.costs, wanted / rate);
    if !inputs.is_empty() {
        let Some(inventory) = world.get_component_mut::<InventoryComponent>(entity) else {
            return AttemptResult::Failed("no inventory".to_string());
        };
        if !inventory.has_all(&inputs) {
            return AttemptResult::Failed("missing production inputs".to_string());
        }
        for (id, amount) in &inputs {
            inventory.withdraw(id, *amount);
        }
    }
    AttemptResult::Fulfilled(wanted)
}

/// Per-unit costs multiplied out, dropping zero entries.
fn scaled_costs(costs: &BTreeMap<String, f64>, units: f64) -> BTreeMap<String, f64> {
    costs
        .iter()
        .filter(|(_, per_unit)| **per_unit > 0.0)
        .map(|(id, per_unit)| (id.clone(), per_unit * units))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceCondition;
    use chrono::NaiveDate;
    use tw_core::{Component, Resource, ResourceSpec};

    fn world() -> WorldState {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut w = WorldState::new(start, 5);
        w.add_resource(Resource::new(ResourceSpec::new("food", 50.0)).unwrap())
            .unwrap();
        w
    }

    fn resolver(config: ResolverConfig) -> RequirementResolver {
        RequirementResolver::from_config(config).unwrap()
    }

    fn used(outcome: &ResolutionOutcome) -> Vec<&str> {
        outcome.sources_used.iter().map(String::as_str).collect()
    }

    #[test]
    fn non_positive_quantity_is_noop_success() {
        let mut w = world();
        let e = w.spawn_entity(Vec::new());
        let r = resolver(
            ResolverConfig::default()
                .with_source("food", SourceSpec::new("pool", FulfillmentStrategy::World)),
        );
        for q in [0.0, -3.0] {
            let outcome = r.resolve(&mut w, e, "food", q);
            assert!(outcome.is_complete());
            assert!(outcome.attempts.is_empty());
        }
        assert_eq!(w.resource_amount("food"), Some(50.0));
    }

    #[test]
    fn falls_back_to_next_priority() {
        let mut w = world();
        let e = w.spawn_entity([
            Component::from(InventoryComponent::default()),
            Component::from(WealthComponent::default().with("money", 100.0)),
        ]);
        let r = resolver(
            ResolverConfig::default()
                .with_source(
                    "food",
                    SourceSpec::new("shop", FulfillmentStrategy::Market)
                        .with_priority(2)
                        .with_cost("money", 5.0),
                )
                .with_source(
                    "food",
                    SourceSpec::new("pantry", FulfillmentStrategy::Inventory).with_priority(1),
                ),
        );

        let outcome = r.resolve(&mut w, e, "food", 1.0);
        assert!(outcome.is_complete());
        assert_eq!(used(&outcome), vec!["shop"]);
        assert_eq!(outcome.attempts[0].source_id, "pantry");
        assert!(matches!(outcome.attempts[0].result, AttemptResult::Failed(_)));
        let wealth = w.get_component::<WealthComponent>(e).unwrap();
        assert_eq!(wealth.amount("money"), 95.0);
    }

    #[test]
    fn equal_priorities_keep_declaration_order() {
        let r = resolver(
            ResolverConfig::default()
                .with_source("food", SourceSpec::new("a", FulfillmentStrategy::World))
                .with_source("food", SourceSpec::new("b", FulfillmentStrategy::World))
                .with_source(
                    "food",
                    SourceSpec::new("c", FulfillmentStrategy::World).with_priority(-1),
                ),
        );
        let ids: Vec<&str> = r.sources_for("food").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn market_cost_is_all_or_nothing() {
        let mut w = world();
        let e = w.spawn_entity([Component::from(
            WealthComponent::default()
                .with("money", 100.0)
                .with("crypto", 0.5),
        )]);
        let r = resolver(ResolverConfig::default().with_source(
            "food",
            SourceSpec::new("shop", FulfillmentStrategy::Market)
                .with_cost("money", 5.0)
                .with_cost("crypto", 1.0),
        ));

        let outcome = r.resolve(&mut w, e, "food", 1.0);
        assert_eq!(outcome.fulfilled, 0.0);
        assert_eq!(outcome.unmet, 1.0);
        let wealth = w.get_component::<WealthComponent>(e).unwrap();
        assert_eq!(wealth.amount("money"), 100.0);
        assert_eq!(wealth.amount("crypto"), 0.5);
    }

    #[test]
    fn market_draws_supply_pool() {
        let mut w = world();
        let e = w.spawn_entity([Component::from(WealthComponent::default().with("money", 10.0))]);
        let r = resolver(ResolverConfig::default().with_source(
            "food",
            SourceSpec::new("shop", FulfillmentStrategy::Market)
                .with_cost("money", 2.0)
                .with_supply("food"),
        ));
        let outcome = r.resolve(&mut w, e, "food", 4.0);
        assert!(outcome.is_complete());
        assert_eq!(w.resource_amount("food"), Some(46.0));
        assert_eq!(
            w.get_component::<WealthComponent>(e).unwrap().amount("money"),
            2.0
        );
    }

    #[test]
    fn partial_take_respects_policy() {
        let mut w = world();
        let e = w.spawn_entity([Component::from(InventoryComponent::default().with("food", 2.0))]);
        let pantry = SourceSpec::new("pantry", FulfillmentStrategy::Inventory);

        let strict = resolver(
            ResolverConfig::default()
                .with_allow_partial(false)
                .with_source("food", pantry.clone()),
        );
        let outcome = strict.resolve(&mut w, e, "food", 5.0);
        assert_eq!(outcome.fulfilled, 0.0);
        assert_eq!(
            w.get_component::<InventoryComponent>(e).unwrap().amount("food"),
            2.0
        );

        let lenient = resolver(ResolverConfig::default().with_source("food", pantry));
        let outcome = lenient.resolve(&mut w, e, "food", 5.0);
        assert!(outcome.is_partial());
        assert_eq!(outcome.fulfilled, 2.0);
        assert_eq!(outcome.unmet, 3.0);
    }

    #[test]
    fn remaining_quantity_spans_sources() {
        let mut w = world();
        let e = w.spawn_entity([Component::from(InventoryComponent::default().with("food", 2.0))]);
        let r = resolver(
            ResolverConfig::default()
                .with_source(
                    "food",
                    SourceSpec::new("pantry", FulfillmentStrategy::Inventory).with_priority(0),
                )
                .with_source(
                    "food",
                    SourceSpec::new("commons", FulfillmentStrategy::World).with_priority(1),
                ),
        );
        let outcome = r.resolve(&mut w, e, "food", 5.0);
        assert!(outcome.is_complete());
        assert_eq!(used(&outcome), vec!["pantry", "commons"]);
        assert_eq!(w.resource_amount("food"), Some(47.0));
    }

    #[test]
    fn household_inventory_is_shared() {
        let mut w = world();
        let home = w.spawn_entity([Component::from(InventoryComponent::default().with("food", 10.0))]);
        let member = w.spawn_entity([Component::from(HouseholdComponent { household_id: home })]);
        let r = resolver(ResolverConfig::default().with_source(
            "food",
            SourceSpec::new("home", FulfillmentStrategy::Household).with_condition(
                SourceCondition {
                    has_household: true,
                    ..SourceCondition::default()
                },
            ),
        ));
        let outcome = r.resolve(&mut w, member, "food", 3.0);
        assert!(outcome.is_complete());
        assert_eq!(
            w.get_component::<InventoryComponent>(home).unwrap().amount("food"),
            7.0
        );
    }

    #[test]
    fn inapplicable_source_is_skipped() {
        let mut w = world();
        let e = w.spawn_entity(Vec::new());
        let r = resolver(ResolverConfig::default().with_source(
            "food",
            SourceSpec::new("home", FulfillmentStrategy::Household).with_condition(
                SourceCondition {
                    has_household: true,
                    ..SourceCondition::default()
                },
            ),
        ));
        let outcome = r.resolve(&mut w, e, "food", 1.0);
        assert!(matches!(outcome.attempts[0].result, AttemptResult::Skipped(_)));
        assert_eq!(outcome.unmet, 1.0);
    }

    #[test]
    fn production_consumes_inputs_by_rate() {
        let mut w = world();
        let mut job = EmploymentComponent::new("farmer");
        job.production_rate = Some(4.0);
        let e = w.spawn_entity([
            Component::from(job),
            Component::from(InventoryComponent::default().with("seeds", 3.0)),
        ]);
        let r = resolver(ResolverConfig::default().with_source(
            "food",
            SourceSpec::new("farm", FulfillmentStrategy::Production)
                .with_condition(SourceCondition {
                    employment_type: Some("farmer".into()),
                    ..SourceCondition::default()
                })
                .with_cost("seeds", 1.0),
        ));

        let outcome = r.resolve(&mut w, e, "food", 8.0);
        assert!(outcome.is_complete());
        assert_eq!(
            w.get_component::<InventoryComponent>(e).unwrap().amount("seeds"),
            1.0
        );

        // 8 more units need 2 seeds; only 1 left, so nothing is consumed.
        let outcome = r.resolve(&mut w, e, "food", 8.0);
        assert_eq!(outcome.fulfilled, 0.0);
        assert_eq!(
            w.get_component::<InventoryComponent>(e).unwrap().amount("seeds"),
            1.0
        );
    }

    #[test]
    fn empty_cost_map_always_succeeds() {
        let mut w = world();
        let e = w.spawn_entity([Component::from(EmploymentComponent::new("forager"))]);
        let r = resolver(ResolverConfig::default().with_source(
            "food",
            SourceSpec::new("forage", FulfillmentStrategy::Production),
        ));
        assert!(r.resolve(&mut w, e, "food", 2.5).is_complete());
    }

    #[test]
    fn unknown_requirement_is_fully_unmet() {
        let mut w = world();
        let e = w.spawn_entity(Vec::new());
        let outcome = RequirementResolver::default().resolve(&mut w, e, "shelter", 1.0);
        assert_eq!(outcome.unmet, 1.0);
        assert!(outcome.attempts.is_empty());
    }

    #[test]
    fn config_parses_from_json() {
        let config: ResolverConfig = serde_json::from_str(
            r#"{ "requirements": { "food": [
                { "id": "pantry", "priority": 1, "strategy": "inventory",
                  "condition": { "has_component": "Inventory" } },
                { "id": "shop", "priority": 2, "strategy": "market",
                  "costs": { "money": 5.0 } }
            ] } }"#,
        )
        .unwrap();
        assert!(config.allow_partial);
        let r = resolver(config);
        assert_eq!(r.sources_for("food").len(), 2);
        assert_eq!(r.sources_for("food")[1].strategy, FulfillmentStrategy::Market);
    }
}
