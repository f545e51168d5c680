use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, MetadataValue};

/// A pure-data record attached to one entity.
///
/// Stored on the entity under its type name (`"Inventory"`, `"Needs"`, ...).
/// Custom components carry their own name and an open field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Component {
    /// See [`InventoryComponent`].
    Inventory(InventoryComponent),
    /// See [`WealthComponent`].
    Wealth(WealthComponent),
    /// See [`HouseholdComponent`].
    Household(HouseholdComponent),
    /// See [`EmploymentComponent`].
    Employment(EmploymentComponent),
    /// See [`NeedsComponent`].
    Needs(NeedsComponent),
    /// See [`PressureComponent`].
    Pressure(PressureComponent),
    /// See [`CustomComponent`].
    Custom(CustomComponent),
}

impl Component {
    /// The key this component is stored under on its entity.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Inventory(_) => InventoryComponent::TYPE_NAME,
            Self::Wealth(_) => WealthComponent::TYPE_NAME,
            Self::Household(_) => HouseholdComponent::TYPE_NAME,
            Self::Employment(_) => EmploymentComponent::TYPE_NAME,
            Self::Needs(_) => NeedsComponent::TYPE_NAME,
            Self::Pressure(_) => PressureComponent::TYPE_NAME,
            Self::Custom(c) => &c.name,
        }
    }
}

/// Statically typed access to one built-in component variant.
///
/// The accessors return `None` when the component is another variant, so a
/// mismatched lookup is inert rather than an error.
pub trait TypedComponent: Sized + 'static {
    /// Key the component is stored under.
    const TYPE_NAME: &'static str;

    /// Borrow the inner value if `component` is this variant.
    fn from_component(component: &Component) -> Option<&Self>;

    /// Mutable form of [`TypedComponent::from_component`].
    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;

    /// Wrap the value in its [`Component`] variant.
    fn into_component(self) -> Component;
}

macro_rules! typed_component {
    ($ty:ident, $variant:ident, $name:literal) => {
        impl TypedComponent for $ty {
            const TYPE_NAME: &'static str = $name;

            fn from_component(component: &Component) -> Option<&Self> {
                match component {
                    Component::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                match component {
                    Component::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_component(self) -> Component {
                Component::$variant(self)
            }
        }

        impl From<$ty> for Component {
            fn from(value: $ty) -> Self {
                Component::$variant(value)
            }
        }
    };
}

typed_component!(InventoryComponent, Inventory, "Inventory");
typed_component!(WealthComponent, Wealth, "Wealth");
typed_component!(HouseholdComponent, Household, "Household");
typed_component!(EmploymentComponent, Employment, "Employment");
typed_component!(NeedsComponent, Needs, "Needs");
typed_component!(PressureComponent, Pressure, "Pressure");

// ---------------------------------------------------------------------------
// Holdings (inventory and wealth)
// ---------------------------------------------------------------------------

/// Shared behavior of components that hold named resource amounts.
pub trait ResourceHoldings {
    /// The backing amounts, by resource id.
    fn holdings(&self) -> &BTreeMap<String, f64>;

    /// Mutable backing amounts.
    fn holdings_mut(&mut self) -> &mut BTreeMap<String, f64>;

    /// Amount held, zero when absent.
    fn amount(&self, resource_id: &str) -> f64 {
        self.holdings().get(resource_id).copied().unwrap_or(0.0)
    }

    /// True if at least `amount` is held.
    fn has(&self, resource_id: &str, amount: f64) -> bool {
        self.amount(resource_id) >= amount
    }

    /// True if every `(resource, amount)` pair is covered.
    fn has_all(&self, required: &BTreeMap<String, f64>) -> bool {
        required.iter().all(|(id, amount)| self.has(id, *amount))
    }

    /// Deposit `amount`; non-positive amounts are ignored.
    fn deposit(&mut self, resource_id: &str, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            *self
                .holdings_mut()
                .entry(resource_id.to_string())
                .or_insert(0.0) += amount;
        }
    }

    /// Withdraw up to `amount`. Returns what was taken.
    fn take_up_to(&mut self, resource_id: &str, amount: f64) -> f64 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let taken = amount.min(self.amount(resource_id));
        if taken > 0.0 {
            self.settle(resource_id, taken);
        }
        taken
    }

    /// Withdraw exactly `amount`, or nothing if there is not enough.
    fn withdraw(&mut self, resource_id: &str, amount: f64) -> bool {
        if !amount.is_finite() || amount < 0.0 || !self.has(resource_id, amount) {
            return false;
        }
        if amount > 0.0 {
            self.settle(resource_id, amount);
        }
        true
    }

    /// Subtract a checked amount, dropping emptied entries.
    #[doc(hidden)]
    fn settle(&mut self, resource_id: &str, amount: f64) {
        let map = self.holdings_mut();
        if let Some(held) = map.get_mut(resource_id) {
            *held -= amount;
            if *held <= 0.0 {
                map.remove(resource_id);
            }
        }
    }
}

/// Personal stock of resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryComponent {
    /// Amounts held, by resource id.
    #[serde(default)]
    pub resources: BTreeMap<String, f64>,
}

impl InventoryComponent {
    /// Builder form of [`ResourceHoldings::deposit`].
    pub fn with(mut self, resource_id: &str, amount: f64) -> Self {
        self.deposit(resource_id, amount);
        self
    }
}

impl ResourceHoldings for InventoryComponent {
    fn holdings(&self) -> &BTreeMap<String, f64> {
        &self.resources
    }

    fn holdings_mut(&mut self) -> &mut BTreeMap<String, f64> {
        &mut self.resources
    }
}

/// Purchasing power: money or any other resource used to pay market costs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WealthComponent {
    /// Amounts held, by resource id.
    #[serde(default)]
    pub resources: BTreeMap<String, f64>,
}

impl WealthComponent {
    /// Builder form of [`ResourceHoldings::deposit`].
    pub fn with(mut self, resource_id: &str, amount: f64) -> Self {
        self.deposit(resource_id, amount);
        self
    }
}

impl ResourceHoldings for WealthComponent {
    fn holdings(&self) -> &BTreeMap<String, f64> {
        &self.resources
    }

    fn holdings_mut(&mut self) -> &mut BTreeMap<String, f64> {
        &mut self.resources
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// Membership in a household entity whose inventory is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdComponent {
    /// The household entity.
    pub household_id: EntityId,
}

/// A job. `production_rate` is units produced per unit of each input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmploymentComponent {
    /// Job label matched by source conditions; `None` when unemployed.
    #[serde(default)]
    pub job_type: Option<String>,
    /// The employing entity, if any.
    #[serde(default)]
    pub employer_id: Option<EntityId>,
    /// Units produced per unit of each input.
    #[serde(default)]
    pub production_rate: Option<f64>,
    /// Payment per period, by resource.
    #[serde(default)]
    pub payment: BTreeMap<String, f64>,
}

impl EmploymentComponent {
    /// Employed in `job_type`.
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: Some(job_type.into()),
            ..Self::default()
        }
    }

    /// True if the entity holds a job.
    pub fn is_employed(&self) -> bool {
        self.job_type.is_some()
    }
}

// ---------------------------------------------------------------------------
// Needs & pressure
// ---------------------------------------------------------------------------

/// One need: a level in `[0, 1]` (0 = satisfied) that rises by `rate` per hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeedState {
    /// Current level in `[0, 1]`.
    pub level: f64,
    /// Hourly growth.
    pub rate: f64,
}

/// Needs keyed by name ("hunger", "thirst", ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeedsComponent {
    /// Need states, by name.
    #[serde(default)]
    pub needs: BTreeMap<String, NeedState>,
}

impl NeedsComponent {
    /// Add a need, clamping `level` into `[0, 1]`.
    pub fn with_need(mut self, name: &str, level: f64, rate: f64) -> Self {
        self.needs.insert(
            name.to_string(),
            NeedState {
                level: level.clamp(0.0, 1.0),
                rate,
            },
        );
        self
    }

    /// Level of one need, zero when absent.
    pub fn level(&self, name: &str) -> f64 {
        self.needs.get(name).map_or(0.0, |n| n.level)
    }

    /// Raise every need by its rate over `hours`, capped at 1.
    pub fn accumulate(&mut self, hours: f64) {
        for need in self.needs.values_mut() {
            need.level = (need.level + need.rate * hours).clamp(0.0, 1.0);
        }
    }

    /// Lower one need by `delta`, floored at 0.
    pub fn relieve(&mut self, name: &str, delta: f64) {
        if let Some(need) = self.needs.get_mut(name) {
            need.level = (need.level - delta.max(0.0)).max(0.0);
        }
    }
}

/// Unmet requirement amounts. 100 unmet units saturate the aggregate level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureComponent {
    /// Unmet amounts, by requirement.
    #[serde(default)]
    pub unmet: BTreeMap<String, f64>,
    /// Aggregate pressure in `[0, 1]`.
    #[serde(default)]
    pub level: f64,
}

impl PressureComponent {
    const SATURATION: f64 = 100.0;

    /// Unmet amount for one requirement.
    pub fn get(&self, requirement: &str) -> f64 {
        self.unmet.get(requirement).copied().unwrap_or(0.0)
    }

    /// Record more unmet demand.
    pub fn add(&mut self, requirement: &str, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            *self.unmet.entry(requirement.to_string()).or_insert(0.0) += amount;
            self.refresh_level();
        }
    }

    /// Lower the unmet amount, floored at zero.
    pub fn reduce(&mut self, requirement: &str, amount: f64) {
        if let Some(current) = self.unmet.get_mut(requirement) {
            *current = (*current - amount.max(0.0)).max(0.0);
            if *current == 0.0 {
                self.unmet.remove(requirement);
            }
            self.refresh_level();
        }
    }

    /// Forget all unmet demand.
    pub fn clear(&mut self) {
        self.unmet.clear();
        self.refresh_level();
    }

    fn refresh_level(&mut self) {
        let total: f64 = self.unmet.values().sum();
        self.level = (total / Self::SATURATION).min(1.0);
    }
}

// ---------------------------------------------------------------------------
// Custom
// ---------------------------------------------------------------------------

/// Any component type the kernel has no built-in shape for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomComponent {
    /// Type name the component is stored under.
    pub name: String,
    /// Free-form fields.
    #[serde(default)]
    pub fields: BTreeMap<String, MetadataValue>,
}

impl CustomComponent {
    /// A custom component with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder form of setting one field.
    pub fn with_field(mut self, key: &str, value: MetadataValue) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_up_to_partial() {
        let mut inv = InventoryComponent::default().with("food", 3.0);
        assert_eq!(inv.take_up_to("food", 5.0), 3.0);
        assert_eq!(inv.amount("food"), 0.0);
        assert!(!inv.resources.contains_key("food"));
        assert_eq!(inv.take_up_to("food", 1.0), 0.0);
    }

    #[test]
    fn withdraw_is_all_or_nothing() {
        let mut wealth = WealthComponent::default().with("money", 10.0);
        assert!(!wealth.withdraw("money", 12.0));
        assert_eq!(wealth.amount("money"), 10.0);
        assert!(wealth.withdraw("money", 4.0));
        assert_eq!(wealth.amount("money"), 6.0);
    }

    #[test]
    fn deposit_ignores_negative() {
        let mut inv = InventoryComponent::default();
        inv.deposit("wood", -2.0);
        assert!(inv.resources.is_empty());
    }

    #[test]
    fn has_all_checks_every_cost() {
        let wealth = WealthComponent::default().with("money", 10.0).with("gems", 1.0);
        let mut costs = BTreeMap::new();
        costs.insert("money".to_string(), 5.0);
        assert!(wealth.has_all(&costs));
        costs.insert("gems".to_string(), 2.0);
        assert!(!wealth.has_all(&costs));
    }

    #[test]
    fn typed_access_rejects_other_variants() {
        let c = InventoryComponent::default().into_component();
        assert!(InventoryComponent::from_component(&c).is_some());
        assert!(WealthComponent::from_component(&c).is_none());
        assert_eq!(c.type_name(), "Inventory");
    }

    #[test]
    fn needs_accumulate_and_relieve() {
        let mut needs = NeedsComponent::default().with_need("hunger", 0.4, 0.1);
        needs.accumulate(2.0);
        assert!((needs.level("hunger") - 0.6).abs() < 1e-12);
        needs.accumulate(100.0);
        assert_eq!(needs.level("hunger"), 1.0);
        needs.relieve("hunger", 5.0);
        assert_eq!(needs.level("hunger"), 0.0);
        assert_eq!(needs.level("missing"), 0.0);
    }

    #[test]
    fn pressure_accumulates_and_saturates() {
        let mut p = PressureComponent::default();
        p.add("food", 30.0);
        p.add("food", 20.0);
        assert_eq!(p.get("food"), 50.0);
        assert!((p.level - 0.5).abs() < 1e-12);
        p.add("water", 500.0);
        assert_eq!(p.level, 1.0);
        p.reduce("water", 1000.0);
        assert_eq!(p.get("water"), 0.0);
        assert!((p.level - 0.5).abs() < 1e-12);
    }

    #[test]
    fn component_serde_is_tagged() {
        let c = Component::Household(HouseholdComponent {
            household_id: EntityId(uuid::Uuid::from_u128(7)),
        });
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["kind"], "household");
        let back: Component = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn custom_component_uses_own_name() {
        let c = Component::Custom(
            CustomComponent::new("Age").with_field("years", MetadataValue::Integer(30)),
        );
        assert_eq!(c.type_name(), "Age");
        let json = serde_json::to_string(&c).unwrap();
        let back: Component = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
