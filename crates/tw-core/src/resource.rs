use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::frequency::Frequency;
use crate::status::ResourceStatus;

/// Declaration of a global resource, as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Unique identifier.
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    /// Starting amount.
    pub initial_amount: f64,
    /// Upper bound, unbounded when absent.
    #[serde(default)]
    pub max_capacity: Option<f64>,
    /// Amount added per replenishment period.
    #[serde(default)]
    pub replenishment_rate: Option<f64>,
    /// Period of replenishment.
    #[serde(default = "default_replenishment_frequency")]
    pub replenishment_frequency: Frequency,
    /// Finite resources never replenish.
    #[serde(default)]
    pub finite: bool,
}

fn default_replenishment_frequency() -> Frequency {
    Frequency::Hourly
}

impl ResourceSpec {
    /// A minimal declaration: unbounded, non-replenishing, not finite.
    pub fn new(id: impl Into<String>, initial_amount: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            initial_amount,
            max_capacity: None,
            replenishment_rate: None,
            replenishment_frequency: default_replenishment_frequency(),
            finite: false,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Bound the amount.
    pub fn with_capacity(mut self, max_capacity: f64) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    /// Refill `rate` units at the start of every `frequency` period.
    pub fn with_replenishment(mut self, rate: f64, frequency: Frequency) -> Self {
        self.replenishment_rate = Some(rate);
        self.replenishment_frequency = frequency;
        self
    }

    /// Mark as finite.
    pub fn finite(mut self) -> Self {
        self.finite = true;
        self
    }
}

/// A named scalar quantity shared by the whole world.
///
/// The amount never leaves `[0, max_capacity]`. Mutations clamp instead of
/// failing and return the delta actually applied; the status label is
/// recomputed after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    amount: f64,
    max_capacity: Option<f64>,
    replenishment_rate: Option<f64>,
    replenishment_frequency: Frequency,
    finite: bool,
    status: ResourceStatus,
}

impl Resource {
    /// Validate a declaration and build the resource from it.
    pub fn new(spec: ResourceSpec) -> CoreResult<Self> {
        let invalid = |reason: String| CoreError::InvalidResource {
            id: spec.id.clone(),
            reason,
        };

        if !spec.initial_amount.is_finite() || spec.initial_amount < 0.0 {
            return Err(invalid(format!(
                "initial amount {} must be a non-negative number",
                spec.initial_amount
            )));
        }
        if let Some(cap) = spec.max_capacity {
            if !cap.is_finite() || cap < 0.0 {
                return Err(invalid(format!(
                    "max capacity {cap} must be a non-negative number"
                )));
            }
            if spec.initial_amount > cap {
                return Err(invalid(format!(
                    "initial amount {} exceeds max capacity {cap}",
                    spec.initial_amount
                )));
            }
        }
        if let Some(rate) = spec.replenishment_rate {
            if spec.finite {
                return Err(invalid(
                    "finite resources cannot have a replenishment rate".to_string(),
                ));
            }
            if !rate.is_finite() || rate < 0.0 {
                return Err(invalid(format!(
                    "replenishment rate {rate} must be a non-negative number"
                )));
            }
        }

        let name = spec.name.clone().unwrap_or_else(|| spec.id.clone());
        Ok(Self {
            status: ResourceStatus::classify(spec.initial_amount, spec.max_capacity),
            id: spec.id,
            name,
            amount: spec.initial_amount,
            max_capacity: spec.max_capacity,
            replenishment_rate: spec.replenishment_rate,
            replenishment_frequency: spec.replenishment_frequency,
            finite: spec.finite,
        })
    }

    /// Current amount.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Upper bound, if any.
    pub fn max_capacity(&self) -> Option<f64> {
        self.max_capacity
    }

    /// Status label for the current amount.
    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    /// True for resources that never replenish.
    pub fn is_finite(&self) -> bool {
        self.finite
    }

    /// Base replenishment per period, before modifiers.
    pub fn replenishment_rate(&self) -> Option<f64> {
        self.replenishment_rate
    }

    /// Period of replenishment.
    pub fn replenishment_frequency(&self) -> Frequency {
        self.replenishment_frequency
    }

    /// Fraction of capacity in use, if bounded.
    pub fn utilization(&self) -> Option<f64> {
        self.max_capacity
            .filter(|cap| *cap > 0.0)
            .map(|cap| self.amount / cap)
    }

    /// True at zero.
    pub fn is_depleted(&self) -> bool {
        self.amount <= 0.0
    }

    /// True when bounded and full.
    pub fn is_at_capacity(&self) -> bool {
        self.max_capacity.is_some_and(|cap| self.amount >= cap)
    }

    /// Add up to `amount`, stopping at capacity. Returns the amount added.
    pub fn add(&mut self, amount: f64) -> f64 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let applied = match self.max_capacity {
            Some(cap) => amount.min((cap - self.amount).max(0.0)),
            None => amount,
        };
        self.amount += applied;
        self.refresh_status();
        applied
    }

    /// Remove up to `amount`, stopping at zero. Returns the amount removed.
    pub fn consume(&mut self, amount: f64) -> f64 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let applied = amount.min(self.amount);
        self.amount -= applied;
        self.refresh_status();
        applied
    }

    /// Overwrite the amount, clamped into `[0, max_capacity]`.
    pub fn set_amount(&mut self, amount: f64) {
        let floor = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        self.amount = match self.max_capacity {
            Some(cap) => floor.min(cap),
            None => floor,
        };
        self.refresh_status();
    }

    /// True at the start of each replenishment period for renewable resources.
    pub fn should_replenish(&self, now: NaiveDateTime) -> bool {
        !self.finite
            && self.replenishment_rate.is_some()
            && self.replenishment_frequency.is_period_start(now)
    }

    fn refresh_status(&mut self) {
        self.status = ResourceStatus::classify(self.amount, self.max_capacity);
    }
}
