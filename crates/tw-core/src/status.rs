use std::fmt;

use serde::{Deserialize, Serialize};

/// Health classification of a resource, derived from its amount and capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Nothing left, or under 5% of capacity.
    Depleted,
    /// Under 20% of capacity, or under 100 units when unbounded.
    AtRisk,
    /// Under 50% of capacity, or under 500 units when unbounded.
    Moderate,
    /// Under 80% of capacity, or under 2000 units when unbounded.
    Sufficient,
    /// Everything above.
    Abundant,
}

impl ResourceStatus {
    /// Classify an amount against an optional capacity.
    pub fn classify(amount: f64, max_capacity: Option<f64>) -> Self {
        if amount <= 0.0 {
            return Self::Depleted;
        }
        match max_capacity {
            Some(cap) if cap > 0.0 => {
                let utilization = amount / cap;
                if utilization < 0.05 {
                    Self::Depleted
                } else if utilization < 0.20 {
                    Self::AtRisk
                } else if utilization < 0.50 {
                    Self::Moderate
                } else if utilization < 0.80 {
                    Self::Sufficient
                } else {
                    Self::Abundant
                }
            }
            _ => {
                if amount < 100.0 {
                    Self::AtRisk
                } else if amount < 500.0 {
                    Self::Moderate
                } else if amount < 2000.0 {
                    Self::Sufficient
                } else {
                    Self::Abundant
                }
            }
        }
    }

    /// Lowercase label, as stored in snapshots.
    pub fn label(self) -> &'static str {
        match self {
            Self::Depleted => "depleted",
            Self::AtRisk => "at_risk",
            Self::Moderate => "moderate",
            Self::Sufficient => "sufficient",
            Self::Abundant => "abundant",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
