//! Pure effect arithmetic: how a modifier changes a base value, and how
//! several modifiers on the same value combine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a structured effect's magnitude is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Magnitude is a fraction of the base (0.3 = 30%).
    Percentage,
    /// Magnitude is an absolute amount.
    Direct,
}

/// Sign of a structured effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Raise the value.
    Increase,
    /// Lower the value.
    Decrease,
}

/// Older effect encoding kept for configs and snapshots that predate
/// structured effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyEffect {
    /// Scale the value by this factor.
    Multiplier(f64),
    /// Add this amount to the value.
    Additive(f64),
}

/// What a modifier does to its target value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierEffect {
    /// The current encoding.
    Structured {
        /// Percentage or direct.
        kind: EffectKind,
        /// Fraction for percentages, units for direct effects.
        magnitude: f64,
        /// Whether the value goes up or down.
        direction: Direction,
    },
    /// Multiplier or additive effect from older files.
    Legacy(LegacyEffect),
}

impl ModifierEffect {
    /// Scale by `1 ± magnitude`.
    pub fn percentage(magnitude: f64, direction: Direction) -> Self {
        Self::Structured {
            kind: EffectKind::Percentage,
            magnitude,
            direction,
        }
    }

    /// Shift by `± magnitude`.
    pub fn direct(magnitude: f64, direction: Direction) -> Self {
        Self::Structured {
            kind: EffectKind::Direct,
            magnitude,
            direction,
        }
    }

    /// Apply this single effect to `base`, without clamping.
    pub fn apply(&self, base: f64) -> f64 {
        match *self {
            Self::Structured {
                kind,
                magnitude,
                direction,
            } => apply_effect(base, kind, magnitude, direction),
            Self::Legacy(LegacyEffect::Multiplier(m)) => base * m,
            Self::Legacy(LegacyEffect::Additive(a)) => base + a,
        }
    }

    /// True for effects that scale the value rather than shift it.
    pub fn is_scaling(&self) -> bool {
        matches!(
            self,
            Self::Structured {
                kind: EffectKind::Percentage,
                ..
            } | Self::Legacy(LegacyEffect::Multiplier(_))
        )
    }

    /// True for the older multiplier/additive encoding.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// The raw number carried by the effect.
    pub(crate) fn magnitude(&self) -> f64 {
        match *self {
            Self::Structured { magnitude, .. } => magnitude,
            Self::Legacy(LegacyEffect::Multiplier(v) | LegacyEffect::Additive(v)) => v,
        }
    }
}

impl fmt::Display for ModifierEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Structured {
                kind,
                magnitude,
                direction,
            } => {
                let sign = match direction {
                    Direction::Increase => '+',
                    Direction::Decrease => '-',
                };
                match kind {
                    EffectKind::Percentage => write!(f, "{sign}{:.1}%", magnitude * 100.0),
                    EffectKind::Direct => write!(f, "{sign}{magnitude}"),
                }
            }
            Self::Legacy(LegacyEffect::Multiplier(m)) => write!(f, "x{m}"),
            Self::Legacy(LegacyEffect::Additive(a)) => write!(f, "{a:+}"),
        }
    }
}

/// Apply one structured effect: `base * (1 ± magnitude)` or `base ± magnitude`.
pub fn apply_effect(base: f64, kind: EffectKind, magnitude: f64, direction: Direction) -> f64 {
    match (kind, direction) {
        (EffectKind::Percentage, Direction::Increase) => base * (1.0 + magnitude),
        (EffectKind::Percentage, Direction::Decrease) => base * (1.0 - magnitude),
        (EffectKind::Direct, Direction::Increase) => base + magnitude,
        (EffectKind::Direct, Direction::Decrease) => base - magnitude,
    }
}

/// The legal range of a modified value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueDomain {
    /// Amounts and rates: never below zero.
    #[default]
    NonNegative,
    /// Chances: within `[0, 1]`.
    Probability,
    /// No clamping.
    Unbounded,
}

impl ValueDomain {
    /// Bring `value` into this domain.
    pub fn clamp(self, value: f64) -> f64 {
        match self {
            Self::NonNegative => value.max(0.0),
            Self::Probability => value.clamp(0.0, 1.0),
            Self::Unbounded => value,
        }
    }
}

/// Combine every effect on one value.
///
/// Structured effects are applied before legacy ones. Within each group the
/// scaling effects are folded in first, then the shifts are added, so
/// `+10%` and `+5` on a base of 100 always give 115 whatever their order.
/// The result is clamped to `domain`.
pub fn stack_effects<'a, I>(base: f64, effects: I, domain: ValueDomain) -> f64
where
    I: IntoIterator<Item = &'a ModifierEffect>,
{
    let (legacy, structured): (Vec<&ModifierEffect>, Vec<&ModifierEffect>) =
        effects.into_iter().partition(|e| e.is_legacy());

    let value = fold_group(base, &structured);
    let value = fold_group(value, &legacy);
    domain.clamp(value)
}

fn fold_group(base: f64, group: &[&ModifierEffect]) -> f64 {
    let scaled = group
        .iter()
        .filter(|e| e.is_scaling())
        .fold(base, |acc, e| e.apply(acc));
    group
        .iter()
        .filter(|e| !e.is_scaling())
        .fold(scaled, |acc, e| e.apply(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn percentage_effects() {
        assert!(close(
            apply_effect(100.0, EffectKind::Percentage, 0.3, Direction::Decrease),
            70.0
        ));
        assert!(close(
            apply_effect(100.0, EffectKind::Percentage, 0.3, Direction::Increase),
            130.0
        ));
    }

    #[test]
    fn direct_effects() {
        assert!(close(
            apply_effect(1000.0, EffectKind::Direct, 500.0, Direction::Decrease),
            500.0
        ));
        assert!(close(
            apply_effect(1000.0, EffectKind::Direct, 500.0, Direction::Increase),
            1500.0
        ));
    }

    #[test]
    fn scaling_before_shifting_regardless_of_order() {
        let pct = ModifierEffect::percentage(0.1, Direction::Increase);
        let add = ModifierEffect::direct(5.0, Direction::Increase);
        let a = stack_effects(100.0, [&pct, &add], ValueDomain::Unbounded);
        let b = stack_effects(100.0, [&add, &pct], ValueDomain::Unbounded);
        assert!(close(a, 115.0));
        assert!(close(a, b));
    }

    #[test]
    fn structured_before_legacy() {
        let legacy = ModifierEffect::Legacy(LegacyEffect::Multiplier(2.0));
        let direct = ModifierEffect::direct(10.0, Direction::Increase);
        // (100 + 10) * 2, not 100 * 2 + 10.
        let v = stack_effects(100.0, [&legacy, &direct], ValueDomain::Unbounded);
        assert!(close(v, 220.0));
    }

    #[test]
    fn domain_clamping() {
        let big_cut = ModifierEffect::direct(500.0, Direction::Decrease);
        assert_eq!(stack_effects(100.0, [&big_cut], ValueDomain::NonNegative), 0.0);
        assert_eq!(stack_effects(100.0, [&big_cut], ValueDomain::Unbounded), -400.0);
        let boost = ModifierEffect::percentage(0.5, Direction::Increase);
        assert_eq!(stack_effects(0.9, [&boost], ValueDomain::Probability), 1.0);
    }

    #[test]
    fn no_effects_returns_base() {
        let none: [&ModifierEffect; 0] = [];
        assert_eq!(stack_effects(42.0, none, ValueDomain::NonNegative), 42.0);
    }

    #[test]
    fn effect_serde_shapes() {
        let e = ModifierEffect::percentage(0.25, Direction::Decrease);
        let json = serde_json::to_value(e).unwrap();
        assert_eq!(json["structured"]["kind"], "percentage");
        assert_eq!(json["structured"]["direction"], "decrease");

        let legacy: ModifierEffect = serde_json::from_str(r#"{"legacy":{"additive":3.5}}"#).unwrap();
        assert_eq!(legacy, ModifierEffect::Legacy(LegacyEffect::Additive(3.5)));
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(
            ModifierEffect::percentage(0.3, Direction::Decrease).to_string(),
            "-30.0%"
        );
        assert_eq!(
            ModifierEffect::Legacy(LegacyEffect::Multiplier(1.5)).to_string(),
            "x1.5"
        );
    }

    proptest! {
        #[test]
        fn non_negative_domain_never_goes_below_zero(
            base in 0.0f64..10_000.0,
            cuts in proptest::collection::vec(0.0f64..5_000.0, 0..8),
        ) {
            let effects: Vec<ModifierEffect> = cuts
                .iter()
                .map(|c| ModifierEffect::direct(*c, Direction::Decrease))
                .collect();
            let v = stack_effects(base, &effects, ValueDomain::NonNegative);
            prop_assert!(v >= 0.0);
        }

        #[test]
        fn probability_domain_stays_in_unit_interval(
            base in 0.0f64..1.0,
            pct in -2.0f64..2.0,
        ) {
            let e = ModifierEffect::percentage(pct, Direction::Increase);
            let v = stack_effects(base, [&e], ValueDomain::Probability);
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }
}
