use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::effect::ModifierEffect;
use crate::error::{CoreError, CoreResult};
use crate::frequency::Frequency;

/// Unique identifier for a modifier record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModifierId(pub Uuid);

impl fmt::Display for ModifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// The value a modifier adjusts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ModifierTarget {
    /// A global resource, by identifier.
    Resource(String),
    /// A parameter of a behavior module, by module identifier.
    Module(String),
}

impl fmt::Display for ModifierTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(id) => write!(f, "resource:{id}"),
            Self::Module(id) => write!(f, "module:{id}"),
        }
    }
}

/// Chance for an expired modifier to come back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalPolicy {
    /// Chance in `[0, 1]` per check.
    pub probability: f64,
    /// Checks happen on the last hour of each period of this frequency.
    #[serde(default)]
    pub frequency: Frequency,
    /// Only every Nth period boundary after expiry is a check.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Length of the renewed window in years; defaults to the parent's.
    #[serde(default)]
    pub override_duration: Option<i32>,
}

fn default_interval() -> u32 {
    1
}

impl RenewalPolicy {
    /// A policy rolled once per `frequency` period with the given chance.
    pub fn new(probability: f64, frequency: Frequency) -> Self {
        Self {
            probability,
            frequency,
            interval: 1,
            override_duration: None,
        }
    }

    /// Roll only every `interval` periods.
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    /// Give renewed windows a fixed length in years.
    pub fn with_duration(mut self, years: i32) -> Self {
        self.override_duration = Some(years);
        self
    }
}

/// A modifier as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierSpec {
    /// Display name, shared by every renewal of the same modifier.
    pub name: String,
    /// What the modifier adjusts.
    pub target: ModifierTarget,
    /// How the target value changes.
    pub effect: ModifierEffect,
    /// First active year.
    pub start_period: i32,
    /// First year no longer active.
    pub end_period: i32,
    /// Chance of spawning a successor once the window ends.
    #[serde(default)]
    pub renewal: Option<RenewalPolicy>,
}

impl ModifierSpec {
    /// A declaration without a renewal policy.
    pub fn new(
        name: impl Into<String>,
        target: ModifierTarget,
        effect: ModifierEffect,
        start_period: i32,
        end_period: i32,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            effect,
            start_period,
            end_period,
            renewal: None,
        }
    }

    /// Attach a renewal policy.
    pub fn with_renewal(mut self, renewal: RenewalPolicy) -> Self {
        self.renewal = Some(renewal);
        self
    }
}

/// A timed adjustment to a resource or module parameter.
///
/// Modifiers are active for whole calendar years in `[start_period,
/// end_period)`. Expired modifiers are deactivated but kept, so the renewal
/// chain (parent to successor) survives in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    /// Unique, RNG-drawn identifier.
    pub id: ModifierId,
    /// Groups related records, e.g. every year of a recurring drought.
    pub name: String,
    /// What the modifier adjusts.
    pub target: ModifierTarget,
    /// How the target value changes.
    pub effect: ModifierEffect,
    start_period: i32,
    end_period: i32,
    active: bool,
    /// Renewal policy, copied to every successor.
    pub renewal: Option<RenewalPolicy>,
    /// The record this one was renewed from.
    pub parent: Option<ModifierId>,
    successor: Option<ModifierId>,
    /// Renewal period index last rolled for, so a boundary is rolled once.
    last_renewal_check: Option<i64>,
}

impl Modifier {
    /// Validate a declaration and build an active modifier from it.
    pub fn new(id: ModifierId, spec: ModifierSpec) -> CoreResult<Self> {
        if spec.start_period >= spec.end_period {
            return Err(CoreError::InvalidWindow {
                name: spec.name,
                start: spec.start_period,
                end: spec.end_period,
            });
        }
        if !spec.effect.magnitude().is_finite() {
            return Err(CoreError::InvalidModifier {
                name: spec.name,
                reason: "effect magnitude must be a finite number".to_string(),
            });
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&spec.start_period)
            || !(MIN_YEAR..=MAX_YEAR).contains(&spec.end_period)
        {
            return Err(CoreError::InvalidModifier {
                name: spec.name,
                reason: format!("periods must lie within years {MIN_YEAR}..={MAX_YEAR}"),
            });
        }
        if let Some(reason) = spec.renewal.as_ref().and_then(|p| validate_policy(p).err()) {
            return Err(CoreError::InvalidModifier {
                name: spec.name,
                reason,
            });
        }
        Ok(Self {
            id,
            name: spec.name,
            target: spec.target,
            effect: spec.effect,
            start_period: spec.start_period,
            end_period: spec.end_period,
            active: true,
            renewal: spec.renewal,
            parent: None,
            successor: None,
            last_renewal_check: None,
        })
    }

    /// First active year.
    pub fn start_period(&self) -> i32 {
        self.start_period
    }

    /// First year no longer active.
    pub fn end_period(&self) -> i32 {
        self.end_period
    }

    /// Window length in years.
    pub fn duration(&self) -> i32 {
        self.end_period - self.start_period
    }

    /// The raw active flag, ignoring the window.
    pub fn is_flagged_active(&self) -> bool {
        self.active
    }

    /// The record renewed from this one, if any.
    pub fn successor(&self) -> Option<ModifierId> {
        self.successor
    }

    /// Flag set and `start_period <= year(now) < end_period`.
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        let year = now.year();
        self.active && self.start_period <= year && year < self.end_period
    }

    /// True once the current year has reached `end_period`.
    pub fn has_expired(&self, now: NaiveDateTime) -> bool {
        now.year() >= self.end_period
    }

    /// Clear the active flag. The record is kept.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// True if the target is the resource `resource_id`.
    pub fn targets_resource(&self, resource_id: &str) -> bool {
        matches!(&self.target, ModifierTarget::Resource(id) if id == resource_id)
    }

    /// True if the target is the module `module_id`.
    pub fn targets_module(&self, module_id: &str) -> bool {
        matches!(&self.target, ModifierTarget::Module(id) if id == module_id)
    }

    /// True on the last hour of a renewal period, every `interval` periods
    /// counted from the period in which the window ended.
    pub fn should_check_renewal(&self, now: NaiveDateTime) -> bool {
        let Some(policy) = &self.renewal else {
            return false;
        };
        if !policy.frequency.is_period_end(now) {
            return false;
        }
        let Some(expired_at) = year_start(self.end_period) else {
            return false;
        };
        let elapsed =
            policy.frequency.period_index(now) - policy.frequency.period_index(expired_at);
        elapsed >= 0 && elapsed % i64::from(policy.interval.max(1)) == 0
    }

    /// Whether the renewal sweep should roll for this modifier at `now`.
    pub fn renewal_due(&self, now: NaiveDateTime) -> bool {
        let Some(policy) = &self.renewal else {
            return false;
        };
        policy.probability > 0.0
            && self.successor.is_none()
            && self.has_expired(now)
            && self.should_check_renewal(now)
            && self.last_renewal_check != Some(policy.frequency.period_index(now))
    }

    /// Remember that this boundary has been rolled.
    pub fn mark_renewal_checked(&mut self, now: NaiveDateTime) {
        if let Some(policy) = &self.renewal {
            self.last_renewal_check = Some(policy.frequency.period_index(now));
        }
    }

    /// Build the renewed copy and link it to this record.
    ///
    /// The new window starts at the year of the next tick, but never before
    /// this record's end, and lasts `override_duration` or this record's
    /// duration. Fails without linking when the window would leave the
    /// calendar.
    pub fn renew(&mut self, id: ModifierId, now: NaiveDateTime) -> CoreResult<Modifier> {
        let next_year = (now + TimeDelta::hours(1)).year();
        let start = self.end_period.max(next_year);
        let duration = self
            .renewal
            .as_ref()
            .and_then(|p| p.override_duration)
            .unwrap_or_else(|| self.duration())
            .max(1);
        let end = start
            .checked_add(duration)
            .filter(|end| *end <= MAX_YEAR)
            .ok_or_else(|| CoreError::InvalidModifier {
                name: self.name.clone(),
                reason: format!("renewed window {start}+{duration} years passes year {MAX_YEAR}"),
            })?;

        self.successor = Some(id);
        Ok(Modifier {
            id,
            name: self.name.clone(),
            target: self.target.clone(),
            effect: self.effect,
            start_period: start,
            end_period: end,
            active: true,
            renewal: self.renewal.clone(),
            parent: Some(self.id),
            successor: None,
            last_renewal_check: None,
        })
    }
}

/// Earliest period a modifier window may use.
pub const MIN_YEAR: i32 = -9999;
/// Latest period a modifier window may use.
pub const MAX_YEAR: i32 = 9999;
/// Longest window a renewal may override to.
pub const MAX_RENEWAL_YEARS: i32 = 1000;

fn validate_policy(policy: &RenewalPolicy) -> Result<(), String> {
    if !(0.0..=1.0).contains(&policy.probability) {
        return Err(format!(
            "renewal probability {} is outside [0, 1]",
            policy.probability
        ));
    }
    if policy.interval == 0 {
        return Err("renewal interval must be at least 1".to_string());
    }
    if policy
        .override_duration
        .is_some_and(|d| !(1..=MAX_RENEWAL_YEARS).contains(&d))
    {
        return Err(format!(
            "renewal duration must be between 1 and {MAX_RENEWAL_YEARS} years"
        ));
    }
    Ok(())
}

fn year_start(year: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Direction;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn id(n: u128) -> ModifierId {
        ModifierId(Uuid::from_u128(n))
    }

    fn drought() -> ModifierSpec {
        ModifierSpec::new(
            "drought",
            ModifierTarget::Resource("water".into()),
            ModifierEffect::percentage(0.3, Direction::Decrease),
            2024,
            2025,
        )
    }

    #[test]
    fn rejects_empty_window() {
        let mut spec = drought();
        spec.end_period = 2024;
        let err = Modifier::new(id(1), spec).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWindow { start: 2024, end: 2024, .. }));
    }

    #[test]
    fn rejects_bad_probability() {
        let spec = drought().with_renewal(RenewalPolicy::new(1.5, Frequency::Yearly));
        assert!(Modifier::new(id(1), spec).is_err());
    }

    #[test]
    fn active_within_window_end_exclusive() {
        let m = Modifier::new(id(1), drought()).unwrap();
        assert!(!m.is_active(at(2023, 12, 31, 23)));
        assert!(m.is_active(at(2024, 1, 1, 0)));
        assert!(m.is_active(at(2024, 12, 31, 23)));
        assert!(!m.is_active(at(2025, 1, 1, 0)));
        assert!(m.has_expired(at(2025, 1, 1, 0)));
        assert!(!m.has_expired(at(2024, 12, 31, 23)));
    }

    #[test]
    fn deactivated_modifier_is_inactive() {
        let mut m = Modifier::new(id(1), drought()).unwrap();
        m.deactivate();
        assert!(!m.is_active(at(2024, 6, 1, 0)));
    }

    #[test]
    fn target_matching() {
        let m = Modifier::new(id(1), drought()).unwrap();
        assert!(m.targets_resource("water"));
        assert!(!m.targets_resource("food"));
        assert!(!m.targets_module("water"));
    }

    #[test]
    fn yearly_check_on_dec_31_last_hour() {
        let spec = drought().with_renewal(RenewalPolicy::new(0.5, Frequency::Yearly));
        let m = Modifier::new(id(1), spec).unwrap();
        assert!(m.should_check_renewal(at(2025, 12, 31, 23)));
        assert!(!m.should_check_renewal(at(2025, 12, 31, 22)));
        assert!(!m.should_check_renewal(at(2025, 6, 30, 23)));
        // Before expiry, no check.
        assert!(!m.should_check_renewal(at(2023, 12, 31, 23)));
    }

    #[test]
    fn interval_skips_boundaries() {
        let spec = drought()
            .with_renewal(RenewalPolicy::new(0.5, Frequency::Monthly).with_interval(3));
        let m = Modifier::new(id(1), spec).unwrap();
        assert!(m.should_check_renewal(at(2025, 1, 31, 23)));
        assert!(!m.should_check_renewal(at(2025, 2, 28, 23)));
        assert!(!m.should_check_renewal(at(2025, 3, 31, 23)));
        assert!(m.should_check_renewal(at(2025, 4, 30, 23)));
    }

    #[test]
    fn renewal_due_once_per_boundary() {
        let spec = drought().with_renewal(RenewalPolicy::new(0.5, Frequency::Yearly));
        let mut m = Modifier::new(id(1), spec).unwrap();
        let boundary = at(2025, 12, 31, 23);
        assert!(m.renewal_due(boundary));
        m.mark_renewal_checked(boundary);
        assert!(!m.renewal_due(boundary));
        assert!(m.renewal_due(at(2026, 12, 31, 23)));
    }

    #[test]
    fn zero_probability_never_due() {
        let spec = drought().with_renewal(RenewalPolicy::new(0.0, Frequency::Hourly));
        let m = Modifier::new(id(1), spec).unwrap();
        assert!(!m.renewal_due(at(2025, 3, 3, 3)));
    }

    #[test]
    fn renew_links_parent_and_successor() {
        let spec = drought().with_renewal(RenewalPolicy::new(1.0, Frequency::Yearly));
        let mut parent = Modifier::new(id(1), spec).unwrap();
        let child = parent.renew(id(2), at(2025, 12, 31, 23)).unwrap();

        assert_eq!(parent.successor(), Some(id(2)));
        assert_eq!(child.parent, Some(id(1)));
        assert_eq!(child.start_period(), 2026);
        assert_eq!(child.end_period(), 2027);
        assert_eq!(child.effect, parent.effect);
        assert!(!parent.renewal_due(at(2026, 12, 31, 23)));
    }

    #[test]
    fn renew_mid_year_starts_at_parent_end() {
        let spec = drought()
            .with_renewal(RenewalPolicy::new(1.0, Frequency::Daily).with_duration(3));
        let mut parent = Modifier::new(id(1), spec).unwrap();
        let child = parent.renew(id(2), at(2025, 1, 1, 23)).unwrap();
        assert_eq!(child.start_period(), 2025);
        assert_eq!(child.end_period(), 2028);
    }

    #[test]
    fn oversized_renewal_duration_rejected() {
        let spec = drought()
            .with_renewal(RenewalPolicy::new(1.0, Frequency::Hourly).with_duration(i32::MAX));
        let err = Modifier::new(id(1), spec).unwrap_err();
        assert!(matches!(err, CoreError::InvalidModifier { .. }));
    }

    #[test]
    fn window_outside_calendar_rejected() {
        let mut spec = drought();
        spec.start_period = i32::MIN;
        assert!(Modifier::new(id(1), spec).is_err());
    }

    #[test]
    fn renew_past_last_year_errors_and_keeps_parent_unlinked() {
        let policy = RenewalPolicy::new(1.0, Frequency::Yearly).with_duration(MAX_RENEWAL_YEARS);
        let mut spec = drought().with_renewal(policy);
        spec.start_period = MAX_YEAR - 1;
        spec.end_period = MAX_YEAR;
        let mut parent = Modifier::new(id(1), spec).unwrap();
        assert!(parent.renew(id(2), at(9999, 12, 31, 23)).is_err());
        assert!(parent.successor().is_none());
    }

    #[test]
    fn serde_round_trip_keeps_renewal_state() {
        let spec = drought().with_renewal(RenewalPolicy::new(0.5, Frequency::Weekly));
        let mut m = Modifier::new(id(9), spec).unwrap();
        m.mark_renewal_checked(at(2025, 1, 5, 23));
        m.deactivate();
        let json = serde_json::to_string(&m).unwrap();
        let back: Modifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn target_serde_shape() {
        let json = serde_json::to_value(ModifierTarget::Module("needs".into())).unwrap();
        assert_eq!(json["type"], "module");
        assert_eq!(json["id"], "needs");
    }
}
