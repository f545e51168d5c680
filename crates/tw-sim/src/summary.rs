use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use tw_core::{ResourceStatus, WorldState};

use crate::config::SummaryConfig;

/// One resource line in a [`WorldSummary`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLine {
    /// Resource id.
    pub id: String,
    /// Current amount.
    pub amount: f64,
    /// Current status label.
    pub status: ResourceStatus,
    /// Change since the previous summary, `None` on the first one.
    pub change: Option<f64>,
}

/// Point-in-time overview of the world, logged on a period boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSummary {
    /// Simulated time of the capture.
    pub now: NaiveDateTime,
    /// World tick of the capture.
    pub tick: u64,
    /// Registered module ids.
    pub modules: Vec<String>,
    /// One line per resource.
    pub resources: Vec<ResourceLine>,
    /// Modifiers active at capture time.
    pub active_modifiers: usize,
    /// Live entity count.
    pub entities: usize,
}

impl WorldSummary {
    /// Snapshot `world`, diffing amounts against `previous`.
    pub fn capture(world: &WorldState, previous: &BTreeMap<String, f64>) -> Self {
        let resources = world
            .resources()
            .map(|r| ResourceLine {
                id: r.id.clone(),
                amount: r.amount(),
                status: r.status(),
                change: previous.get(&r.id).map(|before| r.amount() - before),
            })
            .collect();
        Self {
            now: world.now(),
            tick: world.tick(),
            modules: world.module_ids().to_vec(),
            resources,
            active_modifiers: world.active_modifier_count(),
            entities: world.entity_count(),
        }
    }
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (tick {}) modules=[{}] modifiers={} entities={}",
            self.now.format("%Y-%m-%d %H:%M"),
            self.tick,
            self.modules.join(", "),
            self.active_modifiers,
            self.entities
        )?;
        for line in &self.resources {
            write!(f, " | {}={:.2} {}", line.id, line.amount, line.status)?;
            if let Some(change) = line.change {
                write!(f, " ({change:+.2})")?;
            }
        }
        Ok(())
    }
}

/// Decides when the driver logs a summary and remembers the last one.
#[derive(Debug, Clone)]
pub struct SummaryTracker {
    config: SummaryConfig,
    last_period: Option<i64>,
    last_amounts: BTreeMap<String, f64>,
}

impl SummaryTracker {
    /// A tracker that has logged nothing yet.
    pub fn new(config: SummaryConfig) -> Self {
        Self {
            config,
            last_period: None,
            last_amounts: BTreeMap::new(),
        }
    }

    /// Record the current amounts as the baseline for the next change column.
    pub fn reset(&mut self, world: &WorldState) {
        self.last_period = None;
        self.last_amounts = amounts(world);
    }

    /// A summary if `world` sits on a reporting boundary.
    pub fn observe(&mut self, world: &WorldState) -> Option<WorldSummary> {
        if !self.config.enabled {
            return None;
        }
        let now = world.now();
        if !self.config.frequency.is_period_start(now) {
            return None;
        }
        let period = self.config.frequency.period_index(now);
        let interval = i64::from(self.config.interval.max(1));
        if self.last_period.is_some_and(|last| period - last < interval) {
            return None;
        }
        let summary = WorldSummary::capture(world, &self.last_amounts);
        self.last_period = Some(period);
        self.last_amounts = amounts(world);
        Some(summary)
    }
}

fn amounts(world: &WorldState) -> BTreeMap<String, f64> {
    world
        .resources()
        .map(|r| (r.id.clone(), r.amount()))
        .collect()
}
