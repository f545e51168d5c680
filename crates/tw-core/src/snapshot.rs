use serde::{Deserialize, Serialize};

use crate::clock::SimClock;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::modifier::Modifier;
use crate::resource::Resource;

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A complete, serializable copy of a [`WorldState`](crate::WorldState).
///
/// Includes inactive modifiers and the full RNG position, so restoring a
/// snapshot and continuing is indistinguishable from never having stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Format version, checked on load.
    pub version: u32,
    /// Clock position, RNG state included.
    pub clock: SimClock,
    /// Global resources.
    pub resources: Vec<Resource>,
    /// Every modifier, inactive ones included.
    pub modifiers: Vec<Modifier>,
    /// Every entity with its components.
    pub entities: Vec<Entity>,
    /// Registered module ids, in registration order.
    pub modules: Vec<String>,
}

impl WorldSnapshot {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON, rejecting unknown format versions.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CoreError::SnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorldState;
    use chrono::NaiveDate;

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            WorldSnapshot::from_json("{not json"),
            Err(CoreError::Snapshot(_))
        ));
    }

    #[test]
    fn rejects_other_versions() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut snap = WorldState::new(start, 1).to_snapshot();
        snap.version = 2;
        let json = serde_json::to_string(&snap).unwrap();
        assert!(matches!(
            WorldSnapshot::from_json(&json),
            Err(CoreError::SnapshotVersion { found: 2, expected: 1 })
        ));
    }
}
