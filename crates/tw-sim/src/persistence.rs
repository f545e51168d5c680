use std::fs;
use std::path::{Path, PathBuf};

use tw_core::WorldSnapshot;

use crate::error::SimResult;

/// Where the driver keeps world snapshots between runs.
///
/// Only the latest snapshot matters for resume. A failed save must leave
/// the previous snapshot loadable.
pub trait SnapshotStore {
    /// Replace the stored snapshot with `snapshot`.
    fn save_snapshot(&mut self, snapshot: &WorldSnapshot) -> SimResult<()>;

    /// The latest snapshot, or `None` if nothing was ever saved.
    fn load_snapshot(&self) -> SimResult<Option<WorldSnapshot>>;
}

/// Pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// A store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn save_snapshot(&mut self, snapshot: &WorldSnapshot) -> SimResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = snapshot.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), tick = snapshot.clock.tick(), "snapshot saved");
        Ok(())
    }

    fn load_snapshot(&self) -> SimResult<Option<WorldSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(Some(WorldSnapshot::from_json(&json)?))
    }
}

/// Keeps the latest snapshot in memory. Used by tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    latest: Option<WorldSnapshot>,
    saves: usize,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `snapshot`, ready to resume from.
    pub fn with_snapshot(snapshot: WorldSnapshot) -> Self {
        Self {
            latest: Some(snapshot),
            saves: 0,
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// The last snapshot saved or seeded.
    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.latest.as_ref()
    }
}

impl SnapshotStore for MemoryStore {
    fn save_snapshot(&mut self, snapshot: &WorldSnapshot) -> SimResult<()> {
        self.latest = Some(snapshot.clone());
        self.saves += 1;
        Ok(())
    }

    fn load_snapshot(&self) -> SimResult<Option<WorldSnapshot>> {
        Ok(self.latest.clone())
    }
}
