use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::types::Snapshot;

/// Durable storage for one domain's previous snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

/// What `load` found. `first_run` is set when there is no usable previous
/// state: missing file, unreadable file, unparsable contents, or a
/// snapshot with zero items.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    pub first_run: bool,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous snapshot. Never fails: any read or parse problem
    /// degrades to the first-run state so one corrupt file can never turn
    /// into a fatal error or a flood of bogus change records.
    pub fn load(&self) -> LoadedSnapshot {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no previous snapshot, first run");
                return LoadedSnapshot {
                    snapshot: Snapshot::new(),
                    first_run: true,
                };
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read snapshot, treating as first run");
                return LoadedSnapshot {
                    snapshot: Snapshot::new(),
                    first_run: true,
                };
            }
        };

        match serde_json::from_slice::<Snapshot>(&bytes) {
            Ok(snapshot) => {
                let first_run = snapshot.is_empty();
                LoadedSnapshot { snapshot, first_run }
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt snapshot, treating as first run");
                LoadedSnapshot {
                    snapshot: Snapshot::new(),
                    first_run: true,
                }
            }
        }
    }

    /// Persist the current snapshot so it becomes "previous" for the next
    /// run. Writes to a sibling temp file and renames over the target, so
    /// a crash mid-write never leaves a torn snapshot behind.
    pub fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create snapshot dir {}", parent.display()))?;
            }
        }

        let json = serde_json::to_vec_pretty(snapshot).context("serialize snapshot")?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} over {}", tmp.display(), self.path.display()))?;

        debug!(path = %self.path.display(), items = snapshot.len(), "snapshot saved");
        Ok(())
    }
}
