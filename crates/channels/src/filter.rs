//! Monitored-channel allow-list with synchronous JSON persistence.

use std::{
    collections::{BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::RwLock,
};

use tracing::{error, info, warn};

use crate::Result;

/// The set of channels whose traffic is relayed.
///
/// Reads are lock-shared; every mutation rewrites the backing file before
/// returning. A failed write is logged and the in-memory change is kept.
pub struct ChannelFilter {
    monitored: RwLock<HashSet<u64>>,
    path: Option<PathBuf>,
}

impl ChannelFilter {
    /// Filter with no backing file. Mutations are memory-only.
    pub fn in_memory() -> Self {
        Self {
            monitored: RwLock::new(HashSet::new()),
            path: None,
        }
    }

    /// Load the persisted set from `path`.
    ///
    /// A missing file yields an empty set. An unreadable or malformed file
    /// also yields an empty set, with an error logged; the file is left alone
    /// until the next mutation overwrites it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let monitored = match read_ids(&path) {
            Ok(Some(ids)) => {
                info!(path = %path.display(), count = ids.len(), "loaded monitored channels");
                ids
            },
            Ok(None) => {
                info!(path = %path.display(), "no monitored channels file, starting empty");
                HashSet::new()
            },
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load monitored channels, starting empty");
                HashSet::new()
            },
        };
        Self {
            monitored: RwLock::new(monitored),
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_monitored(&self, channel_id: u64) -> bool {
        self.monitored
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&channel_id)
    }

    /// Add a channel. Returns false if it was already monitored, in which
    /// case nothing is written.
    pub fn add(&self, channel_id: u64) -> bool {
        let mut set = self.monitored.write().unwrap_or_else(|e| e.into_inner());
        if !set.insert(channel_id) {
            return false;
        }
        self.persist(&set);
        info!(channel_id, "channel added to monitoring");
        true
    }

    /// Remove a channel. Returns false if it was not monitored.
    pub fn remove(&self, channel_id: u64) -> bool {
        let mut set = self.monitored.write().unwrap_or_else(|e| e.into_inner());
        if !set.remove(&channel_id) {
            return false;
        }
        self.persist(&set);
        info!(channel_id, "channel removed from monitoring");
        true
    }

    /// Sorted snapshot of the monitored ids.
    pub fn monitored(&self) -> BTreeSet<u64> {
        self.monitored
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.monitored.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Called with the write lock held so the file never lags a later mutation.
    fn persist(&self, set: &HashSet<u64>) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_ids(path, set) {
            error!(path = %path.display(), error = %e, "failed to persist monitored channels");
        }
    }
}

fn read_ids(path: &Path) -> Result<Option<HashSet<u64>>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        warn!(path = %path.display(), "monitored channels file is empty");
        return Ok(Some(HashSet::new()));
    }
    let ids: Vec<u64> = serde_json::from_str(&raw)?;
    Ok(Some(ids.into_iter().collect()))
}

/// Write the sorted id list to a sibling temp file, then rename over `path`.
fn write_ids(path: &Path, set: &HashSet<u64>) -> Result<()> {
    let sorted: BTreeSet<u64> = set.iter().copied().collect();
    let json = serde_json::to_string_pretty(&sorted)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
