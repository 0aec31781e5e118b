//! Writable persistent map
//!
//! An in-memory map that is persisted on request. Each `persist()` appends
//! a delta with the changes since the previous write; after a configurable
//! number of deltas it writes a fresh full file instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::codec::Codecs;
use crate::config::Options;
use crate::error::Result;
use crate::snapshot::MapSnapshot;

/// Read-write handle on a logical map
///
/// ## Concurrency:
/// - `current`: RwLock, the live map all mutators work on
/// - `snapshot`: Mutex, held for a whole persist/compact/refresh so
///   writes of this handle are serialized
/// - Lock order: `snapshot` → `current`
pub struct WritablePerma<K, V> {
    current: RwLock<BTreeMap<K, V>>,
    snapshot: Mutex<MapSnapshot<K, V>>,
    options: Options,
}

impl<K: Ord + Clone, V: Clone + PartialEq> WritablePerma<K, V> {
    /// Load or create map `name` in `dir` with default options
    pub fn load(dir: impl AsRef<Path>, name: &str, codecs: Codecs<K, V>) -> Result<Self> {
        Self::load_with_options(dir, name, Options::default(), codecs)
    }

    /// Load or create map `name` in `dir`, creating the directory if needed
    pub fn load_with_options(
        dir: impl AsRef<Path>,
        name: &str,
        options: Options,
        codecs: Codecs<K, V>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        info!(map = name, dir = %dir.display(), "Loading writable map");

        let snapshot = MapSnapshot::load_or_create(dir, name, options.clone(), codecs)?;
        let current = (*snapshot.as_immutable_map()).clone();
        Ok(Self {
            current: RwLock::new(current),
            snapshot: Mutex::new(snapshot),
            options,
        })
    }

    // =========================================================================
    // In-Memory Map
    // =========================================================================

    pub fn get(&self, key: &K) -> Option<V> {
        self.current.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.current.read().contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.current.write().insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.current.write().remove(key)
    }

    pub fn clear(&self) {
        self.current.write().clear();
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Copy of the live map, including changes not yet persisted
    pub fn map(&self) -> BTreeMap<K, V> {
        self.current.read().clone()
    }

    /// The map as of the last persist, compact or refresh
    pub fn persisted_map(&self) -> Arc<BTreeMap<K, V>> {
        self.snapshot.lock().as_immutable_map()
    }

    /// Number of delta files on top of the current full file
    pub fn delta_file_count(&self) -> usize {
        self.snapshot.lock().files().delta_files().len()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write the changes since the last persist
    ///
    /// Writes a delta file, or a full file when the map was never persisted
    /// or the delta chain reached `compact_after_deltas`.
    pub fn persist(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        let current = self.current.read().clone();

        let deltas = snapshot.files().delta_files().len();
        let next = match self.options.compact_after_deltas {
            Some(limit) if snapshot.is_persisted() && deltas >= limit => {
                debug!(deltas, limit, "Delta limit reached, writing full file");
                snapshot.write_compacted(&current)?
            }
            _ => snapshot.write_delta(&current)?,
        };
        *snapshot = next;
        Ok(())
    }

    /// Write the whole live map as a new full file
    pub fn persist_full(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        let current = self.current.read().clone();
        *snapshot = snapshot.write_next(&current)?;
        Ok(())
    }

    /// Collapse the persisted chain into one full file
    ///
    /// Unpersisted changes of the live map are not included.
    pub fn compact(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        *snapshot = snapshot.compact()?;
        Ok(())
    }

    /// Reload from disk, replacing the live map with the persisted state
    pub fn refresh(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        let next = snapshot.refresh()?;
        *self.current.write() = (*next.as_immutable_map()).clone();
        *snapshot = next;
        Ok(())
    }

    /// Delete all files of this map; the live map is kept in memory
    pub fn delete_files(&self) -> Result<bool> {
        let mut snapshot = self.snapshot.lock();
        let files = snapshot.files().refresh()?;
        let deleted = files.delete()?;
        files.delete_stale_temp_files()?;

        *snapshot = snapshot_after_delete(&snapshot, &self.options)?;
        info!(map = files.name(), deleted, "Deleted map files");
        Ok(deleted)
    }
}

/// A fresh, never persisted snapshot for the same map
fn snapshot_after_delete<K: Ord + Clone, V: Clone>(
    snapshot: &MapSnapshot<K, V>,
    options: &Options,
) -> Result<MapSnapshot<K, V>> {
    let files = snapshot.files();
    let codecs = snapshot.codecs();
    MapSnapshot::load_or_create(files.dir(), files.name(), options.clone(), codecs)
}
