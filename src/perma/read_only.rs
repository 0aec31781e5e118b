//! Read-only persistent map
//!
//! Loads a persisted map and pulls in changes written by another writer
//! when asked to.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::codec::Codecs;
use crate::config::Options;
use crate::error::Result;
use crate::snapshot::MapSnapshot;

/// Read-only handle on a logical map
///
/// ## Concurrency:
/// - `last_loaded`: RwLock, readers only ever clone the `Arc` map out of it
/// - `load_lock`: serializes `update()` so two refreshes cannot race on
///   which result becomes visible
pub struct ReadOnlyPerma<K, V> {
    last_loaded: RwLock<MapSnapshot<K, V>>,
    load_lock: Mutex<()>,
}

impl<K: Ord + Clone, V: Clone> ReadOnlyPerma<K, V> {
    /// Load map `name` from `dir`; a missing map reads as empty
    pub fn load(dir: impl AsRef<Path>, name: &str, codecs: Codecs<K, V>) -> Result<Self> {
        let dir = dir.as_ref();
        info!(map = name, dir = %dir.display(), "Loading read-only map");
        let snapshot = MapSnapshot::load_or_create(dir, name, Options::default(), codecs)?;
        Ok(Self {
            last_loaded: RwLock::new(snapshot),
            load_lock: Mutex::new(()),
        })
    }

    /// Re-scan the directory and apply new files
    ///
    /// On error the previously loaded map stays visible.
    pub fn update(&self) -> Result<()> {
        let _load_guard = self.load_lock.lock();

        debug!("Updating map");
        let current = self.last_loaded.read().clone();
        let next = current.refresh()?;
        let entries = next.as_immutable_map().len();
        *self.last_loaded.write() = next;

        debug!(entries, "Loaded map snapshot");
        Ok(())
    }

    /// The map as of the last load or update
    pub fn map(&self) -> Arc<BTreeMap<K, V>> {
        self.last_loaded.read().as_immutable_map()
    }

    /// Whether any file of this map was found so far
    pub fn is_persisted(&self) -> bool {
        self.last_loaded.read().is_persisted()
    }
}

impl ReadOnlyPerma<String, String> {
    /// Load a map with string keys and values
    pub fn load_string_map(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::load(dir, name, Codecs::strings())
    }
}
