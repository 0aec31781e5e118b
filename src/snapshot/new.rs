//! Snapshot of a map that was never persisted

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::codec::Codecs;
use crate::error::Result;
use crate::file::FileGroup;

use super::{write_full, MapSnapshot, PersistedMapSnapshot, SnapshotContext};

/// No files exist yet; the visible map is empty
pub struct NewMapSnapshot<K, V> {
    ctx: Arc<SnapshotContext<K, V>>,
    files: FileGroup,
}

impl<K, V> NewMapSnapshot<K, V> {
    pub(crate) fn new(ctx: Arc<SnapshotContext<K, V>>, files: FileGroup) -> Self {
        debug!(map = %ctx.name, "Creating new snapshot");
        Self { ctx, files }
    }

    pub fn files(&self) -> &FileGroup {
        &self.files
    }

    pub(crate) fn codecs(&self) -> Codecs<K, V> {
        self.ctx.codecs.clone()
    }
}

impl<K: Ord + Clone, V: Clone> NewMapSnapshot<K, V> {
    pub(crate) fn write_next(&self, current: &BTreeMap<K, V>) -> Result<MapSnapshot<K, V>> {
        if current.is_empty() && !self.files.exists() {
            debug!(map = %self.ctx.name, "Nothing to write (map is not yet persisted and still empty), ignoring");
            return Ok(MapSnapshot::New(self.clone()));
        }
        let persisted = write_full(&self.ctx, &self.files, current)?;
        Ok(MapSnapshot::Persisted(persisted))
    }

    pub(crate) fn refresh(&self) -> Result<MapSnapshot<K, V>> {
        let refreshed = self.files.refresh()?;
        if !refreshed.exists() {
            debug!(map = %self.ctx.name, "No file found, cancelling refresh");
            return Ok(MapSnapshot::New(self.clone()));
        }
        let loaded = PersistedMapSnapshot::load(Arc::clone(&self.ctx), refreshed)?;
        Ok(MapSnapshot::Persisted(loaded))
    }
}

impl<K, V> Clone for NewMapSnapshot<K, V> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            files: self.files.clone(),
        }
    }
}
