//! Snapshot backed by a full file and its delta chain

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec::Codecs;
use crate::datastore::{Header, MapData};
use crate::error::{PermaError, Result};
use crate::file::{FileGroup, PermaFile};

use super::{ensure_unpublished, write_full, MapSnapshot, SnapshotContext};

/// Merged map of a chain plus the header of the chain's last file
pub struct PersistedMapSnapshot<K, V> {
    ctx: Arc<SnapshotContext<K, V>>,
    files: FileGroup,
    map: Arc<BTreeMap<K, V>>,
    last_header: Header,
}

impl<K, V> PersistedMapSnapshot<K, V> {
    pub(crate) fn new(
        ctx: Arc<SnapshotContext<K, V>>,
        files: FileGroup,
        map: Arc<BTreeMap<K, V>>,
        last_header: Header,
    ) -> Self {
        Self {
            ctx,
            files,
            map,
            last_header,
        }
    }

    pub fn files(&self) -> &FileGroup {
        &self.files
    }

    pub(crate) fn codecs(&self) -> Codecs<K, V> {
        self.ctx.codecs.clone()
    }

    pub fn map(&self) -> Arc<BTreeMap<K, V>> {
        Arc::clone(&self.map)
    }

    /// Header of the latest file read or written
    pub fn last_header(&self) -> &Header {
        &self.last_header
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Same files and map, newer directory listing
    fn with_files(&self, files: FileGroup) -> Self {
        Self {
            files,
            ..self.clone()
        }
    }
}

impl<K: Ord + Clone, V: Clone> PersistedMapSnapshot<K, V> {
    /// Replay the full file and deltas of `files`
    pub(crate) fn load(ctx: Arc<SnapshotContext<K, V>>, files: FileGroup) -> Result<Self> {
        let full_file = files.full_file()?;
        let mut collector = BTreeMap::new();
        let last_header =
            MapData::read_chain(full_file, files.delta_files(), &ctx.codecs, &mut collector)?;

        info!(
            map = %ctx.name,
            entries = collector.len(),
            full_file = %full_file,
            delta_files = files.delta_files().len(),
            "Loaded map"
        );
        Ok(Self::new(ctx, files, Arc::new(collector), last_header))
    }

    pub(crate) fn write_next(&self, current: &BTreeMap<K, V>) -> Result<MapSnapshot<K, V>> {
        let persisted = write_full(&self.ctx, &self.files, current)?;
        Ok(MapSnapshot::Persisted(persisted))
    }

    /// Re-scan; extend the chain if the full file is unchanged, else reload
    ///
    /// All or nothing: on error `self` is untouched.
    pub(crate) fn refresh(&self) -> Result<MapSnapshot<K, V>> {
        let refreshed = self.files.refresh()?;
        if !refreshed.exists() {
            debug!(map = %self.ctx.name, "No file found, cancelling refresh");
            return Ok(MapSnapshot::Persisted(self.clone()));
        }

        if !refreshed.has_same_full_file_as(&self.files) {
            debug!(map = %self.ctx.name, "Full file changed, reloading");
            let loaded = Self::load(Arc::clone(&self.ctx), refreshed)?;
            return Ok(MapSnapshot::Persisted(loaded));
        }

        let new_deltas = refreshed.delta_files_since(&self.files);
        if new_deltas.is_empty() {
            debug!(map = %self.ctx.name, "No new delta files");
            return Ok(MapSnapshot::Persisted(self.with_files(refreshed)));
        }

        let mut collector = (*self.map).clone();
        let last_header =
            MapData::extend_chain(&self.last_header, new_deltas, &self.ctx.codecs, &mut collector)?;
        debug!(
            map = %self.ctx.name,
            new_deltas = new_deltas.len(),
            entries = collector.len(),
            "Applied new delta files"
        );
        Ok(MapSnapshot::Persisted(Self::new(
            Arc::clone(&self.ctx),
            refreshed,
            Arc::new(collector),
            last_header,
        )))
    }

    pub(crate) fn compact(&self) -> Result<MapSnapshot<K, V>> {
        self.write_compacted(&self.map)
    }

    /// Write `current` as the next full file, then delete the old chain
    pub(crate) fn write_compacted(&self, current: &BTreeMap<K, V>) -> Result<MapSnapshot<K, V>> {
        let compacted = write_full(&self.ctx, &self.files, current)?;
        info!(
            map = %self.ctx.name,
            replaced_deltas = self.files.delta_files().len(),
            "Compacted map"
        );

        if let Err(e) = self.files.delete() {
            warn!(map = %self.ctx.name, error = %e, "Could not delete superseded files after compaction");
        }
        Ok(MapSnapshot::Persisted(compacted))
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> PersistedMapSnapshot<K, V> {
    pub(crate) fn write_delta(&self, current: &BTreeMap<K, V>) -> Result<MapSnapshot<K, V>> {
        let (upserted, deleted) = MapData::diff(&self.map, current);
        if upserted.is_empty() && deleted.is_empty() {
            debug!(map = %self.ctx.name, "No changes since last write, ignoring");
            return Ok(MapSnapshot::Persisted(self.clone()));
        }

        let next = self.files.with_next_delta()?;
        let delta_file = next.latest_delta_file()?;
        ensure_unpublished(delta_file)?;
        ensure_no_orphaned_deltas(&self.files, delta_file)?;

        debug!(
            upserted = upserted.len(),
            deleted = deleted.len(),
            file = %delta_file,
            "Writing delta file"
        );
        let data = MapData::new_delta(&self.last_header, upserted, deleted).write_to(
            delta_file,
            self.ctx.options.sync_writes,
            &self.ctx.codecs,
        )?;

        Ok(MapSnapshot::Persisted(Self::new(
            Arc::clone(&self.ctx),
            next,
            Arc::new(current.clone()),
            data.header().clone(),
        )))
    }
}

/// Refuse to extend a chain that has deltas beyond a numbering gap
///
/// Publishing the missing number would splice the stale later deltas back
/// into the chain. A compaction writes a new full file and leaves them behind.
fn ensure_no_orphaned_deltas(files: &FileGroup, next_delta: &PermaFile) -> Result<()> {
    let on_disk = files.refresh()?;
    let orphaned: Vec<String> = on_disk
        .orphaned_delta_files()
        .iter()
        .filter(|f| f.full_number() == next_delta.full_number())
        .map(|f| f.file_name())
        .collect();
    if orphaned.is_empty() {
        return Ok(());
    }

    warn!(file = %next_delta, orphaned = ?orphaned, "Delta chain has a gap, refusing to write delta");
    Err(PermaError::HeaderMismatch(format!(
        "Delta chain before {} has a gap, later deltas {:?} would follow it; compact to start a new full file",
        next_delta, orphaned
    )))
}

impl<K, V> Clone for PersistedMapSnapshot<K, V> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            files: self.files.clone(),
            map: Arc::clone(&self.map),
            last_header: self.last_header.clone(),
        }
    }
}
