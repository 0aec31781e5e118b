//! Snapshot Module
//!
//! Lifecycle of one logical map's merged in-memory state.
//!
//! ## States
//! ```text
//!              write_next (non-empty)
//!   ┌─────┐ ───────────────────────────▶ ┌───────────┐ ──┐ write_next / write_delta
//!   │ New │                               │ Persisted │   │ refresh / compact
//!   └─────┘ ───────────────────────────▶ └───────────┘ ◀─┘
//!              refresh (files appeared)
//! ```
//!
//! Snapshots are values: every transition returns a new snapshot and
//! leaves the old one untouched, so a failed transition never damages the
//! state a caller already holds.
//!
//! ## Concurrent Writers
//! Only one writer per logical map is supported. Before publishing, a
//! writer checks that its target file does not exist yet, which catches a
//! second writer that published since the last refresh. The check and the
//! rename are not atomic together, so two writers racing within that
//! window can still overwrite each other.

mod new;
mod persisted;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::codec::Codecs;
use crate::compression::Compression;
use crate::config::Options;
use crate::datastore::MapData;
use crate::error::{PermaError, Result};
use crate::file::{validate_name, FileGroup, PermaFile};

pub use new::NewMapSnapshot;
pub use persisted::PersistedMapSnapshot;

/// Name, options and codecs shared by all snapshots of one map
pub(crate) struct SnapshotContext<K, V> {
    pub name: String,
    pub options: Options,
    pub codecs: Codecs<K, V>,
}

/// A map that was never persisted, or one backed by a full+delta chain
pub enum MapSnapshot<K, V> {
    New(NewMapSnapshot<K, V>),
    Persisted(PersistedMapSnapshot<K, V>),
}

impl<K: Ord + Clone, V: Clone> MapSnapshot<K, V> {
    /// Load the map's chain from `dir`, or start a new snapshot if there is none
    pub fn load_or_create(
        dir: impl AsRef<Path>,
        name: &str,
        options: Options,
        codecs: Codecs<K, V>,
    ) -> Result<Self> {
        validate_name(name)?;
        let ctx = Arc::new(SnapshotContext {
            name: name.to_string(),
            options,
            codecs,
        });

        let files = FileGroup::list(dir, name)?;
        if files.exists() {
            Ok(MapSnapshot::Persisted(PersistedMapSnapshot::load(ctx, files)?))
        } else {
            Ok(MapSnapshot::New(NewMapSnapshot::new(ctx, files)))
        }
    }

    /// Persist `current` as the next full file
    ///
    /// A never persisted snapshot with an empty `current` writes nothing.
    /// Superseded files are left on disk.
    pub fn write_next(&self, current: &BTreeMap<K, V>) -> Result<Self> {
        match self {
            MapSnapshot::New(s) => s.write_next(current),
            MapSnapshot::Persisted(s) => s.write_next(current),
        }
    }

    /// Pick up files written since this snapshot was loaded or written
    pub fn refresh(&self) -> Result<Self> {
        match self {
            MapSnapshot::New(s) => s.refresh(),
            MapSnapshot::Persisted(s) => s.refresh(),
        }
    }

    /// Collapse full file and deltas into a new full file
    pub fn compact(&self) -> Result<Self> {
        match self {
            MapSnapshot::New(_) => Ok(self.clone()),
            MapSnapshot::Persisted(s) => s.compact(),
        }
    }

    /// Write `current` as a new full file and delete the superseded chain
    pub fn write_compacted(&self, current: &BTreeMap<K, V>) -> Result<Self> {
        match self {
            MapSnapshot::New(s) => s.write_next(current),
            MapSnapshot::Persisted(s) => s.write_compacted(current),
        }
    }

    /// Read-only view of the merged map (empty until first persisted)
    pub fn as_immutable_map(&self) -> Arc<BTreeMap<K, V>> {
        match self {
            MapSnapshot::New(_) => Arc::new(BTreeMap::new()),
            MapSnapshot::Persisted(s) => s.map(),
        }
    }

    pub fn files(&self) -> &FileGroup {
        match self {
            MapSnapshot::New(s) => s.files(),
            MapSnapshot::Persisted(s) => s.files(),
        }
    }

    /// Codecs this map was loaded with
    pub fn codecs(&self) -> Codecs<K, V> {
        match self {
            MapSnapshot::New(s) => s.codecs(),
            MapSnapshot::Persisted(s) => s.codecs(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, MapSnapshot::Persisted(_))
    }

    pub fn name(&self) -> &str {
        self.files().name()
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> MapSnapshot<K, V> {
    /// Persist the changes from the merged map to `current` as the next delta
    ///
    /// Without any change nothing is written. A never persisted snapshot
    /// writes a full file instead.
    pub fn write_delta(&self, current: &BTreeMap<K, V>) -> Result<Self> {
        match self {
            MapSnapshot::New(s) => s.write_next(current),
            MapSnapshot::Persisted(s) => s.write_delta(current),
        }
    }
}

impl<K, V> Clone for MapSnapshot<K, V> {
    fn clone(&self) -> Self {
        match self {
            MapSnapshot::New(s) => MapSnapshot::New(s.clone()),
            MapSnapshot::Persisted(s) => MapSnapshot::Persisted(s.clone()),
        }
    }
}

impl<K, V> fmt::Debug for MapSnapshot<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapSnapshot::New(s) => f
                .debug_struct("NewMapSnapshot")
                .field("files", s.files())
                .finish(),
            MapSnapshot::Persisted(s) => f
                .debug_struct("PersistedMapSnapshot")
                .field("files", s.files())
                .field("entries", &s.len())
                .field("last_header", s.last_header())
                .finish(),
        }
    }
}

// =============================================================================
// Shared Transitions
// =============================================================================

/// Write `current` as the full file following `files`
fn write_full<K: Ord + Clone, V: Clone>(
    ctx: &Arc<SnapshotContext<K, V>>,
    files: &FileGroup,
    current: &BTreeMap<K, V>,
) -> Result<PersistedMapSnapshot<K, V>> {
    let next = files.with_next_full(ctx.options.compression());
    let full_file = next.full_file()?;
    ensure_unpublished(full_file)?;

    debug!(
        map_size = current.len(),
        file = %full_file,
        "Writing full file"
    );
    let data = MapData::new_full(&ctx.name, full_file.full_number(), current.clone())
        .write_to(full_file, ctx.options.sync_writes, &ctx.codecs)?;

    let (header, map, _) = data.into_parts();
    Ok(PersistedMapSnapshot::new(
        Arc::clone(ctx),
        next,
        Arc::new(map),
        header,
    ))
}

/// Refuse to publish a number another writer already published
///
/// Every compression variant of the number counts, since a plain and a
/// compressed file with the same number make the group unlistable.
fn ensure_unpublished(file: &PermaFile) -> Result<()> {
    let published = Compression::ALL.into_iter().find_map(|compression| {
        let variant = PermaFile::full(compression, file.dir(), file.name(), file.full_number())
            .delta(file.delta_number());
        variant.exists().then_some(variant)
    });

    match published {
        Some(existing) => Err(PermaError::NamingConflict(format!(
            "{} already exists, another writer published it since the last refresh",
            existing
        ))),
        None => Ok(()),
    }
}
