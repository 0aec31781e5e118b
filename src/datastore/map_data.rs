//! Map Data
//!
//! The payload of one map file: its header plus the upserted entries and
//! deleted keys it carries. Full files carry the whole map and no
//! deletions; delta files carry the changes since their predecessor.
//!
//! ## Chain Replay
//! ```text
//! collector ← F(n)        header must be a full header
//! collector ← F(n)-D1     header must be next delta of F(n)
//! collector ← F(n)-D2     header must be next delta of D1
//! ...
//! ```
//! Each file is validated before it touches the collector, and the first
//! violation aborts the whole replay.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

use tracing::debug;

use crate::codec::Codecs;
use crate::error::{PermaError, Result};
use crate::file::PermaFile;

use super::header::Header;
use super::record::EntryRecord;

/// Header, upserts and deletions of one map file
#[derive(Debug, Clone, PartialEq)]
pub struct MapData<K, V> {
    header: Header,
    upserted: BTreeMap<K, V>,
    deleted: BTreeSet<K>,
}

impl<K: Ord + Clone, V: Clone> MapData<K, V> {
    /// Full file payload holding all of `current`
    pub fn new_full(name: &str, full_number: u32, current: BTreeMap<K, V>) -> Self {
        Self {
            header: Header::new_full(name, full_number, current.len() as u64),
            upserted: current,
            deleted: BTreeSet::new(),
        }
    }

    /// Delta payload following the file described by `previous`
    pub fn new_delta(previous: &Header, upserted: BTreeMap<K, V>, deleted: BTreeSet<K>) -> Self {
        let count = (upserted.len() + deleted.len()) as u64;
        Self {
            header: previous.next_delta(count),
            upserted,
            deleted,
        }
    }

    /// Delta payload following this one
    pub fn next_delta(&self, upserted: BTreeMap<K, V>, deleted: BTreeSet<K>) -> Self {
        Self::new_delta(&self.header, upserted, deleted)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn upserted(&self) -> &BTreeMap<K, V> {
        &self.upserted
    }

    pub fn deleted(&self) -> &BTreeSet<K> {
        &self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.deleted.is_empty()
    }

    pub fn into_parts(self) -> (Header, BTreeMap<K, V>, BTreeSet<K>) {
        (self.header, self.upserted, self.deleted)
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Upserts overwrite, then deletions remove
    pub fn apply_to(&self, collector: &mut BTreeMap<K, V>) {
        for (key, value) in &self.upserted {
            collector.insert(key.clone(), value.clone());
        }
        for key in &self.deleted {
            collector.remove(key);
        }
    }

    /// Like `apply_to`, moving the entries instead of cloning them
    fn merge_into(self, collector: &mut BTreeMap<K, V>) -> Header {
        if collector.is_empty() {
            *collector = self.upserted;
        } else {
            collector.extend(self.upserted);
        }
        for key in &self.deleted {
            collector.remove(key);
        }
        self.header
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Serialize header, upserts, then tombstones
    pub fn write(&self, out: &mut dyn Write, codecs: &Codecs<K, V>) -> Result<()> {
        self.header.write_to(out)?;

        let mut written: u64 = 0;
        for (key, value) in &self.upserted {
            EntryRecord::write_upsert(out, key, value, codecs)?;
            written += 1;
        }
        for key in &self.deleted {
            EntryRecord::write_tombstone(out, key, codecs)?;
            written += 1;
        }
        out.flush()?;

        let expected = (self.upserted.len() + self.deleted.len()) as u64;
        if !self.header.has_size(written) || !self.header.has_size(expected) {
            return Err(PermaError::HeaderMismatch(format!(
                "Invalid size: header declares {} entries, wrote {}",
                self.header.entry_count(),
                written
            )));
        }
        Ok(())
    }

    /// Atomically write this payload as `file`
    pub fn write_to(self, file: &PermaFile, sync: bool, codecs: &Codecs<K, V>) -> Result<Self> {
        if !self.header.matches_file(file) {
            return Err(PermaError::HeaderMismatch(format!(
                "{} does not belong in file {}",
                self.header, file
            )));
        }

        file.with_writer(sync, |out| self.write(out, codecs))?;
        debug!(file = %file, entries = self.header.entry_count(), "Wrote map file");
        Ok(self)
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Parse a header and all records up to end of stream
    pub fn read(input: &mut dyn Read, codecs: &Codecs<K, V>) -> Result<Self> {
        let header = Header::read_from(input)?;

        let mut upserted = BTreeMap::new();
        let mut deleted = BTreeSet::new();
        let mut count: u64 = 0;
        while let Some(record) = EntryRecord::read_from(input, codecs)? {
            match record {
                EntryRecord::Upsert(key, value) => {
                    deleted.remove(&key);
                    upserted.insert(key, value);
                }
                EntryRecord::Tombstone(key) => {
                    upserted.remove(&key);
                    deleted.insert(key);
                }
            }
            count += 1;
        }

        if !header.has_size(count) {
            return Err(PermaError::HeaderMismatch(format!(
                "Invalid size: header declares {} entries, file holds {}",
                header.entry_count(),
                count
            )));
        }

        Ok(Self {
            header,
            upserted,
            deleted,
        })
    }

    pub fn read_from(file: &PermaFile, codecs: &Codecs<K, V>) -> Result<Self> {
        file.with_reader(|input| Self::read(input, codecs))
    }

    /// Replay a full file and its deltas into `collector`
    ///
    /// Returns the header of the last file applied. On error the collector
    /// may hold a prefix of the chain; callers replay into a scratch map.
    pub fn read_chain(
        full_file: &PermaFile,
        delta_files: &[PermaFile],
        codecs: &Codecs<K, V>,
        collector: &mut BTreeMap<K, V>,
    ) -> Result<Header> {
        let full = Self::read_from(full_file, codecs)?;
        if !full.header.is_full_file() || !full.header.matches_file(full_file) {
            return Err(PermaError::HeaderMismatch(format!(
                "Invalid header, expected full file header of {} but is {}",
                full_file, full.header
            )));
        }
        let header = full.merge_into(collector);

        Self::extend_chain(&header, delta_files, codecs, collector)
    }

    /// Continue a replay after the file described by `previous`
    ///
    /// This is how an already loaded map picks up newly appeared deltas
    /// without reading its full file again.
    pub fn extend_chain(
        previous: &Header,
        delta_files: &[PermaFile],
        codecs: &Codecs<K, V>,
        collector: &mut BTreeMap<K, V>,
    ) -> Result<Header> {
        let mut latest = previous.clone();
        for delta_file in delta_files {
            let next = Self::read_from(delta_file, codecs)?;
            if !next.header.is_next_delta_file_of(&latest) {
                return Err(PermaError::HeaderMismatch(format!(
                    "Invalid header sequence, {} is not next delta of {}",
                    next.header, latest
                )));
            }
            latest = next.merge_into(collector);
        }
        Ok(latest)
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> MapData<K, V> {
    /// Upserts and deletions turning `previous` into `current`
    pub fn diff(
        previous: &BTreeMap<K, V>,
        current: &BTreeMap<K, V>,
    ) -> (BTreeMap<K, V>, BTreeSet<K>) {
        let upserted = current
            .iter()
            .filter(|(key, value)| previous.get(key) != Some(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let deleted = previous
            .keys()
            .filter(|key| !current.contains_key(key))
            .cloned()
            .collect();
        (upserted, deleted)
    }
}
