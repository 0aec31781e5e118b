//! File identity
//!
//! A `PermaFile` names one physical full or delta file of a logical map.
//! It is a value: it does not hold a handle and never changes, every
//! "next" operation returns a new identity.

use std::cmp::Ordering;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::compression::Compression;
use crate::error::{PermaError, Result};

use super::pattern;
use super::temp::TempFile;

/// Identity of one full (`delta_number == 0`) or delta file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermaFile {
    compression: Compression,
    dir: PathBuf,
    name: String,
    full_number: u32,
    delta_number: u32,
}

impl PermaFile {
    /// Identity of full file `full_number` of `name` in `dir`
    pub fn full(
        compression: Compression,
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        full_number: u32,
    ) -> Self {
        Self {
            compression,
            dir: dir.into(),
            name: name.into(),
            full_number,
            delta_number: 0,
        }
    }

    /// Delta `delta_number` on top of this file's full file
    pub fn delta(&self, delta_number: u32) -> Self {
        Self {
            delta_number,
            ..self.clone()
        }
    }

    /// The delta following this file (same full number and compression)
    pub fn next_delta(&self) -> Self {
        self.delta(self.delta_number + 1)
    }

    /// The next full file, possibly switching compression
    pub fn next_full(&self, compression: Compression) -> Self {
        Self::full(compression, self.dir.clone(), self.name.clone(), self.full_number + 1)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn full_number(&self) -> u32 {
        self.full_number
    }

    pub fn delta_number(&self) -> u32 {
        self.delta_number
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn is_full(&self) -> bool {
        self.delta_number == 0
    }

    pub fn file_name(&self) -> String {
        pattern::file_name(
            &self.name,
            self.full_number,
            self.delta_number,
            self.compression,
        )
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(self.file_name())
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Order by (full number, delta number); only defined within one map
    pub fn try_cmp(&self, other: &PermaFile) -> Result<Ordering> {
        if self.name != other.name {
            return Err(PermaError::InvalidComparison(format!(
                "Can only compare files of the same map, got {:?} and {:?}",
                self.name, other.name
            )));
        }
        Ok((self.full_number, self.delta_number).cmp(&(other.full_number, other.delta_number)))
    }

    // =========================================================================
    // Scoped Streams
    // =========================================================================

    /// Open the file, unwrap its compression and hand the stream to `f`
    ///
    /// The file handle is closed when this returns, whatever `f` returned.
    pub fn with_reader<R>(&self, f: impl FnOnce(&mut dyn Read) -> Result<R>) -> Result<R> {
        let file = File::open(self.path())?;
        let mut reader = self.compression.decompress(BufReader::new(file))?;
        f(&mut reader)
    }

    /// Write this file through a temporary file and publish it atomically
    ///
    /// Stale temporary files of the same map are deleted first. Readers
    /// never see a partially written file at this identity's path.
    pub fn with_writer<R>(
        &self,
        sync: bool,
        f: impl FnOnce(&mut dyn Write) -> Result<R>,
    ) -> Result<R> {
        TempFile::delete_stale(&self.dir, &self.name)?;

        let temp = TempFile::new(&self.dir, &self.name);
        let result = temp.write_with(self.compression, sync, f)?;
        temp.publish(&self.path(), sync)?;
        Ok(result)
    }

    /// Remove the physical file; `false` if there was none
    pub fn delete(&self) -> Result<bool> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl PartialOrd for PermaFile {
    /// `None` for files of different maps, or for same-numbered identities
    /// that differ otherwise (e.g. compression)
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.try_cmp(other) {
            Ok(Ordering::Equal) if self != other => None,
            Ok(ordering) => Some(ordering),
            Err(_) => None,
        }
    }
}

impl fmt::Display for PermaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}
