//! File Group
//!
//! The files of one logical map currently present in a directory: the
//! latest full file and the deltas chained to it.
//!
//! ## Invariants
//! - no full file ⇒ no delta files
//! - delta files are numbered 1, 2, 3, ... without gaps, all on the full
//!   file's number and with the full file's compression
//!
//! A group is a view derived from one directory scan. It holds no handles
//! and never caches: [`FileGroup::refresh`] simply scans again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::compression::Compression;
use crate::error::{PermaError, Result};

use super::pattern::{self, ParsedFileName};
use super::perma_file::PermaFile;
use super::temp::TempFile;

/// Full file plus ordered delta chain of one logical map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    dir: PathBuf,
    name: String,
    full_file: Option<PermaFile>,
    delta_files: Vec<PermaFile>,
    orphaned_deltas: Vec<PermaFile>,
}

impl FileGroup {
    /// Scan `dir` for the files of map `name`
    ///
    /// A missing directory or a directory without matching files yields an
    /// empty group. Two full files with the same highest number (e.g. one
    /// plain and one compressed) are a naming conflict.
    pub fn list(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let empty = Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            full_file: None,
            delta_files: Vec::new(),
            orphaned_deltas: Vec::new(),
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(empty),
            Err(e) => return Err(e.into()),
        };

        // Single pass: collect every parsable map file of this name
        let mut fulls: Vec<ParsedFileName> = Vec::new();
        let mut deltas: Vec<ParsedFileName> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(parsed) = file_name
                .to_str()
                .and_then(|file_name| pattern::parse_file_name(name, file_name))
            else {
                continue;
            };

            if parsed.delta_number == 0 {
                fulls.push(parsed);
            } else {
                deltas.push(parsed);
            }
        }

        let Some(latest) = fulls.iter().map(|f| f.full_number).max() else {
            return Ok(empty);
        };
        let latest_fulls: Vec<&ParsedFileName> =
            fulls.iter().filter(|f| f.full_number == latest).collect();
        if latest_fulls.len() > 1 {
            return Err(PermaError::NamingConflict(format!(
                "{} full files numbered {} for map {} in {}",
                latest_fulls.len(),
                latest,
                name,
                dir.display()
            )));
        }
        let compression = latest_fulls[0].compression;
        let full_file = PermaFile::full(compression, dir, name, latest);

        let (delta_files, orphaned_deltas) = Self::chain_deltas(&full_file, compression, deltas);

        Ok(Self {
            full_file: Some(full_file),
            delta_files,
            orphaned_deltas,
            ..empty
        })
    }

    /// Contiguous deltas D1, D2, ... of `full_file`, stopping at the first gap,
    /// and the deltas of `full_file` found beyond that gap
    fn chain_deltas(
        full_file: &PermaFile,
        compression: Compression,
        deltas: Vec<ParsedFileName>,
    ) -> (Vec<PermaFile>, Vec<PermaFile>) {
        let mut numbers: Vec<u32> = deltas
            .into_iter()
            .filter(|d| d.full_number == full_file.full_number() && d.compression == compression)
            .map(|d| d.delta_number)
            .collect();
        numbers.sort_unstable();

        let mut chain = Vec::with_capacity(numbers.len());
        for (expected, number) in (1..).zip(numbers.iter().copied()) {
            if number != expected {
                warn!(
                    full_file = %full_file,
                    missing_delta = expected,
                    ignored = numbers.len() - chain.len(),
                    "Gap in delta chain, ignoring later delta files"
                );
                break;
            }
            chain.push(full_file.delta(number));
        }

        let orphaned = numbers[chain.len()..]
            .iter()
            .map(|&number| full_file.delta(number))
            .collect();
        (chain, orphaned)
    }

    /// Scan the same directory again
    pub fn refresh(&self) -> Result<Self> {
        Self::list(&self.dir, &self.name)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a full file exists
    pub fn exists(&self) -> bool {
        self.full_file.is_some()
    }

    pub fn full_file(&self) -> Result<&PermaFile> {
        self.full_file.as_ref().ok_or_else(|| {
            PermaError::NotFound(format!(
                "No file for map {} found in {}",
                self.name,
                self.dir.display()
            ))
        })
    }

    pub fn latest_delta_file(&self) -> Result<&PermaFile> {
        self.delta_files.last().ok_or_else(|| {
            PermaError::NotFound(format!(
                "No delta file for map {} found in {}",
                self.name,
                self.dir.display()
            ))
        })
    }

    /// The latest delta, or the full file if there are no deltas
    pub fn latest_file(&self) -> Result<&PermaFile> {
        match self.delta_files.last() {
            Some(delta) => Ok(delta),
            None => self.full_file(),
        }
    }

    pub fn delta_files(&self) -> &[PermaFile] {
        &self.delta_files
    }

    /// Deltas of the full file left out of the chain by a numbering gap
    pub fn orphaned_delta_files(&self) -> &[PermaFile] {
        &self.orphaned_deltas
    }

    pub fn has_same_full_file_as(&self, other: &FileGroup) -> bool {
        self.full_file == other.full_file
    }

    /// Delta files that appeared since `previous` was listed
    ///
    /// If `previous` had no deltas the whole current chain is returned,
    /// since its full file may have been replaced in the meantime.
    pub fn delta_files_since(&self, previous: &FileGroup) -> &[PermaFile] {
        if previous.delta_files.is_empty() {
            return &self.delta_files;
        }
        self.delta_files
            .get(previous.delta_files.len()..)
            .unwrap_or(&[])
    }

    // =========================================================================
    // Next Identities
    // =========================================================================

    /// Group holding only the next full file (F1 if none exists yet)
    pub fn with_next_full(&self, compression: Compression) -> Self {
        let next = match &self.full_file {
            Some(full) => full.next_full(compression),
            None => PermaFile::full(compression, self.dir.clone(), self.name.clone(), 1),
        };
        Self {
            dir: self.dir.clone(),
            name: self.name.clone(),
            full_file: Some(next),
            delta_files: Vec::new(),
            orphaned_deltas: Vec::new(),
        }
    }

    /// Group with one more delta file after the latest existing file
    pub fn with_next_delta(&self) -> Result<Self> {
        let next = self.latest_file()?.next_delta();
        let mut delta_files = self.delta_files.clone();
        delta_files.push(next);
        Ok(Self {
            delta_files,
            ..self.clone()
        })
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Delete the full file and all delta files, orphaned ones included
    ///
    /// Keeps going when a single file cannot be deleted and reports the
    /// first failure afterwards. Returns whether any file was deleted.
    pub fn delete(&self) -> Result<bool> {
        let Some(full_file) = &self.full_file else {
            return Ok(false);
        };

        let mut deleted = false;
        let mut first_error = None;
        let deltas = self.delta_files.iter().chain(self.orphaned_deltas.iter());
        for file in std::iter::once(full_file).chain(deltas) {
            match file.delete() {
                Ok(existed) => deleted |= existed,
                Err(e) => {
                    warn!(file = %file, error = %e, "Could not delete map file");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(map = %self.name, deleted, "Deleted file group");
                Ok(deleted)
            }
        }
    }

    /// Remove orphaned temporary files of this map (best effort)
    pub fn delete_stale_temp_files(&self) -> Result<usize> {
        TempFile::delete_stale(&self.dir, &self.name)
    }
}
