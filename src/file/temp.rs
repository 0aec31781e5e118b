//! Temporary files
//!
//! Every map file is written in full to a uniquely named temporary file in
//! the target directory and then renamed onto its final name. A crash before
//! the rename leaves only a `*.perma.temp` orphan, which the next writer of
//! the same map removes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::compression::Compression;
use crate::error::{PermaError, Result};

use super::pattern;

/// A not yet published file
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Pick a fresh temporary file name for `name` in `dir`
    pub fn new(dir: &Path, name: &str) -> Self {
        let unique: u64 = rand::random();
        Self {
            path: dir.join(pattern::temp_file_name(name, unique)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file and write it through the compression transform
    ///
    /// The file is flushed (and synced if `sync` is set) and closed before
    /// this returns. If `f` or any write fails the file is removed again.
    pub fn write_with<R>(
        &self,
        compression: Compression,
        sync: bool,
        f: impl FnOnce(&mut dyn Write) -> Result<R>,
    ) -> Result<R> {
        let result = self.write_inner(compression, sync, f);
        if result.is_err() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove temp file after failed write");
            }
        }
        result
    }

    fn write_inner<R>(
        &self,
        compression: Compression,
        sync: bool,
        f: impl FnOnce(&mut dyn Write) -> Result<R>,
    ) -> Result<R> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;

        let mut writer = compression.compress(BufWriter::new(file))?;
        let result = f(&mut writer)?;

        let file: File = writer
            .finish()?
            .into_inner()
            .map_err(|e| PermaError::Io(e.into_error()))?;
        if sync {
            file.sync_all()?;
        }
        Ok(result)
    }

    /// Atomically rename the temporary file onto `target`
    ///
    /// On failure the target is untouched and the temporary file stays
    /// behind for [`TempFile::delete_stale`].
    pub fn publish(self, target: &Path, sync: bool) -> Result<()> {
        fs::rename(&self.path, target).map_err(|source| PermaError::FileRename {
            from: self.path.clone(),
            to: target.to_path_buf(),
            source,
        })?;

        if sync {
            sync_parent_dir(target);
        }
        Ok(())
    }

    /// Remove leftover temporary files of `name` in `dir`
    ///
    /// Best effort: files that cannot be removed are logged and skipped.
    /// Returns the number of removed files.
    pub fn delete_stale(dir: &Path, name: &str) -> Result<usize> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !pattern::is_temp_file_of(name, file_name) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!(file = file_name, "Deleted stale temp file");
                    removed += 1;
                }
                Err(e) => {
                    warn!(file = file_name, error = %e, "Could not delete stale temp file");
                }
            }
        }
        Ok(removed)
    }
}

/// fsync the directory holding `path` so the rename itself is durable
/// The rename already happened, so a failed directory sync is only logged
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    let synced = File::open(parent).and_then(|dir| dir.sync_all());
    if let Err(e) = synced {
        warn!(dir = %parent.display(), error = %e, "Could not sync directory after publishing file");
    }
}
