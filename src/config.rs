//! Configuration for PermaKV maps
//!
//! Per-map options with sensible defaults.

use crate::compression::Compression;

/// Options applied to one logical map
#[derive(Debug, Clone)]
pub struct Options {
    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Compression of newly written full files.
    /// Delta files always inherit the compression of their full file.
    pub compression: Compression,

    /// fsync the temporary file before publishing it, and the directory after
    pub sync_writes: bool,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Number of delta files after which `WritablePerma::persist` writes a
    /// new full file instead of another delta. `None` never compacts.
    pub compact_after_deltas: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            sync_writes: true,
            compact_after_deltas: Some(64),
        }
    }
}

impl Options {
    /// Create a new options builder
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Compression to use for the next full file
    pub fn compression(&self) -> Compression {
        self.compression
    }
}

/// Builder for Options
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Set the compression for new full files
    pub fn compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    /// Enable or disable fsync on publish
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.options.sync_writes = sync;
        self
    }

    /// Set the delta count threshold for automatic compaction
    pub fn compact_after_deltas(mut self, deltas: Option<usize>) -> Self {
        self.options.compact_after_deltas = deltas;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}
