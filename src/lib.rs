//! # PermaKV
//!
//! An embedded persistent key-value map:
//! - Full snapshot files plus append-only delta files
//! - Header chain checks on every load
//! - Atomic publishing through temp file + rename
//! - Optional zstd stream compression
//! - Pluggable key/value codecs
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              ReadOnlyPerma / WritablePerma                   │
//! │             (application-facing map handles)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     MapSnapshot                              │
//! │     New ──▶ Persisted (write_next / refresh / compact)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  FileGroup  │          │   MapData   │
//!   │ (F + D1..Dn)│          │(header+recs)│
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  PermaFile  │◀─────────│   Codecs    │
//!   │ (temp+rename│          │ Compression │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod compression;
pub mod file;
pub mod datastore;
pub mod snapshot;
pub mod perma;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PermaError, Result};
pub use config::Options;
pub use codec::{Codec, Codecs};
pub use compression::Compression;
pub use file::{FileGroup, PermaFile};
pub use datastore::{Header, MapData};
pub use snapshot::MapSnapshot;
pub use perma::{ReadOnlyPerma, WritablePerma};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PermaKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
