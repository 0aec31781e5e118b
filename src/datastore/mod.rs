//! Datastore Module
//!
//! Binary format of full and delta map files.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header                                                  │
//! │   Magic | Version | Kind | Name | Full# | Delta# |      │
//! │   EntryCount | CRC32                                    │
//! ├─────────────────────────────────────────────────────────┤
//! │ Upsert records (key order)                              │
//! │   [KeyLen: u32][Key][0x01][ValLen: u32][Value]          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Tombstone records (key order)                           │
//! │   [KeyLen: u32][Key][0x00]                              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! No footer or index: readers consume records until end of stream and
//! compare the count against the header.

mod header;
mod map_data;
mod record;

pub use header::{FileKind, Header};
pub use map_data::MapData;
pub use record::EntryRecord;
