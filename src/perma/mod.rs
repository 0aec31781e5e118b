//! Perma Module
//!
//! Handles on a persisted map for application code.
//!
//! - `ReadOnlyPerma`: loads a map and follows another process's writes
//! - `WritablePerma`: owns a live map and persists it as full/delta files

mod read_only;
mod writable;

pub use read_only::ReadOnlyPerma;
pub use writable::WritablePerma;
