//! File Module
//!
//! Naming, discovery and atomic publishing of map files.
//!
//! ## Directory Layout (per logical map `name`)
//! ```text
//! {dir}/
//!   ├── name-F1.perma            superseded full file
//!   ├── name-F2.perma            current full file
//!   ├── name-F2-D1.perma         delta 1 on F2
//!   ├── name-F2-D2.perma         delta 2 on F2
//!   └── name-3f9c....perma.temp  write in progress (or orphan of a crash)
//! ```

mod group;
mod pattern;
mod perma_file;
mod temp;

pub use group::FileGroup;
pub use pattern::validate_name;
pub use perma_file::PermaFile;
pub use temp::TempFile;
