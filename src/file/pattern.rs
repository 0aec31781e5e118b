//! File name rendering and parsing
//!
//! ```text
//! {name}-F{n}.perma{ext}          full file n
//! {name}-F{n}-D{m}.perma{ext}     delta m on top of full file n
//! {name}-{unique}.perma.temp      temporary file of an in-flight write
//! ```
//!
//! Numbers are rendered without leading zeros and start at 1.

use crate::compression::Compression;
use crate::error::{PermaError, Result};

const EXTENSION: &str = ".perma";
const TEMP_EXTENSION: &str = ".perma.temp";

/// Length of the hex suffix in temporary file names
pub(crate) const TEMP_UNIQUE_LEN: usize = 16;

/// Longest logical name that fits into a header
pub(crate) const MAX_NAME_LEN: usize = 255;

/// Numbers and compression parsed from a map file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedFileName {
    pub full_number: u32,
    pub delta_number: u32,
    pub compression: Compression,
}

/// Check that a logical name can be used in file names and headers
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PermaError::Config("Map name must not be empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(PermaError::Config(format!(
            "Map name is {} bytes long (max {})",
            name.len(),
            MAX_NAME_LEN
        )));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(PermaError::Config(format!(
            "Map name {:?} must not contain path separators",
            name
        )));
    }
    Ok(())
}

pub(crate) fn file_name(
    name: &str,
    full_number: u32,
    delta_number: u32,
    compression: Compression,
) -> String {
    if delta_number == 0 {
        format!("{}-F{}{}{}", name, full_number, EXTENSION, compression.extension())
    } else {
        format!(
            "{}-F{}-D{}{}{}",
            name,
            full_number,
            delta_number,
            EXTENSION,
            compression.extension()
        )
    }
}

/// Parse a full or delta file name belonging to `name`
/// "orders-F3-D2.perma.zst" → Some(F3, D2, Zstd)
pub(crate) fn parse_file_name(name: &str, file_name: &str) -> Option<ParsedFileName> {
    let rest = file_name.strip_prefix(name)?.strip_prefix("-F")?;
    let (numbers, ext) = rest.split_once(EXTENSION)?;
    let compression = Compression::from_extension(ext)?;

    let (full_number, delta_number) = match numbers.split_once("-D") {
        Some((full, delta)) => (parse_number(full)?, parse_number(delta)?),
        None => (parse_number(numbers)?, 0),
    };
    if full_number == 0 || (numbers.contains("-D") && delta_number == 0) {
        return None;
    }

    Some(ParsedFileName {
        full_number,
        delta_number,
        compression,
    })
}

pub(crate) fn temp_file_name(name: &str, unique: u64) -> String {
    format!("{}-{:016x}{}", name, unique, TEMP_EXTENSION)
}

/// Whether `file_name` is a temporary file written for `name`
pub(crate) fn is_temp_file_of(name: &str, file_name: &str) -> bool {
    let unique = match file_name
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(TEMP_EXTENSION))
    {
        Some(unique) => unique,
        None => return false,
    };
    unique.len() == TEMP_UNIQUE_LEN
        && unique
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // "F01" would not round-trip through file_name
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}
