//! Map file header
//!
//! ```text
//! ┌───────────┬─────────────┬──────────┬──────────────┬──────────┐
//! │ Magic (4) │ Version (2) │ Kind (1) │ NameLen (2)  │ Name     │
//! ├───────────┴─────┬───────┴──────────┴┬─────────────┴─┬────────┴──┐
//! │ FullNumber (4)  │ DeltaNumber (4)   │ EntryCount (8) │ CRC32 (4) │
//! └─────────────────┴───────────────────┴────────────────┴───────────┘
//! ```
//!
//! All integers little endian; the CRC covers every preceding header byte.

use std::fmt;
use std::io::{self, Read, Write};

use bytes::{Buf, BufMut};

use crate::error::{PermaError, Result};
use crate::file::PermaFile;

/// Magic bytes identifying a PermaKV map file
pub(crate) const MAGIC: &[u8; 4] = b"PRMA";

/// Current header format version
pub(crate) const VERSION: u16 = 1;

/// Magic (4) + Version (2) + Kind (1) + NameLen (2)
const PREFIX_SIZE: usize = 9;

/// FullNumber (4) + DeltaNumber (4) + EntryCount (8) + CRC (4)
const SUFFIX_SIZE: usize = 20;

/// Whether a file holds a complete map or changes to its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Full,
    Delta,
}

impl FileKind {
    fn as_byte(self) -> u8 {
        match self {
            FileKind::Full => 0,
            FileKind::Delta => 1,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(FileKind::Full),
            1 => Some(FileKind::Delta),
            _ => None,
        }
    }
}

/// Header at the start of every full and delta file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    kind: FileKind,
    name: String,
    full_number: u32,
    delta_number: u32,
    entry_count: u64,
}

impl Header {
    pub fn new_full(name: impl Into<String>, full_number: u32, entry_count: u64) -> Self {
        Self {
            kind: FileKind::Full,
            name: name.into(),
            full_number,
            delta_number: 0,
            entry_count,
        }
    }

    /// Header of the delta directly following this file
    pub fn next_delta(&self, entry_count: u64) -> Self {
        Self {
            kind: FileKind::Delta,
            name: self.name.clone(),
            full_number: self.full_number,
            delta_number: self.delta_number + 1,
            entry_count,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_number(&self) -> u32 {
        self.full_number
    }

    pub fn delta_number(&self) -> u32 {
        self.delta_number
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    // =========================================================================
    // Validation
    // =========================================================================

    pub fn is_full_file(&self) -> bool {
        self.kind == FileKind::Full && self.delta_number == 0
    }

    /// Same map and full number, and exactly one delta after `previous`
    pub fn is_next_delta_file_of(&self, previous: &Header) -> bool {
        self.kind == FileKind::Delta
            && self.name == previous.name
            && self.full_number == previous.full_number
            && self.delta_number == previous.delta_number + 1
    }

    pub fn has_size(&self, count: u64) -> bool {
        self.entry_count == count
    }

    /// Whether this header belongs at `file`'s name
    pub fn matches_file(&self, file: &PermaFile) -> bool {
        self.name == file.name()
            && self.full_number == file.full_number()
            && self.delta_number == file.delta_number()
            && (self.kind == FileKind::Full) == file.is_full()
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    pub fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        let name = self.name.as_bytes();
        let name_len = u16::try_from(name.len()).map_err(|_| {
            PermaError::Config(format!("Map name is too long: {} bytes", name.len()))
        })?;

        let mut buf = Vec::with_capacity(PREFIX_SIZE + name.len() + SUFFIX_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u8(self.kind.as_byte());
        buf.put_u16_le(name_len);
        buf.put_slice(name);
        buf.put_u32_le(self.full_number);
        buf.put_u32_le(self.delta_number);
        buf.put_u64_le(self.entry_count);
        let crc = crc32fast::hash(&buf);
        buf.put_u32_le(crc);

        out.write_all(&buf)?;
        Ok(())
    }

    pub fn read_from(input: &mut dyn Read) -> Result<Self> {
        let mut prefix = [0u8; PREFIX_SIZE];
        read_header_bytes(input, &mut prefix)?;

        if &prefix[0..4] != MAGIC {
            return Err(PermaError::Corrupted(format!(
                "Invalid magic: expected PRMA, got {:?}",
                &prefix[0..4]
            )));
        }

        let mut fields = &prefix[4..];
        let version = fields.get_u16_le();
        if version != VERSION {
            return Err(PermaError::Corrupted(format!(
                "Unsupported header version: {}",
                version
            )));
        }
        let kind_byte = fields.get_u8();
        let name_len = fields.get_u16_le() as usize;

        let mut rest = vec![0u8; name_len + SUFFIX_SIZE];
        read_header_bytes(input, &mut rest)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&prefix);
        hasher.update(&rest[..rest.len() - 4]);
        let computed_crc = hasher.finalize();

        let name = String::from_utf8(rest[..name_len].to_vec())
            .map_err(|_| PermaError::Corrupted("Map name in header is not UTF-8".to_string()))?;
        let mut fields = &rest[name_len..];
        let full_number = fields.get_u32_le();
        let delta_number = fields.get_u32_le();
        let entry_count = fields.get_u64_le();
        let stored_crc = fields.get_u32_le();

        if stored_crc != computed_crc {
            return Err(PermaError::Corrupted(format!(
                "Header checksum mismatch: stored {:08x}, computed {:08x}",
                stored_crc, computed_crc
            )));
        }

        let kind = FileKind::from_byte(kind_byte).ok_or_else(|| {
            PermaError::Corrupted(format!("Unknown file kind: 0x{:02x}", kind_byte))
        })?;

        Ok(Self {
            kind,
            name,
            full_number,
            delta_number,
            entry_count,
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header{{kind={:?}, name={}, full={}, delta={}, entries={}}}",
            self.kind, self.name, self.full_number, self.delta_number, self.entry_count
        )
    }
}

fn read_header_bytes(input: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => PermaError::Corrupted("Truncated header".to_string()),
        _ => PermaError::Io(e),
    })
}
