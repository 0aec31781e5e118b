//! Entry records
//!
//! ```text
//! Upsert:    [KeyLen: u32][Key][0x01][ValLen: u32][Value]
//! Tombstone: [KeyLen: u32][Key][0x00]
//! ```
//!
//! Records follow the header back to back until end of stream. A stream
//! that ends inside a record is corrupt.

use std::io::{self, Read, Write};

use crate::codec::Codecs;
use crate::error::{PermaError, Result};

const TAG_TOMBSTONE: u8 = 0x00;
const TAG_UPSERT: u8 = 0x01;

/// One upsert or tombstone as stored in a file
#[derive(Debug, Clone, PartialEq)]
pub enum EntryRecord<K, V> {
    Upsert(K, V),
    Tombstone(K),
}

impl<K, V> EntryRecord<K, V> {
    pub fn write_upsert(
        out: &mut dyn Write,
        key: &K,
        value: &V,
        codecs: &Codecs<K, V>,
    ) -> Result<()> {
        write_with_length(out, &codecs.key.encode(key)?)?;
        out.write_all(&[TAG_UPSERT])?;
        write_with_length(out, &codecs.value.encode(value)?)?;
        Ok(())
    }

    pub fn write_tombstone(out: &mut dyn Write, key: &K, codecs: &Codecs<K, V>) -> Result<()> {
        write_with_length(out, &codecs.key.encode(key)?)?;
        out.write_all(&[TAG_TOMBSTONE])?;
        Ok(())
    }

    /// Read the next record; `None` at a clean end of stream
    pub fn read_from(input: &mut dyn Read, codecs: &Codecs<K, V>) -> Result<Option<Self>> {
        let mut len_bytes = [0u8; 4];
        if !read_or_eof(input, &mut len_bytes)? {
            return Ok(None);
        }
        let key_bytes = read_bytes(input, u32::from_le_bytes(len_bytes))?;
        let key = codecs.key.decode(&key_bytes)?;

        let mut tag = [0u8; 1];
        read_record_bytes(input, &mut tag)?;
        match tag[0] {
            TAG_TOMBSTONE => Ok(Some(EntryRecord::Tombstone(key))),
            TAG_UPSERT => {
                read_record_bytes(input, &mut len_bytes)?;
                let value_bytes = read_bytes(input, u32::from_le_bytes(len_bytes))?;
                let value = codecs.value.decode(&value_bytes)?;
                Ok(Some(EntryRecord::Upsert(key, value)))
            }
            other => Err(PermaError::Corrupted(format!(
                "Unknown record tag: 0x{:02x}",
                other
            ))),
        }
    }
}

fn write_with_length(out: &mut dyn Write, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        PermaError::Codec(format!("Encoded key or value too large: {} bytes", bytes.len()))
    })?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(bytes)?;
    Ok(())
}

/// Fill `buf` completely; `false` if the stream ended before the first byte
fn read_or_eof(input: &mut dyn Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        n => Err(PermaError::Corrupted(format!(
            "Partial record at end of file ({} of {} length bytes)",
            n,
            buf.len()
        ))),
    }
}

fn read_record_bytes(input: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            PermaError::Corrupted("Partial record at end of file".to_string())
        }
        _ => PermaError::Io(e),
    })
}

/// Read a length-prefixed payload without trusting the length for allocation
fn read_bytes(input: &mut dyn Read, len: u32) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    Read::take(&mut *input, u64::from(len)).read_to_end(&mut bytes)?;
    if bytes.len() != len as usize {
        return Err(PermaError::Corrupted(format!(
            "Partial record at end of file (expected {} bytes, got {})",
            len,
            bytes.len()
        )));
    }
    Ok(bytes)
}
