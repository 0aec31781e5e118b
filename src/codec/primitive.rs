//! Codecs for strings, raw bytes and integers

use crate::error::{PermaError, Result};

use super::Codec;

/// UTF-8 strings
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| PermaError::Codec(format!("Invalid UTF-8 string: {}", e)))
    }
}

/// Raw bytes, stored as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Big-endian u64 (byte order matches numeric order)
#[derive(Debug, Clone, Copy, Default)]
pub struct U64Codec;

impl Codec<u64> for U64Codec {
    fn encode(&self, value: &u64) -> Result<Vec<u8>> {
        Ok(value.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<u64> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| PermaError::Codec(format!("u64 needs 8 bytes, got {}", bytes.len())))?;
        Ok(u64::from_be_bytes(raw))
    }
}

/// Big-endian i64
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Codec;

impl Codec<i64> for I64Codec {
    fn encode(&self, value: &i64) -> Result<Vec<u8>> {
        Ok(value.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<i64> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| PermaError::Codec(format!("i64 needs 8 bytes, got {}", bytes.len())))?;
        Ok(i64::from_be_bytes(raw))
    }
}
