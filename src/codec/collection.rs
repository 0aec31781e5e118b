//! Collection codec
//!
//! ```text
//! ┌───────────┬──────────────┬────────┬──────────────┬────────┬─────┐
//! │ Count (4) │ ItemLen (4)  │ Item   │ ItemLen (4)  │ Item   │ ... │
//! └───────────┴──────────────┴────────┴──────────────┴────────┴─────┘
//! ```

use std::marker::PhantomData;

use bytes::{Buf, BufMut};

use crate::error::{PermaError, Result};

use super::Codec;

/// Encodes a `Vec<T>` item by item with an inner codec
pub struct VecCodec<C, T> {
    item: C,
    _marker: PhantomData<fn() -> T>,
}

impl<C: Codec<T>, T> VecCodec<C, T> {
    pub fn new(item: C) -> Self {
        Self {
            item,
            _marker: PhantomData,
        }
    }
}

impl<C: Codec<T>, T> Codec<Vec<T>> for VecCodec<C, T> {
    fn encode(&self, value: &Vec<T>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.put_u32_le(checked_len(value.len(), "item count")?);
        for item in value {
            let bytes = self.item.encode(item)?;
            buf.put_u32_le(checked_len(bytes.len(), "item length")?);
            buf.put_slice(&bytes);
        }
        Ok(buf)
    }

    fn decode(&self, mut bytes: &[u8]) -> Result<Vec<T>> {
        if bytes.remaining() < 4 {
            return Err(PermaError::Codec("Collection: missing item count".to_string()));
        }
        let count = bytes.get_u32_le() as usize;

        let mut items = Vec::with_capacity(count.min(bytes.remaining() / 4));
        for i in 0..count {
            if bytes.remaining() < 4 {
                return Err(PermaError::Codec(format!(
                    "Collection: missing length of item {} of {}",
                    i, count
                )));
            }
            let len = bytes.get_u32_le() as usize;
            if bytes.remaining() < len {
                return Err(PermaError::Codec(format!(
                    "Collection: item {} truncated (expected {}, got {})",
                    i,
                    len,
                    bytes.remaining()
                )));
            }
            items.push(self.item.decode(&bytes[..len])?);
            bytes.advance(len);
        }

        if bytes.has_remaining() {
            return Err(PermaError::Codec(format!(
                "Collection: {} trailing bytes",
                bytes.remaining()
            )));
        }
        Ok(items)
    }
}

fn checked_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| PermaError::Codec(format!("Collection: {} {} does not fit in u32", what, len)))
}
