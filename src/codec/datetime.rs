//! Date-time codec
//!
//! Layout: unix seconds (i64) | subsecond nanos (u32) | UTC offset seconds (i32),
//! all little endian, 16 bytes total.

use bytes::{Buf, BufMut};
use chrono::{DateTime, FixedOffset};

use crate::error::{PermaError, Result};

use super::Codec;

const ENCODED_LEN: usize = 16;

/// Timestamps with their UTC offset
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeCodec;

impl Codec<DateTime<FixedOffset>> for DateTimeCodec {
    fn encode(&self, value: &DateTime<FixedOffset>) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(ENCODED_LEN);
        buf.put_i64_le(value.timestamp());
        buf.put_u32_le(value.timestamp_subsec_nanos());
        buf.put_i32_le(value.offset().local_minus_utc());
        Ok(buf)
    }

    fn decode(&self, mut bytes: &[u8]) -> Result<DateTime<FixedOffset>> {
        if bytes.len() != ENCODED_LEN {
            return Err(PermaError::Codec(format!(
                "Date-time needs {} bytes, got {}",
                ENCODED_LEN,
                bytes.len()
            )));
        }
        let secs = bytes.get_i64_le();
        let nanos = bytes.get_u32_le();
        let offset_secs = bytes.get_i32_le();

        let offset = FixedOffset::east_opt(offset_secs)
            .ok_or_else(|| PermaError::Codec(format!("Invalid UTC offset: {}s", offset_secs)))?;
        let utc = DateTime::from_timestamp(secs, nanos)
            .ok_or_else(|| PermaError::Codec(format!("Timestamp out of range: {}s", secs)))?;
        Ok(utc.with_timezone(&offset))
    }
}
