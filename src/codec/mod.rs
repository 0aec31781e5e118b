//! Codec Module
//!
//! Converts typed keys and values to and from byte sequences.
//!
//! ## Responsibilities
//! - One codec instance for keys and one for values per logical map
//! - Codecs produce raw bytes; the record format adds the length prefix,
//!   so variable-length encodings stay self-delimiting inside a file
//!
//! ## Provided Codecs
//! - [`StringCodec`], [`BytesCodec`], [`U64Codec`], [`I64Codec`]
//! - [`VecCodec`] for collections of any codec's type
//! - [`DateTimeCodec`] for `chrono::DateTime<FixedOffset>`
//! - [`BincodeCodec`] for any serde type

mod collection;
mod datetime;
mod primitive;
mod serialized;

use std::sync::Arc;

use crate::error::Result;

pub use collection::VecCodec;
pub use datetime::DateTimeCodec;
pub use primitive::{BytesCodec, I64Codec, StringCodec, U64Codec};
pub use serialized::BincodeCodec;

/// Encodes a single key or value of type `T`
pub trait Codec<T>: Send + Sync {
    /// Convert a value to bytes
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Convert bytes produced by `encode` back to a value
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// Key and value codecs of one logical map
pub struct Codecs<K, V> {
    pub key: Arc<dyn Codec<K>>,
    pub value: Arc<dyn Codec<V>>,
}

impl<K, V> Codecs<K, V> {
    pub fn new(key: impl Codec<K> + 'static, value: impl Codec<V> + 'static) -> Self {
        Self {
            key: Arc::new(key),
            value: Arc::new(value),
        }
    }
}

impl Codecs<String, String> {
    /// String keys and string values
    pub fn strings() -> Self {
        Self::new(StringCodec, StringCodec)
    }
}

impl<K, V> Clone for Codecs<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            value: Arc::clone(&self.value),
        }
    }
}
