//! Serde-backed codec using bincode

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PermaError, Result};

use super::Codec;

/// Encodes any serde type with bincode
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for BincodeCodec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| PermaError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| PermaError::Codec(e.to_string()))
    }
}
