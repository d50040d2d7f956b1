//! Default binary codec backed by bincode.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Codec;
use crate::{Error, Result};

/// Compact binary codec for any serde-serializable item type.
///
/// This is the default codec for the networked backend. Encoding uses
/// bincode's standard configuration, so payloads are not self-describing and
/// both ends of a queue must agree on the item type.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Create a new bincode codec
    pub fn new() -> Self {
        Self
    }
}

impl<T> Codec<T> for BincodeCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(Error::serialization)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(value, _)| value)
            .map_err(Error::serialization)
    }
}
