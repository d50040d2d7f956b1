//! JSON codec for human-readable payloads.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Codec;
use crate::{Error, Result};

/// JSON codec for any serde-serializable item type.
///
/// Larger on the wire than [`BincodeCodec`], but payloads can be read and
/// produced by non-Rust processes sharing the queue.
///
/// [`BincodeCodec`]: crate::BincodeCodec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self
    }
}

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(Error::serialization)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(Error::serialization)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Notification {
        recipient: String,
        retries: u8,
    }

    #[test]
    fn test_round_trip() {
        let codec = JsonCodec::new();
        let item = Notification {
            recipient: "ops@example.com".to_string(),
            retries: 2,
        };

        let bytes = codec.encode(&item).unwrap();
        let decoded: Notification = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn test_accepts_external_payloads() {
        let codec = JsonCodec::new();
        let payload = br#"{"recipient":"oncall@example.com","retries":0}"#;

        let decoded: Notification = codec.decode(payload).unwrap();
        assert_eq!(decoded.recipient, "oncall@example.com");
        assert_eq!(decoded.retries, 0);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = JsonCodec::new();
        let result: Result<Notification> = codec.decode(b"not json");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
