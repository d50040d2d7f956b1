//! Pluggable serialization for queue items crossing the wire.
//!
//! The networked backend never inspects item bytes itself; everything goes
//! through a [`Codec`]. [`BincodeCodec`] is the default and produces a compact
//! binary encoding, while [`JsonCodec`] trades size for human-readable
//! payloads on the server.

mod bincode_codec;
mod json_codec;

pub use bincode_codec::BincodeCodec;
pub use json_codec::JsonCodec;

use crate::Result;

/// Strategy for turning queue items into payload bytes and back.
///
/// Implementations must be pure with respect to the value: `decode(encode(v))`
/// yields a value equal to `v` for every value the codec supports. The trait
/// is object safe so backends can hold an `Arc<dyn Codec<T>>` chosen at
/// construction time.
pub trait Codec<T>: Send + Sync {
    /// Serialize an item into payload bytes.
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize an item from payload bytes.
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}
