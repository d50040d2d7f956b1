#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for queue server connection operations.
///
/// Use this target for logging session establishment, connectivity probes, and connection errors.
pub const TRACING_TARGET_CONNECTION: &str = "convey_queue::connection";

/// Tracing target for session pool operations.
///
/// Use this target for logging session borrows, recycling, and pool-level errors.
pub const TRACING_TARGET_POOL: &str = "convey_queue::pool";

/// Tracing target for networked queue operations.
///
/// Use this target for logging puts, gets, queue removal, and stream or consumer errors.
pub const TRACING_TARGET_QUEUE: &str = "convey_queue::queue";

/// Tracing target for in-process queue operations.
///
/// Use this target for logging channel creation, removal, and channel-level errors.
pub const TRACING_TARGET_CHANNEL: &str = "convey_queue::channel";

mod backend;
mod channel;
mod codec;
mod error;
mod nats;

// Re-export async_nats types needed by consumers
pub use async_nats::jetstream;
pub use backend::QueueBackend;
pub use channel::ChannelBackend;
pub use codec::{BincodeCodec, Codec, JsonCodec};
pub use error::{BoxError, Error, Result};
pub use nats::{
    NatsBackend, NatsQueueConfig, PoolStatus, PooledSession, QueueSession, SessionManager,
    SessionPool,
};
