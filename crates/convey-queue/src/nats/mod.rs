//! Networked queue backend built on NATS JetStream.
//!
//! Each named queue maps onto a work-queue stream on the server, so items
//! survive process restarts and several processes can produce into and
//! consume from the same queue. Connections are pooled: every operation
//! borrows a dialed session for its duration and returns it afterwards.

mod nats_backend;
mod nats_config;
mod session;
mod session_pool;

use deadpool::managed::{Object, Pool};
pub use nats_backend::NatsBackend;
pub use nats_config::NatsQueueConfig;
pub use session::QueueSession;
pub use session_pool::{PoolStatus, SessionManager};

/// Type alias for the pool of dialed queue sessions.
pub type SessionPool = Pool<SessionManager>;

/// Type alias for a session borrowed from the pool.
///
/// Dropping the object returns the session to the pool.
pub type PooledSession = Object<SessionManager>;
