//! Session pooling for the networked queue backend.
//!
//! Dialing a session is expensive and a session must never serve two
//! operations at once, so the backend keeps dialed sessions in a managed
//! pool. Borrowing hands an operation exclusive ownership for its duration;
//! dropping the borrowed object returns the session. Sessions that lost
//! their connection are rejected on recycle and replaced with a fresh dial.

use deadpool::managed::{Manager, Metrics, Pool, RecycleError, RecycleResult};
use tracing::{debug, error};

use super::{NatsQueueConfig, QueueSession, SessionPool};
use crate::{Error, Result, TRACING_TARGET_POOL};

/// Pool manager that dials queue sessions on demand.
#[derive(Debug)]
pub struct SessionManager {
    config: NatsQueueConfig,
}

impl SessionManager {
    /// Create a new manager dialing with the given configuration.
    pub fn new(config: NatsQueueConfig) -> Self {
        Self { config }
    }
}

impl Manager for SessionManager {
    type Type = QueueSession;
    type Error = Error;

    async fn create(&self) -> Result<QueueSession> {
        QueueSession::connect(&self.config).await
    }

    async fn recycle(&self, session: &mut QueueSession, _: &Metrics) -> RecycleResult<Error> {
        if session.is_connected() {
            Ok(())
        } else {
            debug!(
                target: TRACING_TARGET_POOL,
                "Discarding disconnected session from pool"
            );
            Err(RecycleError::Message("session disconnected".into()))
        }
    }
}

/// Build the session pool for the given configuration.
///
/// The pool dials lazily: no session exists until the first borrow.
pub(crate) fn build_session_pool(config: &NatsQueueConfig) -> Result<SessionPool> {
    let manager = SessionManager::new(config.clone());

    Pool::builder(manager)
        .max_size(config.max_sessions())
        .wait_timeout(config.wait_timeout())
        .create_timeout(Some(config.connect_timeout()))
        .recycle_timeout(config.idle_timeout())
        .runtime(deadpool::Runtime::Tokio1)
        .build()
        .map_err(|e| {
            error!(target: TRACING_TARGET_POOL, error = %e, "Failed to build session pool");
            Error::operation("pool_build", e.to_string())
        })
}

/// Session pool status information.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    /// Maximum number of sessions in the pool
    pub max_size: usize,
    /// Current number of sessions in the pool
    pub size: usize,
    /// Number of available sessions
    pub available: usize,
    /// Number of operations waiting for a session
    pub waiting: usize,
}

impl PoolStatus {
    /// Returns the utilization of the pool (0.0 to 1.0).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            (self.size - self.available) as f64 / self.max_size as f64
        }
    }

    /// Returns whether the pool is under pressure (high utilization or waiting operations).
    #[inline]
    pub fn is_under_pressure(&self) -> bool {
        self.waiting > 0 || self.utilization() > 0.8
    }
}
