//! Queue backend backed by NATS JetStream work-queue streams.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, trace, warn};

use super::session::queue_subject;
use super::{NatsQueueConfig, PoolStatus, PooledSession, SessionPool, session_pool};
use crate::{
    BincodeCodec, Codec, Error, QueueBackend, Result, TRACING_TARGET_CONNECTION,
    TRACING_TARGET_POOL, TRACING_TARGET_QUEUE,
};

/// Queue backend that keeps every queue on a NATS JetStream server.
///
/// Each queue is backed by a work-queue stream created on first use, so items
/// survive process restarts and any number of processes can produce into and
/// consume from the same queue. Items pass through the backend's [`Codec`];
/// the compact binary [`BincodeCodec`] is the default.
///
/// Every operation borrows a dialed session from an internal pool for its
/// duration. Sessions are dialed lazily, reused across operations, and
/// replaced transparently when their connection drops. Cloning the backend is
/// cheap and clones share the pool.
///
/// # Blocking behavior
///
/// [`get`] reserves items in server-side windows: it asks the server for one
/// item and waits up to the configured reservation window for an answer. An
/// empty window is not an error; the backend silently starts the next window
/// and keeps the caller blocked until an item arrives. A received item is
/// acknowledged (and thereby deleted from the queue) only after it decodes
/// successfully; items that fail to decode or acknowledge are redelivered by
/// the server once their redelivery window lapses.
///
/// [`get`]: QueueBackend::get
pub struct NatsBackend<T> {
    pool: SessionPool,
    codec: Arc<dyn Codec<T>>,
    config: NatsQueueConfig,
}

impl<T> NatsBackend<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a backend for the given server URL with the default codec.
    ///
    /// The session pool dials lazily; this does not touch the network.
    /// Use [`verify_connectivity`](NatsBackend::verify_connectivity) to fail
    /// fast on an unreachable server.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_config(NatsQueueConfig::new(url))
    }

    /// Create a backend from a full configuration with the default codec.
    #[instrument(skip(config), target = TRACING_TARGET_POOL, fields(url = %config.url()))]
    pub fn with_config(config: NatsQueueConfig) -> Result<Self> {
        config.validate().map_err(Error::invalid_config)?;

        info!(
            target: TRACING_TARGET_POOL,
            url = %config.url(),
            client_name = %config.client_name(),
            "Initializing queue backend"
        );
        let pool = session_pool::build_session_pool(&config)?;

        Ok(Self {
            pool,
            codec: Arc::new(BincodeCodec::new()),
            config,
        })
    }
}

impl<T> NatsBackend<T>
where
    T: Send + Sync + 'static,
{
    /// Replace the codec used for items on the wire.
    ///
    /// Swap codecs before the backend handles any items; both ends of a queue
    /// must use the same codec.
    #[must_use]
    pub fn with_codec(mut self, codec: impl Codec<T> + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Gets the configuration used by this backend.
    #[inline]
    pub fn config(&self) -> &NatsQueueConfig {
        &self.config
    }

    /// Gets the current session pool status and statistics.
    ///
    /// This method provides insight into the pool state for monitoring and
    /// debugging purposes.
    #[inline]
    pub fn pool_status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    /// Borrow a session and perform a round trip to the server.
    ///
    /// Returns the measured round-trip time.
    #[instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn verify_connectivity(&self) -> Result<Duration> {
        let session = self.borrow_session().await?;
        let rtt = session.ping().await?;

        info!(
            target: TRACING_TARGET_CONNECTION,
            rtt_ms = rtt.as_millis(),
            "Queue server connectivity verified"
        );
        Ok(rtt)
    }

    /// Gets a session from the pool.
    ///
    /// This method will wait for an available session, bounded by the
    /// configured wait timeout if one is set.
    async fn borrow_session(&self) -> Result<PooledSession> {
        debug!(target: TRACING_TARGET_POOL, "Borrowing session from pool");

        let start = std::time::Instant::now();
        let session = self.pool.get().await.map_err(|e| {
            error!(
                target: TRACING_TARGET_POOL,
                error = %e,
                elapsed = ?start.elapsed(),
                "Failed to borrow session from pool"
            );
            Error::from(e)
        })?;

        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(100) {
            warn!(
                target: TRACING_TARGET_POOL,
                elapsed = ?elapsed,
                "Session borrow took longer than expected"
            );
        }

        Ok(session)
    }
}

// Manual impl: clones share the pool and must not require T: Clone.
impl<T> Clone for NatsBackend<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            codec: Arc::clone(&self.codec),
            config: self.config.clone(),
        }
    }
}

impl<T> fmt::Debug for NatsBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.pool.status();
        f.debug_struct("NatsBackend")
            .field("url", &self.config.url())
            .field("pool_max_sessions", &status.max_size)
            .field("pool_current_size", &status.size)
            .field("pool_available", &status.available)
            .finish()
    }
}

#[async_trait]
impl<T> QueueBackend<T> for NatsBackend<T>
where
    T: Send + Sync + 'static,
{
    #[instrument(skip(self, value), target = TRACING_TARGET_QUEUE)]
    async fn put(&self, queue_name: &str, value: T) -> Result<()> {
        let payload = self.codec.encode(&value)?;
        let payload_size = payload.len();

        let session = self.borrow_session().await?;
        session.ensure_stream(queue_name).await?;

        let subject = queue_subject(queue_name);
        session
            .jetstream()
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| Error::delivery_failed(&subject, e.to_string()))?
            .await
            .map_err(|e| Error::operation("queue_put", e.to_string()))?;

        debug!(
            target: TRACING_TARGET_QUEUE,
            queue = %queue_name,
            subject = %subject,
            payload_size = payload_size,
            "Enqueued item"
        );
        Ok(())
    }

    #[instrument(skip(self), target = TRACING_TARGET_QUEUE)]
    async fn get(&self, queue_name: &str) -> Result<T> {
        let session = self.borrow_session().await?;
        let consumer = session
            .queue_consumer(queue_name, self.config.time_to_run())
            .await?;

        loop {
            // Ask the server for one item, parking the request for up to
            // one reservation window. This must stay `batch`: `fetch` is
            // the no-wait variant and answers an empty queue immediately.
            let mut batch = consumer
                .batch()
                .max_messages(1)
                .expires(self.config.reserve_timeout())
                .messages()
                .await
                .map_err(|e| Error::operation("queue_reserve", e.to_string()))?;

            match batch.next().await {
                Some(Ok(message)) => {
                    // Decode before acknowledging: an item we cannot decode
                    // stays reserved and the server redelivers it later.
                    let value = self.codec.decode(&message.payload)?;

                    message
                        .double_ack()
                        .await
                        .map_err(|e| Error::ack_error(queue_name, e.to_string()))?;

                    debug!(
                        target: TRACING_TARGET_QUEUE,
                        queue = %queue_name,
                        payload_size = message.payload.len(),
                        "Dequeued item"
                    );
                    return Ok(value);
                }
                Some(Err(e)) => {
                    return Err(Error::operation("queue_reserve", e.to_string()));
                }
                None => {
                    // Reservation window lapsed with nothing to deliver;
                    // start the next one.
                    trace!(
                        target: TRACING_TARGET_QUEUE,
                        queue = %queue_name,
                        "Reservation window lapsed, retrying"
                    );
                }
            }
        }
    }

    #[instrument(skip(self), target = TRACING_TARGET_QUEUE)]
    async fn remove_queue(&self, queue_name: &str) -> Result<()> {
        let session = self.borrow_session().await?;
        let deleted = session.delete_queue_stream(queue_name).await?;

        debug!(
            target: TRACING_TARGET_QUEUE,
            queue = %queue_name,
            deleted = deleted,
            "Removed queue"
        );
        Ok(())
    }
}
