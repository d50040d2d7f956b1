//! Queue backend backed by in-process bounded channels.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::{Error, QueueBackend, Result, TRACING_TARGET_CHANNEL};

// Default per-queue capacity
const DEFAULT_BUFFER: usize = 1000;

/// One named queue: a bounded channel with a shareable receiving half.
///
/// The receiver sits behind an async mutex so concurrent getters on the same
/// queue take turns instead of needing a single owner.
struct QueueChannel<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
}

impl<T> QueueChannel<T> {
    fn new(buffer: usize) -> Self {
        // A bounded channel needs at least one slot
        let (tx, rx) = mpsc::channel(buffer.max(1));
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

// Manual impl: cloning shares the channel and must not require T: Clone.
impl<T> Clone for QueueChannel<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Queue backend that keeps every queue in process memory.
///
/// Each queue is a bounded channel created on first use and addressed by
/// name. [`put`] blocks while the queue's buffer is full and [`get`] blocks
/// while it is empty, which makes this backend a drop-in stand-in for the
/// networked one in single-process deployments and in tests.
///
/// Cloning the backend is cheap and clones share the same queues, so one
/// instance can be handed to producer and consumer tasks alike.
///
/// # Removal and in-flight operations
///
/// [`remove_queue`] only unlinks the name from its channel. Operations that
/// already looked the queue up keep using the old channel: a blocked `get`
/// stays blocked and a blocked `put` delivers into the orphaned buffer. Only
/// operations that start after the removal see a fresh queue.
///
/// [`put`]: QueueBackend::put
/// [`get`]: QueueBackend::get
/// [`remove_queue`]: QueueBackend::remove_queue
pub struct ChannelBackend<T> {
    channels: Arc<Mutex<HashMap<String, QueueChannel<T>>>>,
    buffer: usize,
}

impl<T> ChannelBackend<T> {
    /// Create a new backend with the default per-queue capacity of 1000.
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Set the capacity used for queues created after this call.
    ///
    /// A zero capacity is coerced to one slot. Queues that already exist keep
    /// the capacity they were created with.
    #[must_use]
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Pre-create a queue with an explicit capacity.
    ///
    /// Useful when one queue needs a different buffer size than the backend
    /// default.
    #[must_use]
    pub fn with_queue(self, queue_name: impl Into<String>, capacity: usize) -> Self {
        self.lock_channels()
            .insert(queue_name.into(), QueueChannel::new(capacity));
        self
    }

    /// Pre-create several queues with the current default capacity.
    #[must_use]
    pub fn with_queues<I, S>(self, queue_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut channels = self.lock_channels();
            for name in queue_names {
                channels.insert(name.into(), QueueChannel::new(self.buffer));
            }
        }
        self
    }

    /// Returns the capacity used for newly created queues.
    #[inline]
    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Returns whether a queue currently exists.
    pub fn contains_queue(&self, queue_name: &str) -> bool {
        self.lock_channels().contains_key(queue_name)
    }

    /// Returns the names of all live queues, in no particular order.
    pub fn queue_names(&self) -> Vec<String> {
        self.lock_channels().keys().cloned().collect()
    }

    /// Look up the named queue, creating it on first use.
    fn channel(&self, queue_name: &str) -> QueueChannel<T> {
        let mut channels = self.lock_channels();
        if let Some(channel) = channels.get(queue_name) {
            return channel.clone();
        }

        debug!(
            target: TRACING_TARGET_CHANNEL,
            queue = %queue_name,
            capacity = self.buffer,
            "Creating queue channel"
        );
        let channel = QueueChannel::new(self.buffer);
        channels.insert(queue_name.to_string(), channel.clone());
        channel
    }

    // A poisoned map only means another thread panicked between lookup and
    // insert; the map itself is still coherent, so keep going.
    fn lock_channels(&self) -> MutexGuard<'_, HashMap<String, QueueChannel<T>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for ChannelBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impl: clones share the queue map and must not require T: Clone.
impl<T> Clone for ChannelBackend<T> {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            buffer: self.buffer,
        }
    }
}

impl<T> fmt::Debug for ChannelBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBackend")
            .field("buffer", &self.buffer)
            .field("queues", &self.lock_channels().len())
            .finish()
    }
}

#[async_trait]
impl<T> QueueBackend<T> for ChannelBackend<T>
where
    T: Send + 'static,
{
    #[instrument(skip(self, value), target = TRACING_TARGET_CHANNEL)]
    async fn put(&self, queue_name: &str, value: T) -> Result<()> {
        let channel = self.channel(queue_name);

        // Waits for a free slot while the queue is at capacity. The map lock
        // is already released, so other queues stay unaffected.
        channel
            .tx
            .send(value)
            .await
            .map_err(|_| Error::channel_closed(queue_name))
    }

    #[instrument(skip(self), target = TRACING_TARGET_CHANNEL)]
    async fn get(&self, queue_name: &str) -> Result<T> {
        let channel = self.channel(queue_name);

        let mut rx = channel.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| Error::channel_closed(queue_name))
    }

    #[instrument(skip(self), target = TRACING_TARGET_CHANNEL)]
    async fn remove_queue(&self, queue_name: &str) -> Result<()> {
        let removed = self.lock_channels().remove(queue_name).is_some();

        debug!(
            target: TRACING_TARGET_CHANNEL,
            queue = %queue_name,
            removed = removed,
            "Removed queue channel"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::*;

    const PROBE: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_fifo_order() {
        let backend = ChannelBackend::new();

        for i in 0..5u32 {
            backend.put("jobs", i).await.unwrap();
        }
        for i in 0..5u32 {
            assert_eq!(backend.get("jobs").await.unwrap(), i);
        }
    }

    #[tokio::test]
    async fn test_queues_are_isolated() {
        let backend = ChannelBackend::new();

        backend.put("alpha", "a").await.unwrap();
        backend.put("beta", "b").await.unwrap();

        assert_eq!(backend.get("beta").await.unwrap(), "b");
        assert_eq!(backend.get("alpha").await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_put_blocks_when_full() {
        let backend = ChannelBackend::new().with_buffer(1);

        backend.put("jobs", 1u32).await.unwrap();

        // Second put must park until the buffer drains.
        let blocked = timeout(PROBE, backend.put("jobs", 2)).await;
        assert!(blocked.is_err());

        let writer = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.put("jobs", 2).await })
        };

        assert_eq!(backend.get("jobs").await.unwrap(), 1);
        writer.await.unwrap().unwrap();
        assert_eq!(backend.get("jobs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_blocks_until_put() {
        let backend = ChannelBackend::new();

        let blocked = timeout(PROBE, backend.get("jobs")).await;
        assert!(blocked.is_err());

        let writer = {
            let backend = backend.clone();
            tokio::spawn(async move {
                sleep(PROBE).await;
                backend.put("jobs", 9u32).await
            })
        };

        assert_eq!(backend.get("jobs").await.unwrap(), 9);
        writer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_buffer_two_scenario() {
        let backend = ChannelBackend::new().with_buffer(2);

        // Both puts fit in the buffer without a consumer.
        timeout(PROBE, backend.put("jobs", 1u32))
            .await
            .expect("first put should not block")
            .unwrap();
        timeout(PROBE, backend.put("jobs", 2u32))
            .await
            .expect("second put should not block")
            .unwrap();

        assert_eq!(backend.get("jobs").await.unwrap(), 1);
        assert_eq!(backend.get("jobs").await.unwrap(), 2);

        // Queue drained: the next get parks until another put.
        let blocked = timeout(PROBE, backend.get("jobs")).await;
        assert!(blocked.is_err());

        backend.put("jobs", 3u32).await.unwrap();
        assert_eq!(backend.get("jobs").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_getters_receive_distinct_items() {
        let backend = ChannelBackend::new();

        backend.put("jobs", 1u32).await.unwrap();
        backend.put("jobs", 2u32).await.unwrap();

        let first = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.get("jobs").await })
        };
        let second = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.get("jobs").await })
        };

        let mut got = vec![
            first.await.unwrap().unwrap(),
            second.await.unwrap().unwrap(),
        ];
        got.sort_unstable();
        assert_eq!(got, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_remove_then_reput_starts_fresh() {
        let backend = ChannelBackend::new();

        backend.put("jobs", "stale").await.unwrap();
        backend.remove_queue("jobs").await.unwrap();
        assert!(!backend.contains_queue("jobs"));

        backend.put("jobs", "fresh").await.unwrap();
        assert_eq!(backend.get("jobs").await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_remove_queue_is_idempotent() {
        let backend: ChannelBackend<u32> = ChannelBackend::new();

        backend.remove_queue("never-created").await.unwrap();
        backend.remove_queue("never-created").await.unwrap();
    }

    #[tokio::test]
    async fn test_inflight_get_survives_removal_on_stale_channel() {
        let backend = ChannelBackend::new();

        // Parked getter holding the pre-removal channel.
        let stale_getter = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.get("jobs").await })
        };
        sleep(PROBE).await;

        backend.remove_queue("jobs").await.unwrap();
        backend.put("jobs", 5u32).await.unwrap();

        // The item went to the fresh channel; the stale getter stays parked.
        assert_eq!(backend.get("jobs").await.unwrap(), 5);
        assert!(!stale_getter.is_finished());
        stale_getter.abort();
    }

    #[tokio::test]
    async fn test_clones_share_queues() {
        let backend = ChannelBackend::new();
        let other = backend.clone();

        backend.put("shared", 11u32).await.unwrap();
        assert_eq!(other.get("shared").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_preseeded_queues() {
        let backend: ChannelBackend<u32> = ChannelBackend::new()
            .with_buffer(4)
            .with_queue("bulk", 1)
            .with_queues(["emails", "webhooks"]);

        assert!(backend.contains_queue("bulk"));
        assert!(backend.contains_queue("emails"));
        assert!(backend.contains_queue("webhooks"));

        let mut names = backend.queue_names();
        names.sort_unstable();
        assert_eq!(names, vec!["bulk", "emails", "webhooks"]);

        // The explicit capacity sticks: one item fits, the second blocks.
        backend.put("bulk", 1).await.unwrap();
        assert!(timeout(PROBE, backend.put("bulk", 2)).await.is_err());
    }

    #[test]
    fn test_buffer_accessor_and_default() {
        let backend: ChannelBackend<u32> = ChannelBackend::new();
        assert_eq!(backend.buffer(), 1000);

        let backend: ChannelBackend<u32> = ChannelBackend::new().with_buffer(8);
        assert_eq!(backend.buffer(), 8);
    }

    #[test]
    fn test_debug_output() {
        let backend: ChannelBackend<u32> = ChannelBackend::new().with_queues(["a", "b"]);
        let rendered = format!("{:?}", backend);
        assert!(rendered.contains("ChannelBackend"));
        assert!(rendered.contains("queues: 2"));
    }
}
