//! Backend contract shared by every queue implementation.

use async_trait::async_trait;

use crate::Result;

/// Uniform contract for named FIFO work queues.
///
/// A backend hosts any number of queues addressed by name. Queues come into
/// existence on first use; there is no separate declaration step. Items put
/// onto a queue are delivered to getters of that queue in FIFO order, and each
/// item is delivered to exactly one getter.
///
/// Implementations differ in where the queues live and therefore in their
/// blocking and failure behavior:
///
/// * [`ChannelBackend`] keeps queues in process memory and blocks on channel
///   capacity, with no failure modes beyond a closed channel.
/// * [`NatsBackend`] keeps queues on a JetStream server and can additionally
///   fail on connectivity, serialization, and server errors.
///
/// Callers that should not care which implementation they run on can hold an
/// `Arc<dyn QueueBackend<T>>` and pick the backend at construction time.
///
/// [`ChannelBackend`]: crate::ChannelBackend
/// [`NatsBackend`]: crate::NatsBackend
#[async_trait]
pub trait QueueBackend<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Append an item to the named queue, creating the queue if needed.
    ///
    /// Blocks while the queue has no capacity for the item. Returns once the
    /// item has been accepted by the queue.
    async fn put(&self, queue_name: &str, value: T) -> Result<()>;

    /// Take the next item from the named queue, creating the queue if needed.
    ///
    /// Blocks until an item is available. Concurrent getters on the same
    /// queue each receive distinct items.
    async fn get(&self, queue_name: &str) -> Result<T>;

    /// Drop the named queue and any items buffered in it.
    ///
    /// Removing a queue that does not exist is not an error. A subsequent
    /// [`put`](QueueBackend::put) starts a fresh, empty queue under the same
    /// name.
    async fn remove_queue(&self, queue_name: &str) -> Result<()>;

    /// Append several items to the named queue in order.
    ///
    /// Stops at the first failure; items before it have already been
    /// enqueued.
    async fn put_many(&self, queue_name: &str, values: Vec<T>) -> Result<()> {
        for value in values {
            self.put(queue_name, value).await?;
        }
        Ok(())
    }
}
