//! Dialed queue sessions and the queue-to-stream naming scheme.

use std::time::Duration;

use async_nats::jetstream::{self, stream};
use async_nats::{Client, ConnectOptions};
use tokio::time::timeout;
use tracing::{debug, instrument};

use super::NatsQueueConfig;
use crate::{Error, Result, TRACING_TARGET_CONNECTION, TRACING_TARGET_QUEUE};

/// Stream backing queue `n` is named `QUEUE_n`.
const STREAM_PREFIX: &str = "QUEUE_";
/// Items for queue `n` are published on subject `queue.n`.
const SUBJECT_PREFIX: &str = "queue.";
/// Durable consumer shared by every getter of a queue.
const SHARED_CONSUMER: &str = "workers";

/// Queue names become stream and subject tokens on the server.
const MAX_QUEUE_NAME_LEN: usize = 255;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the name of the stream backing the given queue.
///
/// The mapping preserves the queue name byte for byte, so two distinct queue
/// names can never share a stream.
pub(crate) fn stream_name(queue_name: &str) -> Result<String> {
    validate_queue_name(queue_name)?;
    Ok(format!("{}{}", STREAM_PREFIX, queue_name))
}

/// Returns the subject items of the given queue are published on.
pub(crate) fn queue_subject(queue_name: &str) -> String {
    format!("{}{}", SUBJECT_PREFIX, queue_name)
}

/// Check that a queue name survives the trip into stream and subject tokens.
fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_queue_name(name, "queue name cannot be empty"));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(Error::invalid_queue_name(
            name,
            format!("queue name exceeds {} bytes", MAX_QUEUE_NAME_LEN),
        ));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>' | '/' | '\\'))
    {
        return Err(Error::invalid_queue_name(
            name,
            format!("invalid character {:?}", ch),
        ));
    }
    Ok(())
}

/// One dialed connection to the queue server plus its JetStream context.
///
/// Sessions are owned by the session pool and loaned to one operation at a
/// time; they are never shared between concurrent callers.
#[derive(Debug, Clone)]
pub struct QueueSession {
    client: Client,
    jetstream: jetstream::Context,
}

impl QueueSession {
    /// Dial the queue server and set up a JetStream context.
    #[instrument(skip(config), target = TRACING_TARGET_CONNECTION)]
    pub async fn connect(config: &NatsQueueConfig) -> Result<Self> {
        let connect_opts = ConnectOptions::new()
            .name(config.client_name())
            .connection_timeout(config.connect_timeout());

        let client = timeout(
            config.connect_timeout(),
            async_nats::connect_with_options(config.url(), connect_opts),
        )
        .await
        .map_err(|_| Error::timeout(config.connect_timeout()))?
        .map_err(|e| Error::Connection(Box::new(e)))?;

        let jetstream = jetstream::new(client.clone());

        debug!(
            target: TRACING_TARGET_CONNECTION,
            url = %config.url(),
            client_name = %config.client_name(),
            "Established queue session"
        );
        Ok(Self { client, jetstream })
    }

    /// Get the JetStream context
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Returns whether the underlying connection is currently established.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }

    /// Test connectivity with a round trip to the server.
    #[instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn ping(&self) -> Result<Duration> {
        let start = std::time::Instant::now();

        timeout(PING_TIMEOUT, self.client.flush())
            .await
            .map_err(|_| Error::timeout(PING_TIMEOUT))?
            .map_err(|e| Error::Connection(Box::new(e)))?;

        let ping_time = start.elapsed();
        debug!(
            target: TRACING_TARGET_CONNECTION,
            duration_ms = ping_time.as_millis(),
            "Queue server ping successful"
        );
        Ok(ping_time)
    }

    /// Look up the stream backing a queue, creating it on first use.
    #[instrument(skip(self), target = TRACING_TARGET_QUEUE)]
    pub async fn ensure_stream(&self, queue_name: &str) -> Result<stream::Stream> {
        let stream_name = stream_name(queue_name)?;

        match self.jetstream.get_stream(&stream_name).await {
            Ok(existing) => {
                debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = %stream_name,
                    "Using existing queue stream"
                );
                Ok(existing)
            }
            Err(_) => {
                // Stream doesn't exist, create it
                debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = %stream_name,
                    queue = %queue_name,
                    "Creating queue stream"
                );
                let stream_config = stream::Config {
                    name: stream_name.clone(),
                    description: Some(format!("Work queue '{}'", queue_name)),
                    subjects: vec![queue_subject(queue_name)],
                    retention: stream::RetentionPolicy::WorkQueue,
                    ..Default::default()
                };
                self.jetstream
                    .create_stream(stream_config)
                    .await
                    .map_err(|e| Error::stream_error(&stream_name, e.to_string()))
            }
        }
    }

    /// Get the shared work consumer for a queue, creating it on first use.
    ///
    /// Every getter of a queue pulls from this one durable consumer, so
    /// concurrent getters across processes compete for items instead of each
    /// receiving a copy.
    #[instrument(skip(self), target = TRACING_TARGET_QUEUE)]
    pub async fn queue_consumer(
        &self,
        queue_name: &str,
        time_to_run: Duration,
    ) -> Result<jetstream::consumer::PullConsumer> {
        let stream = self.ensure_stream(queue_name).await?;

        let consumer_config = jetstream::consumer::pull::Config {
            name: Some(SHARED_CONSUMER.to_string()),
            durable_name: Some(SHARED_CONSUMER.to_string()),
            description: Some(format!("Shared work consumer for queue '{}'", queue_name)),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ack_wait: time_to_run,
            ..Default::default()
        };

        stream
            .get_or_create_consumer(SHARED_CONSUMER, consumer_config)
            .await
            .map_err(|e| Error::consumer_error(SHARED_CONSUMER, e.to_string()))
    }

    /// Delete the stream backing a queue, if it exists.
    ///
    /// Returns whether a stream was actually deleted.
    #[instrument(skip(self), target = TRACING_TARGET_QUEUE)]
    pub async fn delete_queue_stream(&self, queue_name: &str) -> Result<bool> {
        let stream_name = stream_name(queue_name)?;

        match self.jetstream.get_stream(&stream_name).await {
            Ok(_) => {
                self.jetstream
                    .delete_stream(&stream_name)
                    .await
                    .map_err(|e| Error::stream_error(&stream_name, e.to_string()))?;

                debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = %stream_name,
                    queue = %queue_name,
                    "Deleted queue stream"
                );
                Ok(true)
            }
            Err(error) => {
                // Absent stream: the queue was never created or is already
                // gone, and removal is idempotent.
                debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = %stream_name,
                    queue = %queue_name,
                    error = %error,
                    "Queue stream not found, nothing to delete"
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_naming() {
        assert_eq!(stream_name("emails").unwrap(), "QUEUE_emails");
        assert_eq!(queue_subject("emails"), "queue.emails");

        // Case is preserved so distinct names stay distinct.
        assert_eq!(stream_name("Emails").unwrap(), "QUEUE_Emails");
        assert_ne!(stream_name("emails").unwrap(), stream_name("EMAILS").unwrap());
    }

    #[test]
    fn test_valid_queue_names() {
        for name in ["jobs", "payment-events", "ocr_pages", "tier2", "A"] {
            assert!(validate_queue_name(name).is_ok(), "expected '{}' valid", name);
        }
    }

    #[test]
    fn test_invalid_queue_names() {
        let too_long = "q".repeat(MAX_QUEUE_NAME_LEN + 1);
        let invalid = [
            "",
            "has space",
            "has\ttab",
            "dotted.name",
            "star*name",
            "wild>name",
            "slash/name",
            "back\\slash",
            too_long.as_str(),
        ];

        for name in invalid {
            let result = validate_queue_name(name);
            assert!(
                matches!(result, Err(Error::InvalidQueueName { .. })),
                "expected '{}' rejected",
                name
            );
        }
    }

    #[test]
    fn test_stream_name_rejects_invalid_queue() {
        assert!(stream_name("bad name").is_err());
    }
}
