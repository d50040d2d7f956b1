//! Error types and utilities for queue operations.

use std::time::Duration;

use deadpool::managed::{PoolError, TimeoutType};

/// Boxed error type for wrapped collaborator errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for all queue operations in this crate.
///
/// This is a convenience type alias that defaults to using [`Error`] as the error type.
/// Most functions in this crate return this type for consistent error handling.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for queue operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Queue server client/connection errors
    #[error("Queue server connection error: {0}")]
    Connection(#[from] async_nats::Error),

    /// Session pool exhausted or failed within the configured timeout
    #[error("Session pool timed out ({0:?})")]
    PoolTimeout(TimeoutType),

    /// Serialization errors when encoding or decoding queue items
    #[error("Serialization error: {0}")]
    Serialization(BoxError),

    /// Operation timeout
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Item delivery failed
    #[error("Item delivery failed to subject '{subject}': {reason}")]
    DeliveryFailed { subject: String, reason: String },

    /// Stream operation failed
    #[error("Stream operation failed on '{stream}': {reason}")]
    Stream { stream: String, reason: String },

    /// Consumer operation failed
    #[error("Consumer '{consumer}' error: {reason}")]
    Consumer { consumer: String, reason: String },

    /// Acknowledgement of a received item failed
    #[error("Acknowledgement error on queue '{queue}': {reason}")]
    Ack { queue: String, reason: String },

    /// In-process queue channel was closed
    #[error("Queue '{queue}' channel is closed")]
    ChannelClosed { queue: String },

    /// Queue name cannot be mapped onto the server's naming rules
    #[error("Invalid queue name '{name}': {reason}")]
    InvalidQueueName { name: String, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Generic operation error with context
    #[error("Queue operation failed: {operation} - {details}")]
    Operation { operation: String, details: String },
}

impl Error {
    /// Create a serialization error from any codec error
    pub fn serialization(source: impl Into<BoxError>) -> Self {
        Self::Serialization(source.into())
    }

    /// Create a delivery failed error
    pub fn delivery_failed(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Create a stream error
    pub fn stream_error(stream: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stream {
            stream: stream.into(),
            reason: reason.into(),
        }
    }

    /// Create a consumer error
    pub fn consumer_error(consumer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Consumer {
            consumer: consumer.into(),
            reason: reason.into(),
        }
    }

    /// Create an acknowledgement error
    pub fn ack_error(queue: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Ack {
            queue: queue.into(),
            reason: reason.into(),
        }
    }

    /// Create a closed channel error
    pub fn channel_closed(queue: impl Into<String>) -> Self {
        Self::ChannelClosed {
            queue: queue.into(),
        }
    }

    /// Create an invalid queue name error
    pub fn invalid_queue_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQueueName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an operation error with context
    pub fn operation(op: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Operation {
            operation: op.into(),
            details: details.into(),
        }
    }

    /// Create a timeout error with the given duration
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { timeout: duration }
    }

    /// Returns whether this error is transient and the operation may succeed on retry.
    ///
    /// Transient errors cover connectivity loss, pool exhaustion, and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::PoolTimeout(_) | Error::Timeout { .. }
        )
    }

    /// Returns whether this error is permanent and retrying is unlikely to help.
    ///
    /// Permanent errors include serialization failures, invalid names, and
    /// configuration problems that require a code or data change to resolve.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            Error::Connection(_) => {
                "Connection to the queue server failed. Please check your connection.".to_string()
            }
            Error::PoolTimeout(_) => {
                "The queue server is busy. Please try again shortly.".to_string()
            }
            Error::Timeout { timeout } => {
                format!("Operation timed out after {:?}. Please try again.", timeout)
            }
            Error::Serialization(_) => "Data format error. Please check your input.".to_string(),
            Error::ChannelClosed { queue } => format!("Queue '{}' is no longer accepting items.", queue),
            Error::InvalidQueueName { name, .. } => format!("Queue name '{}' is not valid.", name),
            Error::InvalidConfig { reason } => format!("Configuration error: {}", reason),
            _ => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

impl From<PoolError<Error>> for Error {
    fn from(value: PoolError<Error>) -> Self {
        match value {
            PoolError::Timeout(timeout) => Self::PoolTimeout(timeout),
            PoolError::Backend(error) => error,
            PoolError::PostCreateHook(err) => {
                // This should not happen without registered hooks, but handle gracefully:
                tracing::warn!("Unexpected post-create hook error: {}", err);
                Self::operation("session_create", err.to_string())
            }
            PoolError::NoRuntimeSpecified => {
                // This should not happen as we specify the tokio runtime, but handle gracefully:
                tracing::error!("No tokio runtime specified for session pool");
                Self::operation("session_borrow", "no runtime specified")
            }
            PoolError::Closed => Self::operation("session_borrow", "session pool is closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::delivery_failed("queue.jobs", "no responders");
        assert_eq!(
            err.to_string(),
            "Item delivery failed to subject 'queue.jobs': no responders"
        );

        let err = Error::invalid_queue_name("a b", "invalid character ' '");
        assert!(err.to_string().contains("a b"));
        assert!(err.to_string().contains("invalid character"));

        let err = Error::operation("queue_reserve", "batch failed");
        assert_eq!(
            err.to_string(),
            "Queue operation failed: queue_reserve - batch failed"
        );
    }

    #[test]
    fn test_pool_error_conversion() {
        let err = Error::from(PoolError::<Error>::Timeout(TimeoutType::Wait));
        assert!(matches!(err, Error::PoolTimeout(TimeoutType::Wait)));

        let inner = Error::channel_closed("jobs");
        let err = Error::from(PoolError::Backend(inner));
        assert!(matches!(err, Error::ChannelClosed { .. }));

        let err = Error::from(PoolError::<Error>::Closed);
        assert!(matches!(err, Error::Operation { .. }));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::PoolTimeout(TimeoutType::Wait).is_transient());
        assert!(Error::timeout(Duration::from_secs(5)).is_transient());
        assert!(Error::invalid_config("empty url").is_permanent());
        assert!(Error::serialization(std::io::Error::other("bad bytes")).is_permanent());
    }

    #[test]
    fn test_user_messages() {
        let err = Error::PoolTimeout(TimeoutType::Wait);
        assert!(err.user_message().contains("busy"));

        let err = Error::channel_closed("emails");
        assert!(err.user_message().contains("emails"));

        let err = Error::ack_error("emails", "stale delivery");
        assert!(err.user_message().contains("unexpected error"));
    }
}
