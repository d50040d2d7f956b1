//! Configuration for the networked queue backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the networked queue backend with sensible defaults.
///
/// Only the server URL is required. Everything else falls back to defaults
/// chosen for long-running worker processes: sessions are dialed lazily,
/// the pool is effectively unbounded, and idle sessions are kept around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsQueueConfig {
    /// Queue server URL (comma-separated for clustering)
    pub url: String,

    /// Client connection name for debugging and monitoring
    pub client_name: Option<String>,

    /// Session dial timeout in seconds (optional)
    pub connect_timeout_secs: Option<u64>,

    /// Length of one server-side reservation window in seconds (optional)
    pub reserve_timeout_secs: Option<u64>,

    /// Time a received item may stay unacknowledged before the server
    /// redelivers it, in seconds (optional)
    pub time_to_run_secs: Option<u64>,

    /// Maximum number of pooled sessions (optional, unbounded when unset)
    pub max_sessions: Option<usize>,

    /// How long a borrow may wait for a free session in seconds
    /// (optional, waits indefinitely when unset)
    pub wait_timeout_secs: Option<u64>,

    /// How long a session recycle check may take in seconds (optional)
    pub idle_timeout_secs: Option<u64>,
}

// Default values
const DEFAULT_CLIENT_NAME: &str = "convey-queue";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RESERVE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TIME_TO_RUN_SECS: u64 = 300;

// Largest session count the pool's semaphore accepts; stands in for
// "unbounded" since the pool requires an upper bound.
const UNBOUNDED_SESSIONS: usize = usize::MAX >> 3;

impl NatsQueueConfig {
    /// Create a new configuration for the given server URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_name: None,
            connect_timeout_secs: None,
            reserve_timeout_secs: None,
            time_to_run_secs: None,
            max_sessions: None,
            wait_timeout_secs: None,
            idle_timeout_secs: None,
        }
    }

    /// Returns the server URL.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the server URLs as a vector (splits comma-separated URLs).
    pub fn servers(&self) -> Vec<&str> {
        self.url.split(',').map(str::trim).collect()
    }

    /// Returns the client name, using the default if not set.
    #[inline]
    pub fn client_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or(DEFAULT_CLIENT_NAME)
    }

    /// Returns the session dial timeout as a Duration.
    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Returns the reservation window as a Duration.
    #[inline]
    pub fn reserve_timeout(&self) -> Duration {
        Duration::from_secs(
            self.reserve_timeout_secs
                .unwrap_or(DEFAULT_RESERVE_TIMEOUT_SECS),
        )
    }

    /// Returns the redelivery window for unacknowledged items as a Duration.
    #[inline]
    pub fn time_to_run(&self) -> Duration {
        Duration::from_secs(self.time_to_run_secs.unwrap_or(DEFAULT_TIME_TO_RUN_SECS))
    }

    /// Returns the session cap handed to the pool.
    #[inline]
    pub fn max_sessions(&self) -> usize {
        self.max_sessions.unwrap_or(UNBOUNDED_SESSIONS)
    }

    /// Returns the borrow wait timeout as a Duration, if set.
    #[inline]
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the recycle timeout as a Duration, if set.
    #[inline]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Set server URL(s).
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the client connection name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Set the session dial timeout in seconds.
    #[must_use]
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// Set the reservation window in seconds.
    ///
    /// Shorter windows make blocked getters notice queue removal and
    /// connectivity loss sooner at the cost of more polling round trips.
    #[must_use]
    pub fn with_reserve_timeout_secs(mut self, secs: u64) -> Self {
        self.reserve_timeout_secs = Some(secs);
        self
    }

    /// Set the redelivery window for unacknowledged items in seconds.
    #[must_use]
    pub fn with_time_to_run_secs(mut self, secs: u64) -> Self {
        self.time_to_run_secs = Some(secs);
        self
    }

    /// Cap the number of pooled sessions.
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = Some(max_sessions);
        self
    }

    /// Set how long a borrow may wait for a free session, in seconds.
    #[must_use]
    pub fn with_wait_timeout_secs(mut self, secs: u64) -> Self {
        self.wait_timeout_secs = Some(secs);
        self
    }

    /// Set the recycle timeout in seconds.
    #[must_use]
    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = Some(secs);
        self
    }

    /// Validate the configuration and return any issues.
    pub fn validate(&self) -> Result<(), String> {
        let servers = self.servers();

        if servers.is_empty() {
            return Err("At least one server URL must be provided".to_string());
        }

        for server in servers {
            if server.is_empty() {
                return Err("Server URL cannot be empty".to_string());
            }
            if !server.starts_with("nats://") {
                return Err(format!("Invalid server URL format: {}", server));
            }
        }

        if self.max_sessions == Some(0) {
            return Err("Session cap must be at least one".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_defaults() {
        let config = NatsQueueConfig::new("nats://localhost:4222");
        assert_eq!(config.url(), "nats://localhost:4222");
        assert_eq!(config.client_name(), "convey-queue");
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.reserve_timeout(), Duration::from_secs(60));
        assert_eq!(config.time_to_run(), Duration::from_secs(300));
        assert_eq!(config.max_sessions(), UNBOUNDED_SESSIONS);
        assert_eq!(config.wait_timeout(), None);
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn test_config_builder() {
        let config = NatsQueueConfig::new("nats://localhost:4222")
            .with_name("worker-7")
            .with_connect_timeout_secs(5)
            .with_reserve_timeout_secs(15)
            .with_time_to_run_secs(120)
            .with_max_sessions(8)
            .with_wait_timeout_secs(2)
            .with_idle_timeout_secs(30);

        assert_eq!(config.client_name(), "worker-7");
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.reserve_timeout(), Duration::from_secs(15));
        assert_eq!(config.time_to_run(), Duration::from_secs(120));
        assert_eq!(config.max_sessions(), 8);
        assert_eq!(config.wait_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_config_validation() {
        let valid = NatsQueueConfig::new("nats://localhost:4222");
        assert!(valid.validate().is_ok());

        let empty = NatsQueueConfig::new("");
        assert!(empty.validate().is_err());

        let bad_scheme = NatsQueueConfig::new("http://localhost:4222");
        assert!(bad_scheme.validate().is_err());

        let zero_cap = NatsQueueConfig::new("nats://localhost:4222").with_max_sessions(0);
        assert!(zero_cap.validate().is_err());
    }

    #[test]
    fn test_multiple_servers() {
        let config = NatsQueueConfig::new("nats://a:4222, nats://b:4222");
        assert_eq!(config.servers(), vec!["nats://a:4222", "nats://b:4222"]);
        assert!(config.validate().is_ok());
    }
}
