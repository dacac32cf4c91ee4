//! # Relay Configuration
//!
//! Tunables for the forwarder and the header puller.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::domain::{
    RelayError, DIFFICULTY_EPOCH_DURATION, FORWARDER_SLEEP_MS, HEADERS_BATCH_SIZE,
    HEADERS_QUEUE_SIZE, HEADER_TIMEOUT_MS,
};

/// Default interval between source chain tip polls.
const SOURCE_POLL_INTERVAL_MS: u64 = 10_000;

/// Relay configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Capacity of the headers queue.
    pub queue_capacity: usize,

    /// Maximum headers per batch; also the best-digest advancement threshold.
    pub batch_size: usize,

    /// Idle time after the last received header before a partial batch is
    /// returned, in milliseconds.
    pub idle_timeout_ms: u64,

    /// Difficulty epoch length in blocks.
    pub epoch_length: u64,

    /// Rest after a successful push, in milliseconds.
    pub rest_interval_ms: u64,

    /// Interval between source chain tip polls in the header puller, in
    /// milliseconds.
    pub source_poll_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: HEADERS_QUEUE_SIZE,
            batch_size: HEADERS_BATCH_SIZE,
            idle_timeout_ms: HEADER_TIMEOUT_MS,
            epoch_length: DIFFICULTY_EPOCH_DURATION,
            rest_interval_ms: FORWARDER_SLEEP_MS,
            source_poll_interval_ms: SOURCE_POLL_INTERVAL_MS,
        }
    }
}

impl RelayConfig {
    /// Create a config for testing (short timings, production sizes).
    pub fn for_testing() -> Self {
        Self {
            idle_timeout_ms: 100,
            rest_interval_ms: 50,
            source_poll_interval_ms: 50,
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_QUEUE_CAPACITY`: headers queue capacity (default: 50)
    /// - `RELAY_BATCH_SIZE`: headers per batch (default: 5)
    /// - `RELAY_IDLE_TIMEOUT_MS`: pull phase idle timeout (default: 1000)
    /// - `RELAY_EPOCH_LENGTH`: difficulty epoch length (default: 2016)
    /// - `RELAY_REST_INTERVAL_MS`: rest after a push (default: 45000)
    /// - `RELAY_SOURCE_POLL_MS`: source chain poll interval (default: 10000)
    ///
    /// Absent or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue_capacity: env_or("RELAY_QUEUE_CAPACITY", defaults.queue_capacity),
            batch_size: env_or("RELAY_BATCH_SIZE", defaults.batch_size),
            idle_timeout_ms: env_or("RELAY_IDLE_TIMEOUT_MS", defaults.idle_timeout_ms),
            epoch_length: env_or("RELAY_EPOCH_LENGTH", defaults.epoch_length),
            rest_interval_ms: env_or("RELAY_REST_INTERVAL_MS", defaults.rest_interval_ms),
            source_poll_interval_ms: env_or(
                "RELAY_SOURCE_POLL_MS",
                defaults.source_poll_interval_ms,
            ),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.queue_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "queue_capacity cannot be 0".into(),
            ));
        }

        if self.batch_size == 0 {
            return Err(RelayError::InvalidConfig("batch_size cannot be 0".into()));
        }

        if self.batch_size > self.queue_capacity {
            return Err(RelayError::InvalidConfig(format!(
                "batch_size {} exceeds queue_capacity {}",
                self.batch_size, self.queue_capacity
            )));
        }

        if self.epoch_length == 0 {
            return Err(RelayError::InvalidConfig(
                "epoch_length cannot be 0".into(),
            ));
        }

        if self.batch_size as u64 > self.epoch_length {
            return Err(RelayError::InvalidConfig(format!(
                "batch_size {} exceeds epoch_length {}",
                self.batch_size, self.epoch_length
            )));
        }

        if self.idle_timeout_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "idle_timeout_ms cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Idle timeout of the pull phase.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Rest after a successful push.
    pub fn rest_interval(&self) -> Duration {
        Duration::from_millis(self.rest_interval_ms)
    }

    /// Source chain poll interval.
    pub fn source_poll_interval(&self) -> Duration {
        Duration::from_millis(self.source_poll_interval_ms)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
