//! Configuration of the SQLite persistence layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_BACKOFF_PERIOD, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_RETRY_COUNT};

/// The configuration for the SQLite database.
///
/// Every field is optional in the serialized form and falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    max_retry_count: usize,
    backoff_period: Duration,
    max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            backoff_period: DEFAULT_BACKOFF_PERIOD,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl DbConfig {
    /// Sets the number of retries for transient failures.
    pub fn with_max_retry_count(self, count: usize) -> Self {
        Self {
            max_retry_count: count,
            ..self
        }
    }

    /// Sets the wait between retries.
    pub fn with_backoff_period(self, period: Duration) -> Self {
        Self {
            backoff_period: period,
            ..self
        }
    }

    /// Sets the size of the connection pool.
    pub fn with_max_connections(self, max_connections: u32) -> Self {
        Self {
            max_connections,
            ..self
        }
    }

    /// Returns the number of retries for transient failures.
    pub fn max_retry_count(&self) -> usize {
        self.max_retry_count
    }

    /// Returns the wait between retries.
    pub fn backoff_period(&self) -> Duration {
        self.backoff_period
    }

    /// Returns the size of the connection pool.
    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }
}
