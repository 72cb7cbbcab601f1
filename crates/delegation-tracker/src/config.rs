//! Configuration of the background workers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EXPIRY_CHECK_INTERVAL, DEFAULT_EXPIRY_PAGE_SIZE};

/// The configuration of the [`ExpiryScanner`](crate::expiry::ExpiryScanner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryCheckerConfig {
    /// The time between two scans.
    interval: Duration,

    /// The maximum number of markers handled per scan.
    page_size: usize,
}

impl Default for ExpiryCheckerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_EXPIRY_CHECK_INTERVAL,
            page_size: DEFAULT_EXPIRY_PAGE_SIZE,
        }
    }
}

impl ExpiryCheckerConfig {
    /// Sets the time between two scans.
    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    /// Sets the maximum number of markers handled per scan.
    pub fn with_page_size(self, page_size: usize) -> Self {
        Self { page_size, ..self }
    }

    /// Returns the time between two scans.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the maximum number of markers handled per scan.
    pub const fn page_size(&self) -> usize {
        self.page_size
    }
}
