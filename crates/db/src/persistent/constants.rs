//! Defaults for the SQLite persistence layer.

use std::time::Duration;

/// The number of times a busy or locked database operation is retried before erroring out.
pub const DEFAULT_MAX_RETRY_COUNT: usize = 5;

/// The period of time to wait between two attempts of the same operation.
pub const DEFAULT_BACKOFF_PERIOD: Duration = Duration::from_millis(500);

/// The number of pooled connections to the database file.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;
