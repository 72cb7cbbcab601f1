use std::time::Duration;

pub(crate) const DB_NAME: &str = "staking.db";

pub(crate) const DEFAULT_THREAD_COUNT: usize = 4;

pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
