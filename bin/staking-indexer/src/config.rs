use std::{path::PathBuf, time::Duration};

use delegation_tracker::config::ExpiryCheckerConfig;
use serde::{Deserialize, Serialize};
use staking_db::persistent::config::DbConfig;

/// The configuration values that dictate the behavior of the staking indexer.
///
/// These values are local to a deployment. Anything that must agree across indexers lives in the
/// params file instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// The directory to store all the data in.
    pub datadir: PathBuf,

    /// The configuration required to connect to an instance of the bitcoin client.
    pub btc_client: BtcClientConfig,

    /// The configuration for the sqlite3 database.
    #[serde(default)]
    pub db: DbConfig,

    /// The configuration for the timelock expiry scanner.
    #[serde(default)]
    pub expiry_checker: ExpiryCheckerConfig,

    /// The number of runtime worker threads.
    ///
    /// Default is [`DEFAULT_THREAD_COUNT`](crate::constants::DEFAULT_THREAD_COUNT).
    pub num_threads: Option<usize>,

    /// How long to wait for the workers to stop on shutdown.
    ///
    /// Default is [`DEFAULT_SHUTDOWN_TIMEOUT`](crate::constants::DEFAULT_SHUTDOWN_TIMEOUT).
    pub shutdown_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BtcClientConfig {
    pub url: String,
    pub user: String,
    pub pass: String,
}
