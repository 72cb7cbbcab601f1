//! The staking indexer follows the Bitcoin chain and drives BTC staking delegations through their
//! lifecycle.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use btc_client::BitcoinClient;
use clap::Parser;
use config::Config;
use constants::{DB_NAME, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_THREAD_COUNT};
use delegation_tracker::{engine::DelegationEngine, expiry::ExpiryScanner};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use staking_common::{logging, logging::LoggerConfig};
use staking_db::persistent::SqliteDb;
use staking_params::prelude::VersionedParams;
use tokio::runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

mod args;
mod btc_client;
mod config;

mod constants;

fn main() -> anyhow::Result<()> {
    let mut logger_config = LoggerConfig::with_base_name("staking-indexer");
    if let Some(url) = logging::get_otlp_url_from_env() {
        logger_config.set_otlp_url(url);
    }
    logging::init(logger_config)?;

    let cli = args::Cli::parse();

    let params = parse_toml::<VersionedParams>(&cli.params)?;
    let config = parse_toml::<Config>(&cli.config)?;
    info!(
        latest_params_version = ?params.latest_version(),
        datadir = %config.datadir.display(),
        "starting staking indexer"
    );
    for staking in params.versions() {
        info!(
            version = staking.version,
            covenant_quorum = staking.covenant_quorum,
            committee_size = staking.covenant_pks.len(),
            "loaded staking params"
        );
    }

    let runtime = runtime::Builder::new_multi_thread()
        .worker_threads(config.num_threads.unwrap_or(DEFAULT_THREAD_COUNT))
        .enable_all()
        .build()
        .context("could not create runtime")?;

    runtime.block_on(run(params, config))?;

    info!("staking indexer shutdown complete");

    Ok(())
}

async fn run(params: VersionedParams, config: Config) -> anyhow::Result<()> {
    let db = Arc::new(init_database_handle(&config).await?);
    let btc_client = Arc::new(BitcoinClient::new(&config.btc_client)?);

    let engine = DelegationEngine::new(db.clone(), Arc::new(params));
    let scanner = ExpiryScanner::new(engine, db, config.expiry_checker);

    let cancel = CancellationToken::new();
    let mut scanner_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scanner.run(btc_client, cancel).await }
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("could not listen for shutdown signal")?;
            info!("received shutdown signal");
        }
        exited = &mut scanner_task => {
            exited.context("expiry scanner crashed")?;
            bail!("expiry scanner exited unexpectedly");
        }
    }

    cancel.cancel();

    let shutdown_timeout = config.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
    match tokio::time::timeout(shutdown_timeout, scanner_task).await {
        Ok(exited) => exited.context("expiry scanner crashed during shutdown")?,
        Err(_) => warn!(?shutdown_timeout, "expiry scanner did not stop in time"),
    }

    Ok(())
}

async fn init_database_handle(config: &Config) -> anyhow::Result<SqliteDb> {
    let db_path = create_db_file(&config.datadir, DB_NAME)?;

    let connect_options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db.max_connections())
        .connect_with(connect_options)
        .await
        .with_context(|| format!("could not connect to {}", db_path.display()))?;

    let db = SqliteDb::new(pool, config.db.clone());

    info!(action = "running migrations", %DB_NAME);
    db.migrate().await.context("could not run migrations")?;

    Ok(db)
}

fn create_db_file(datadir: impl AsRef<Path>, db_name: &str) -> anyhow::Result<PathBuf> {
    let datadir = datadir.as_ref();

    if !datadir.exists() {
        fs::create_dir_all(datadir)
            .with_context(|| format!("could not create datadir {}", datadir.display()))?;
    }

    Ok(datadir.join(db_name))
}

/// Reads and parses a TOML file from the given path into the given type `T`.
fn parse_toml<T>(path: impl AsRef<Path>) -> anyhow::Result<T>
where
    T: std::fmt::Debug + DeserializeOwned,
{
    let path = path.as_ref();

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read TOML file {}", path.display()))?;
    trace!(?contents, "read file");

    let parsed = toml::from_str::<T>(&contents)
        .with_context(|| format!("failed to parse TOML file {}", path.display()))?;
    debug!(?parsed, "parsed TOML file");

    Ok(parsed)
}
