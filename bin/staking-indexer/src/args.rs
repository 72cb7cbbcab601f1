//! Parses command-line arguments for the staking indexer.

use std::path::PathBuf;

use clap::{crate_version, Parser};

#[derive(Debug, Parser)]
#[clap(
    name = "staking-indexer",
    about = "Tracks the lifecycle of BTC staking delegations",
    version = crate_version!()
)]
pub(crate) struct Cli {
    #[clap(
        long,
        short = 'p',
        env = "STAKING_INDEXER_PARAMS",
        help = "The file containing the versioned staking params",
        default_value = "params.toml"
    )]
    pub params: PathBuf,

    #[clap(
        long,
        short = 'c',
        env = "STAKING_INDEXER_CONFIG",
        help = "The file containing the configuration for the indexer",
        default_value = "config.toml"
    )]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["staking-indexer", "-c", "/etc/indexer.toml"])
            .expect("must be able to parse args");
        assert_eq!(cli.config, PathBuf::from("/etc/indexer.toml"));
        assert_eq!(cli.params, PathBuf::from("params.toml"));
    }
}
