//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// datum - pin external data sources and detect drift
#[derive(Parser, Debug)]
#[command(name = "datum")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Dataset configuration file (YAML, or JSON by extension)
    #[arg(long, global = true, env = "DATUM_CONFIG", default_value = ".data.yaml")]
    pub config: PathBuf,

    /// Lock file recording accepted fingerprints
    #[arg(long, global = true, env = "DATUM_LOCK", default_value = ".data.lock.yaml")]
    pub lock: PathBuf,

    /// Deadline in seconds for each source operation
    #[arg(long, global = true, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Compare every dataset with the lock file and apply its policy
    ///
    /// Exits 0 when everything is up to date (or refreshed), 1 on drift
    /// under the `fail` policy or unreachable sources, 2 on configuration
    /// or lock file errors.
    Check,

    /// Download datasets regardless of policy and record their fingerprints
    ///
    /// Examples:
    ///   datum fetch              # every dataset
    ///   datum fetch iris wine    # only these ids
    Fetch {
        /// Dataset ids to fetch (all when omitted)
        ids: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_check_with_defaults() {
        let cli = Cli::parse_from(["datum", "check"]);
        assert_eq!(cli.command, Commands::Check);
        assert_eq!(cli.config, PathBuf::from(".data.yaml"));
        assert_eq!(cli.lock, PathBuf::from(".data.lock.yaml"));
        assert_eq!(cli.timeout, 60);
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_fetch_ids() {
        let cli = Cli::parse_from(["datum", "fetch", "iris", "wine"]);
        assert_eq!(
            cli.command,
            Commands::Fetch {
                ids: vec!["iris".into(), "wine".into()]
            }
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "datum", "check", "--config", "cfg.json", "--lock", "lock.json", "--timeout", "5", "-v",
        ]);
        assert_eq!(cli.config, PathBuf::from("cfg.json"));
        assert_eq!(cli.lock, PathBuf::from("lock.json"));
        assert_eq!(cli.timeout, 5);
        assert!(cli.verbose);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["datum", "--timeout", "0", "check"]).is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["datum"]).is_err());
    }
}
