//! CLI command definitions using clap.
//!
//! - run: start the configured heartbeat loops until a shutdown signal or time limit
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// loopwarden - run named background loops bound to an owner's lifetime
#[derive(Parser, Debug)]
#[command(name = "loopwarden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the configured heartbeat loops
    Run {
        /// Stop after this many seconds instead of waiting for a signal
        #[arg(short, long)]
        duration: Option<u64>,

        /// Stream engine events to stdout as JSON lines
        #[arg(short, long)]
        events: bool,
    },

    /// Print the effective configuration as YAML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args() {
        // No args falls back to `run`
        let cli = Cli::try_parse_from(["loopwarden"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["loopwarden", "-v"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["loopwarden", "-c", "/path/to/loopwarden.yml"]).unwrap();
        let expected = PathBuf::from("/path/to/loopwarden.yml");
        assert_eq!(cli.config.as_ref(), Some(&expected));
    }

    #[test]
    fn test_run_command() {
        let args = ["loopwarden", "run", "--duration", "5", "--events"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Run {
                duration: Some(5),
                events: true,
            })
        );
    }

    #[test]
    fn test_run_command_defaults() {
        let cli = Cli::try_parse_from(["loopwarden", "run"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Run {
                duration: None,
                events: false,
            })
        );
    }

    #[test]
    fn test_config_command_with_global_flag() {
        let cli = Cli::try_parse_from(["loopwarden", "config", "-c", "custom.yml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Config));
        assert_eq!(cli.config, Some(PathBuf::from("custom.yml")));
    }

    #[test]
    fn test_invalid_command() {
        assert!(Cli::try_parse_from(["loopwarden", "bogus"]).is_err());
    }
}
