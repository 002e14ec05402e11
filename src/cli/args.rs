use crate::command::Command;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Reconcile cryptocurrency payouts between a remote authority and a wallet
#[derive(Parser, Debug)]
#[command(name = "payout-reconciler")]
#[command(about = "Reconcile cryptocurrency payouts between a remote authority and a wallet", long_about = None)]
pub struct CliArgs {
    /// Configuration file
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        default_value = "config.toml",
        help = "Path to the TOML configuration file"
    )]
    pub config: PathBuf,

    /// Log level override
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        help = "Log level: trace, debug, info, warn or error (RUST_LOG takes precedence)"
    )]
    pub log_level: Option<LogLevel>,

    /// Dry run
    #[arg(
        short = 's',
        long = "simulate",
        help = "Read and report only: commit nothing, send nothing, push nothing"
    )]
    pub simulate: bool,

    /// Restrict the command to one currency
    #[arg(
        long = "currency",
        value_name = "CODE",
        help = "Currency code to run for (default: every enabled currency)"
    )]
    pub currency: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log levels accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pull(&["program", "pull-payouts"], Command::PullPayouts)]
    #[case::payout(&["program", "payout"], Command::Payout)]
    #[case::associate_all(&["program", "associate-all"], Command::AssociateAll)]
    #[case::associate(&["program", "associate", "abc"], Command::Associate { txid: "abc".to_string() })]
    #[case::confirm(&["program", "confirm-trans"], Command::ConfirmTrans)]
    #[case::reset(&["program", "reset-all-locked"], Command::ResetAllLocked)]
    #[case::init(&["program", "init-db"], Command::InitDb)]
    #[case::dump_incomplete(&["program", "dump-incomplete"], Command::DumpIncomplete)]
    #[case::dump_complete(&["program", "dump-complete"], Command::DumpComplete)]
    #[case::local_associate(
        &["program", "local-associate-locked", "12", "abc"],
        Command::LocalAssociateLocked { id: 12, txid: "abc".to_string() }
    )]
    #[case::local_associate_all(
        &["program", "local-associate-all-locked", "abc"],
        Command::LocalAssociateAllLocked { txid: "abc".to_string() }
    )]
    #[case::cycle(&["program", "cycle"], Command::Cycle)]
    fn test_command_parsing(#[case] args: &[&str], #[case] expected: Command) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.command, expected);
    }

    #[test]
    fn test_defaults() {
        let parsed = CliArgs::try_parse_from(["program", "payout"]).unwrap();
        assert_eq!(parsed.config, PathBuf::from("config.toml"));
        assert_eq!(parsed.log_level, None);
        assert!(!parsed.simulate);
        assert_eq!(parsed.currency, None);
    }

    #[rstest]
    #[case::long(&["program", "--config", "/etc/payouts.toml", "--log-level", "debug", "--simulate", "--currency", "LTC", "payout"])]
    #[case::short(&["program", "-c", "/etc/payouts.toml", "-l", "debug", "-s", "--currency", "LTC", "payout"])]
    fn test_global_options(#[case] args: &[&str]) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.config, PathBuf::from("/etc/payouts.toml"));
        assert_eq!(parsed.log_level, Some(LogLevel::Debug));
        assert!(parsed.simulate);
        assert_eq!(parsed.currency.as_deref(), Some("LTC"));
    }

    // Error handling tests
    #[rstest]
    #[case::missing_command(&["program"])]
    #[case::unknown_command(&["program", "trade"])]
    #[case::bad_log_level(&["program", "--log-level", "loud", "payout"])]
    #[case::non_numeric_id(&["program", "local-associate-locked", "x", "abc"])]
    #[case::missing_txid(&["program", "local-associate-all-locked"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}
