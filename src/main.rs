//! Payout Reconciler CLI
//!
//! # Usage
//!
//! ```bash
//! payout-reconciler pull-payouts
//! payout-reconciler --currency LTC payout
//! payout-reconciler --simulate cycle
//! payout-reconciler -c /etc/payouts.toml dump-incomplete > incomplete.csv
//! ```
//!
//! Each invocation runs one command for the selected currency, or for every
//! enabled currency, and exits. Scheduling is left to the caller (cron, a
//! systemd timer, ...). Logs go to stderr; CSV dumps go to stdout.
//!
//! # Exit Codes
//!
//! - 0: Success or nothing to do
//! - 1: Failure, safe to retry on the next run
//! - 2: Manual intervention required
//! - 3: Fatal error (bad configuration, or a sent transaction that could not be recorded)

use payout_reconciler::cli;
use payout_reconciler::config::{Config, CurrencyConfig, LogFormat};
use payout_reconciler::core::{LedgerStore, PayoutContext, RemoteAuthority};
use payout_reconciler::io::{HttpAuthority, RpcWallet};
use payout_reconciler::{dispatch, Outcome, OutcomeStatus, PayoutError};
use std::io::Write;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const FATAL_EXIT_CODE: i32 = 3;

fn main() {
    let args = cli::parse_args();

    let config = Config::load(&args.config);
    let (level, format) = match &config {
        Ok(config) => (config.logging.level.clone(), config.logging.format),
        Err(_) => ("info".to_string(), LogFormat::Text),
    };
    let level = args
        .log_level
        .map(|level| level.as_str().to_string())
        .unwrap_or(level);
    init_logging(&level, format);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, path = %args.config.display(), "Cannot start");
            process::exit(FATAL_EXIT_CODE);
        }
    };

    match run(&args, &config) {
        Ok(status) => process::exit(status.exit_code()),
        Err(e) => {
            error!(error = %e, "Fatal error");
            process::exit(FATAL_EXIT_CODE);
        }
    }
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn run(args: &cli::CliArgs, config: &Config) -> Result<OutcomeStatus, PayoutError> {
    let currencies = config.select_currencies(args.currency.as_deref())?;
    if currencies.is_empty() {
        warn!("No enabled currencies configured");
        return Ok(OutcomeStatus::NoOp);
    }

    let authority = HttpAuthority::new(&config.remote)?;
    let stdout = std::io::stdout();
    let mut output = stdout.lock();

    let mut status = OutcomeStatus::NoOp;
    for currency in currencies {
        let outcome = run_currency(args, currency, &authority, &mut output)?;
        info!(
            currency = %currency.currency_code,
            command = args.command.name(),
            status = %outcome.status,
            "{}",
            outcome.summary
        );
        status = status.worst(outcome.status);
    }
    Ok(status)
}

fn run_currency(
    args: &cli::CliArgs,
    currency: &CurrencyConfig,
    authority: &dyn RemoteAuthority,
    output: &mut dyn Write,
) -> Result<Outcome, PayoutError> {
    let path = currency.store_path();
    let store = match LedgerStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            error!(currency = %currency.currency_code, path = %path.display(), error = %e, "Cannot open ledger store");
            return Ok(Outcome::failure(format!("cannot open ledger store: {e}")));
        }
    };
    let wallet = RpcWallet::new(&currency.wallet)?;

    let ctx = PayoutContext {
        currency,
        store: &store,
        wallet: &wallet,
        authority,
        simulate: args.simulate,
    };
    dispatch(&args.command, &ctx, output)
}
