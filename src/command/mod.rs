//! Command dispatch
//!
//! Every operation the reconciler offers is one variant of [`Command`].
//! [`dispatch`] maps a variant onto its core function and erases the typed
//! report, so the binary only deals with statuses and summaries.

use crate::core::operation::PayoutContext;
use crate::core::{admin, association, confirmation, disbursement, intake};
use crate::types::{ObligationId, Outcome, OutcomeStatus, PayoutError};
use clap::Subcommand;
use std::io::Write;

/// Operations, one per subcommand
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pull new obligations from the remote authority
    PullPayouts,
    /// Pay every payable obligation in one wallet transaction
    Payout,
    /// Report transaction ids and fees for paid obligations
    AssociateAll,
    /// Report the transaction id and fee of one transaction
    Associate {
        /// Wallet transaction id
        txid: String,
    },
    /// Report transactions past the confirmation threshold
    ConfirmTrans,
    /// Unlock every locked obligation (manual override)
    ResetAllLocked,
    /// Wipe the local store
    InitDb,
    /// Write locked, unassociated and unpaid obligations as CSV
    DumpIncomplete,
    /// Write associated obligations as CSV
    DumpComplete,
    /// Assign the transaction that paid one locked obligation
    LocalAssociateLocked {
        /// Local obligation id
        id: u64,
        /// Wallet transaction id
        txid: String,
    },
    /// Assign the transaction that paid every locked obligation
    LocalAssociateAllLocked {
        /// Wallet transaction id
        txid: String,
    },
    /// Pull, pay, associate and confirm in sequence
    Cycle,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::PullPayouts => "pull-payouts",
            Command::Payout => "payout",
            Command::AssociateAll => "associate-all",
            Command::Associate { .. } => "associate",
            Command::ConfirmTrans => "confirm-trans",
            Command::ResetAllLocked => "reset-all-locked",
            Command::InitDb => "init-db",
            Command::DumpIncomplete => "dump-incomplete",
            Command::DumpComplete => "dump-complete",
            Command::LocalAssociateLocked { .. } => "local-associate-locked",
            Command::LocalAssociateAllLocked { .. } => "local-associate-all-locked",
            Command::Cycle => "cycle",
        }
    }
}

/// Run `command` for one currency.
///
/// # Errors
///
/// Only fatal errors are returned; everything else is already folded into
/// the outcome.
pub fn dispatch(
    command: &Command,
    ctx: &PayoutContext<'_>,
    output: &mut dyn Write,
) -> Result<Outcome, PayoutError> {
    let outcome = match command {
        Command::PullPayouts => intake::pull_obligations(ctx)?.into_untyped(),
        Command::Payout => disbursement::run_disbursement(ctx)?.into_untyped(),
        Command::AssociateAll => association::associate_all(ctx)?.into_untyped(),
        Command::Associate { txid } => association::associate_transaction(ctx, txid)?.into_untyped(),
        Command::ConfirmTrans => confirmation::confirm_transactions(ctx)?.into_untyped(),
        Command::ResetAllLocked => admin::reset_all_locked(ctx)?.into_untyped(),
        Command::InitDb => admin::init_db(ctx)?.into_untyped(),
        Command::DumpIncomplete => admin::dump_incomplete(ctx, output)?.into_untyped(),
        Command::DumpComplete => admin::dump_complete(ctx, output)?.into_untyped(),
        Command::LocalAssociateLocked { id, txid } => {
            admin::local_associate_locked(ctx, ObligationId(*id), txid)?.into_untyped()
        }
        Command::LocalAssociateAllLocked { txid } => {
            admin::local_associate_all_locked(ctx, txid)?.into_untyped()
        }
        Command::Cycle => run_cycle(ctx)?,
    };
    Ok(outcome)
}

fn run_cycle(ctx: &PayoutContext<'_>) -> Result<Outcome, PayoutError> {
    let steps = [
        ("pull", intake::pull_obligations(ctx)?.into_untyped()),
        ("payout", disbursement::run_disbursement(ctx)?.into_untyped()),
        ("associate", association::associate_all(ctx)?.into_untyped()),
        ("confirm", confirmation::confirm_transactions(ctx)?.into_untyped()),
    ];

    let status = steps
        .iter()
        .fold(OutcomeStatus::NoOp, |worst, (_, outcome)| worst.worst(outcome.status));
    let summary = steps
        .iter()
        .map(|(step, outcome)| format!("{step}: {}", outcome.summary))
        .collect::<Vec<_>>()
        .join("; ");
    Ok(Outcome::new(status, summary, ()))
}
