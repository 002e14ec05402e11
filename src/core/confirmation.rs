//! Confirmation tracker
//!
//! Bridges confirmation depth from the wallet to the remote authority. The
//! local store is never written; the exclusive session is still held so a
//! confirmation pass does not interleave with other operations.

use crate::core::operation::PayoutContext;
use crate::types::{ConfirmationReport, Outcome, OutcomeStatus, PayoutError};
use tracing::{debug, info, warn};

/// Report every transaction that has passed `min_confirms` confirmations
pub fn confirm_transactions(
    ctx: &PayoutContext<'_>,
) -> Result<Outcome<ConfirmationReport>, PayoutError> {
    ctx.guarded("confirm_trans", |_session| {
        ctx.wallet.probe()?;

        let unconfirmed = ctx.authority.fetch_unconfirmed(ctx.code())?;
        if unconfirmed.is_empty() {
            return Ok(Outcome::no_op("No unconfirmed transactions"));
        }

        let min_confirms = ctx.currency.min_confirms;
        let mut report = ConfirmationReport {
            checked: unconfirmed.len(),
            ..Default::default()
        };
        for txid in unconfirmed {
            match ctx.wallet.get_transaction(&txid) {
                Ok(details) if details.confirmations > min_confirms => {
                    debug!(%txid, confirmations = details.confirmations, "Confirmed");
                    report.confirmed.push(txid);
                }
                Ok(details) => {
                    debug!(%txid, confirmations = details.confirmations, "Still pending");
                    report.pending.push(txid);
                }
                Err(e) => {
                    warn!(%txid, error = %e, "Transaction lookup failed");
                    report.failed_lookups.push(txid);
                }
            }
        }

        let summary = format!(
            "{} of {} transactions confirmed, {} pending, {} lookups failed",
            report.confirmed.len(),
            report.checked,
            report.pending.len(),
            report.failed_lookups.len()
        );
        if report.confirmed.is_empty() {
            return Ok(Outcome::new(OutcomeStatus::NoOp, summary, report));
        }
        if ctx.simulate {
            return Ok(Outcome::new(
                OutcomeStatus::NoOp,
                format!("Simulated confirmation push; {summary}"),
                report,
            ));
        }

        if ctx.authority.push_confirmations(&report.confirmed)? {
            info!(confirmed = report.confirmed.len(), "Confirmations acknowledged");
            Ok(Outcome::success(summary, report))
        } else {
            Ok(Outcome::new(
                OutcomeStatus::Failure,
                format!("Remote authority refused confirmations; {summary}"),
                report,
            ))
        }
    })
}
