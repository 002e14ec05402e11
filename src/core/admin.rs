//! Administrative operations
//!
//! Operator overrides for obligations stuck after an ambiguous submission,
//! a full store rebuild, and read-only CSV dumps of the ledger.

use crate::core::ledger_store::LedgerSession;
use crate::core::operation::PayoutContext;
use crate::io::write_obligations_csv;
use crate::types::{
    AdminReport, Obligation, ObligationId, ObligationState, Outcome, OutcomeStatus, PayoutError,
};
use chrono::Utc;
use std::io::Write;
use tracing::{info, warn};

/// Drop the lock on every LOCKED obligation of the currency.
///
/// Only for use once the operator has established that the locked batch was
/// never paid; the obligations become payable again.
pub fn reset_all_locked(ctx: &PayoutContext<'_>) -> Result<Outcome<AdminReport>, PayoutError> {
    ctx.guarded("reset_all_locked", |session| {
        let code = ctx.code();
        let locked = session.select(|o| o.state() == ObligationState::Locked && o.currency == code)?;
        if locked.is_empty() {
            return Ok(Outcome::no_op("No locked obligations"));
        }

        let report = AdminReport {
            affected: locked.len(),
        };
        for mut obligation in locked {
            obligation.force_unlock()?;
            warn!(id = %obligation.id, external_id = %obligation.external_id, "Force-unlocked obligation");
            session.update(obligation);
        }

        if ctx.simulate {
            return Ok(Outcome::new(
                OutcomeStatus::NoOp,
                format!("Would unlock {} obligations", report.affected),
                report,
            ));
        }
        session.commit()?;
        Ok(Outcome::success(
            format!("Unlocked {} obligations", report.affected),
            report,
        ))
    })
}

/// Wipe the store so it can be rebuilt from an empty state
pub fn init_db(ctx: &PayoutContext<'_>) -> Result<Outcome<AdminReport>, PayoutError> {
    ctx.guarded("init_db", |session| {
        let report = AdminReport {
            affected: session.all()?.len(),
        };
        if ctx.simulate {
            return Ok(Outcome::new(
                OutcomeStatus::NoOp,
                format!("Would remove {} obligations", report.affected),
                report,
            ));
        }
        session.reset();
        session.commit()?;
        warn!(removed = report.affected, "Ledger store reset");
        Ok(Outcome::success(
            format!("Store reset, {} obligations removed", report.affected),
            report,
        ))
    })
}

/// Record `transaction_id` as the payment of one LOCKED obligation
pub fn local_associate_locked(
    ctx: &PayoutContext<'_>,
    id: ObligationId,
    transaction_id: &str,
) -> Result<Outcome<AdminReport>, PayoutError> {
    ctx.guarded("local_associate_locked", |session| {
        let Some(mut obligation) = session.get(id)? else {
            return Ok(Outcome::failure(format!("No obligation with id {id}")));
        };
        if obligation.currency != ctx.code() {
            return Ok(Outcome::failure(format!(
                "Obligation {id} belongs to {}, not {}",
                obligation.currency,
                ctx.code()
            )));
        }

        obligation.assign_transaction(transaction_id, Utc::now())?;
        session.update(obligation);
        finish_assignment(ctx, session, transaction_id, 1)
    })
}

/// Record `transaction_id` as the payment of every LOCKED obligation of the
/// currency
pub fn local_associate_all_locked(
    ctx: &PayoutContext<'_>,
    transaction_id: &str,
) -> Result<Outcome<AdminReport>, PayoutError> {
    ctx.guarded("local_associate_all_locked", |session| {
        let code = ctx.code();
        let locked = session.select(|o| o.state() == ObligationState::Locked && o.currency == code)?;
        if locked.is_empty() {
            return Ok(Outcome::no_op("No locked obligations"));
        }

        let now = Utc::now();
        let count = locked.len();
        for mut obligation in locked {
            obligation.assign_transaction(transaction_id, now)?;
            session.update(obligation);
        }
        finish_assignment(ctx, session, transaction_id, count)
    })
}

fn finish_assignment(
    ctx: &PayoutContext<'_>,
    session: &mut LedgerSession<'_>,
    transaction_id: &str,
    count: usize,
) -> Result<Outcome<AdminReport>, PayoutError> {
    let report = AdminReport { affected: count };
    if ctx.simulate {
        return Ok(Outcome::new(
            OutcomeStatus::NoOp,
            format!("Would assign {transaction_id} to {count} locked obligations"),
            report,
        ));
    }
    session.commit()?;
    info!(txid = %transaction_id, obligations = count, "Assigned transaction to locked obligations");
    Ok(Outcome::success(
        format!("Assigned {transaction_id} to {count} obligations"),
        report,
    ))
}

/// Write every obligation that is not yet fully reconciled, grouped as
/// `unpaid_locked`, `paid_unassociated` and `unpaid_unlocked`
pub fn dump_incomplete(
    ctx: &PayoutContext<'_>,
    output: &mut dyn Write,
) -> Result<Outcome<AdminReport>, PayoutError> {
    ctx.guarded("dump_incomplete", |session| {
        let code = ctx.code();
        let all = session.select(|o| o.currency == code)?;

        let mut rows: Vec<(&str, &Obligation)> = Vec::new();
        for (section, state) in [
            ("unpaid_locked", ObligationState::Locked),
            ("paid_unassociated", ObligationState::Paid),
            ("unpaid_unlocked", ObligationState::Pulled),
        ] {
            rows.extend(all.iter().filter(|o| o.state() == state).map(|o| (section, o)));
        }

        write_dump(&rows, output)
    })
}

/// Write every paid and associated obligation
pub fn dump_complete(
    ctx: &PayoutContext<'_>,
    output: &mut dyn Write,
) -> Result<Outcome<AdminReport>, PayoutError> {
    ctx.guarded("dump_complete", |session| {
        let code = ctx.code();
        let complete =
            session.select(|o| o.currency == code && o.state() == ObligationState::Associated)?;
        let rows: Vec<(&str, &Obligation)> = complete.iter().map(|o| ("complete", o)).collect();
        write_dump(&rows, output)
    })
}

fn write_dump(
    rows: &[(&str, &Obligation)],
    output: &mut dyn Write,
) -> Result<Outcome<AdminReport>, PayoutError> {
    write_obligations_csv(rows, output).map_err(PayoutError::output)?;
    Ok(Outcome::success(
        format!("Listed {} obligations", rows.len()),
        AdminReport { affected: rows.len() },
    ))
}
