//! Disbursement engine
//!
//! One cycle pays every payable obligation of a currency with a single
//! wallet transaction:
//!
//! 1. probe the wallet; bail out untouched if it is down
//! 2. select payable obligations and lock them
//! 3. plan the batch, unlocking addresses that are held back
//! 4. check the balance covers the total
//! 5. commit the locks, then submit
//! 6. classify the submission outcome
//!
//! The locks are durable before `sendmany` is called, so a crash between the
//! send and the response leaves the batch LOCKED rather than payable.
//!
//! When the send fails the balance is read again. An unchanged balance means
//! nothing left the wallet and the batch is released for the next cycle. Any
//! other answer (a different balance, or no answer at all) means funds may
//! have moved: the batch stays locked and the outcome is
//! [`OutcomeStatus::ManualIntervention`].

use crate::core::batch::{plan_batch, BatchPlan};
use crate::core::ledger_store::LedgerSession;
use crate::core::operation::PayoutContext;
use crate::core::traits::SentTransaction;
use crate::types::{DisbursementReport, Obligation, ObligationId, Outcome, OutcomeStatus, PayoutError};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

/// Run one disbursement cycle for the context's currency
pub fn run_disbursement(ctx: &PayoutContext<'_>) -> Result<Outcome<DisbursementReport>, PayoutError> {
    ctx.guarded("payout", |session| disburse(ctx, session))
}

fn disburse(
    ctx: &PayoutContext<'_>,
    session: &mut LedgerSession<'_>,
) -> Result<Outcome<DisbursementReport>, PayoutError> {
    ctx.wallet.probe()?;

    let code = ctx.code();
    let payable = session.select(|o| o.is_payable() && o.currency == code)?;
    if payable.is_empty() {
        return Ok(Outcome::no_op("No payable obligations"));
    }

    let now = Utc::now();
    for obligation in &payable {
        let mut locked = obligation.clone();
        locked.lock(now)?;
        session.update(locked);
    }

    let plan = plan_batch(&payable, &ctx.currency.batch_policy())?;
    for (excluded, ids) in &plan.excluded {
        info!(
            address = %excluded.address,
            amount = %excluded.amount,
            reason = %excluded.reason,
            obligations = ids.len(),
            "Holding back output for a later cycle"
        );
    }
    for id in plan.excluded_members() {
        let mut obligation = load(session, id)?;
        obligation.release_lock()?;
        session.update(obligation);
    }

    let mut report = DisbursementReport {
        outputs: plan.wallet_outputs(),
        total: plan.total()?,
        excluded: plan.excluded.iter().map(|(e, _)| e.clone()).collect(),
        ..Default::default()
    };

    if report.total.is_zero() {
        session.rollback();
        return Ok(Outcome::new(
            OutcomeStatus::NoOp,
            format!(
                "No output reaches the minimum of {}",
                ctx.currency.minimum_tx_output
            ),
            report,
        ));
    }

    let account = ctx.currency.wallet.account.as_str();
    let balance = ctx.wallet.get_balance(account)?;
    if balance < report.total {
        session.rollback();
        return Ok(Outcome::new(
            OutcomeStatus::Failure,
            format!(
                "Insufficient funds: balance {} is below payout total {}",
                balance, report.total
            ),
            report,
        ));
    }

    if ctx.simulate {
        session.rollback();
        for (address, amount) in &report.outputs {
            info!(%address, %amount, "Would send");
        }
        let summary = format!(
            "Simulated payout of {} to {} addresses",
            report.total,
            report.outputs.len()
        );
        return Ok(Outcome::new(OutcomeStatus::NoOp, summary, report));
    }

    session.commit()?;
    debug!(
        outputs = report.outputs.len(),
        total = %report.total,
        "Batch locked, submitting"
    );

    let members = plan.members();
    match ctx.wallet.send_many(account, &report.outputs) {
        Ok(sent) => finalize(session, &plan, sent, report),
        Err(err) => classify_failure(ctx, session, &members, balance, err, report),
    }
}

/// Record the transaction id on every member of the batch
fn finalize(
    session: &mut LedgerSession<'_>,
    plan: &BatchPlan,
    sent: SentTransaction,
    mut report: DisbursementReport,
) -> Result<Outcome<DisbursementReport>, PayoutError> {
    let txid = sent.transaction_id;
    let members = plan.members();

    record_paid(session, &members, &txid).map_err(|e| {
        error!(
            alert = "manual_intervention",
            %txid,
            error = %e,
            obligations = ?members,
            "Transaction was sent but could not be recorded; obligations remain locked. \
             Assign it with local-associate-all-locked once the store is healthy"
        );
        PayoutError::unrecoverable(format!(
            "transaction {txid} was sent but could not be recorded: {e}"
        ))
    })?;

    info!(%txid, total = %report.total, obligations = members.len(), "Payout sent");

    report.fee = sent.details.map(|details| details.fee);
    report.finalized = members;
    let summary = format!(
        "Sent {} to {} addresses in {}",
        report.total,
        report.outputs.len(),
        txid
    );
    report.transaction_id = Some(txid);
    Ok(Outcome::success(summary, report))
}

fn record_paid(
    session: &mut LedgerSession<'_>,
    members: &[ObligationId],
    txid: &str,
) -> Result<(), PayoutError> {
    let now = Utc::now();
    for id in members {
        let mut obligation = load(session, *id)?;
        obligation.mark_paid(txid, now)?;
        session.update(obligation);
    }
    session.commit()?;
    Ok(())
}

/// Decide between safe retry and manual intervention after a failed send
fn classify_failure(
    ctx: &PayoutContext<'_>,
    session: &mut LedgerSession<'_>,
    members: &[ObligationId],
    balance_before: Decimal,
    err: PayoutError,
    mut report: DisbursementReport,
) -> Result<Outcome<DisbursementReport>, PayoutError> {
    warn!(error = %err, "Submission failed, checking wallet balance");

    match ctx.wallet.get_balance(&ctx.currency.wallet.account) {
        Ok(balance_after) if balance_after == balance_before => {
            release(session, members).map_err(|e| {
                PayoutError::unrecoverable(format!(
                    "submission failed and the batch could not be released: {e}"
                ))
            })?;
            Ok(Outcome::new(
                OutcomeStatus::Failure,
                format!(
                    "Submission failed with balance unchanged, {} obligations released for retry: {}",
                    members.len(),
                    err
                ),
                report,
            ))
        }
        observed => {
            let balance_after = match &observed {
                Ok(balance) => balance.to_string(),
                Err(e) => format!("unknown ({e})"),
            };
            error!(
                alert = "manual_intervention",
                currency = ctx.code(),
                balance_before = %balance_before,
                balance_after = %balance_after,
                obligations = ?members,
                error = %err,
                "Submission outcome is ambiguous; obligations stay locked. \
                 Inspect with dump-incomplete, then either assign the paying \
                 transaction with local-associate-locked / local-associate-all-locked \
                 or release the batch with reset-all-locked"
            );
            report.stuck = members.to_vec();
            Ok(Outcome::new(
                OutcomeStatus::ManualIntervention,
                format!(
                    "Submission failed and balance moved from {} to {}; {} obligations left locked",
                    balance_before,
                    balance_after,
                    members.len()
                ),
                report,
            ))
        }
    }
}

fn release(session: &mut LedgerSession<'_>, members: &[ObligationId]) -> Result<(), PayoutError> {
    for id in members {
        let mut obligation = load(session, *id)?;
        obligation.release_lock()?;
        session.update(obligation);
    }
    session.commit()?;
    Ok(())
}

fn load(session: &LedgerSession<'_>, id: ObligationId) -> Result<Obligation, PayoutError> {
    session
        .get(id)?
        .ok_or_else(|| PayoutError::store(format!("obligation {id} disappeared from the store")))
}
