//! Association reconciler
//!
//! Reports which wallet transaction paid which obligations, and the fee it
//! cost, back to the remote authority. Work is grouped per transaction id and
//! each group is committed on its own once the authority acknowledges it.

use crate::core::operation::PayoutContext;
use crate::core::traits::Association;
use crate::types::{AssociationReport, Obligation, Outcome, OutcomeStatus, PayoutError};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Associate every paid, unreported obligation of the context's currency
pub fn associate_all(ctx: &PayoutContext<'_>) -> Result<Outcome<AssociationReport>, PayoutError> {
    associate_matching(ctx, "associate_all", None)
}

/// Associate only the obligations paid by `transaction_id`
pub fn associate_transaction(
    ctx: &PayoutContext<'_>,
    transaction_id: &str,
) -> Result<Outcome<AssociationReport>, PayoutError> {
    associate_matching(ctx, "associate", Some(transaction_id))
}

fn associate_matching(
    ctx: &PayoutContext<'_>,
    operation: &'static str,
    only: Option<&str>,
) -> Result<Outcome<AssociationReport>, PayoutError> {
    ctx.guarded(operation, |session| {
        let code = ctx.code();
        let awaiting = session.select(|o| {
            o.is_awaiting_association()
                && o.currency == code
                && only.map_or(true, |txid| o.transaction_id.as_deref() == Some(txid))
        })?;
        if awaiting.is_empty() {
            return Ok(Outcome::no_op("No paid obligations awaiting association"));
        }

        let mut groups: BTreeMap<String, Vec<Obligation>> = BTreeMap::new();
        for obligation in awaiting {
            if let Some(txid) = obligation.transaction_id.clone() {
                groups.entry(txid).or_default().push(obligation);
            }
        }

        let mut report = AssociationReport::default();
        let mut simulated = 0usize;
        for (txid, group) in groups {
            let fee = match ctx.wallet.get_transaction(&txid) {
                Ok(details) => details.fee,
                Err(e) => {
                    warn!(%txid, error = %e, "Fee lookup failed, retrying next cycle");
                    report.skipped.push(txid);
                    continue;
                }
            };

            let association = Association {
                transaction_id: txid.clone(),
                external_ids: group.iter().map(|o| o.external_id.clone()).collect(),
                fee,
                currency: code.to_string(),
            };

            if ctx.simulate {
                info!(
                    %txid,
                    %fee,
                    obligations = group.len(),
                    "Would associate transaction"
                );
                simulated += 1;
                continue;
            }

            match ctx.authority.push_association(&association) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(%txid, "Remote authority refused association");
                    report.rejected.push(txid);
                    continue;
                }
                Err(e) => {
                    warn!(%txid, error = %e, "Association push failed, retrying next cycle");
                    report.rejected.push(txid);
                    continue;
                }
            }

            let now = Utc::now();
            let count = group.len();
            for mut obligation in group {
                obligation.mark_associated(now)?;
                session.update(obligation);
            }
            session.commit()?;
            info!(%txid, %fee, obligations = count, "Associated transaction");
            report.associated.insert(txid, count);
        }

        let summary = format!(
            "{} associated, {} skipped, {} rejected",
            report.associated.len(),
            report.skipped.len(),
            report.rejected.len()
        );
        if ctx.simulate {
            return Ok(Outcome::new(
                OutcomeStatus::NoOp,
                format!("Simulated association of {simulated} transactions; {summary}"),
                report,
            ));
        }
        let status = if !report.rejected.is_empty()
            || (report.associated.is_empty() && !report.skipped.is_empty())
        {
            OutcomeStatus::Failure
        } else {
            OutcomeStatus::Success
        };
        Ok(Outcome::new(status, summary, report))
    })
}
