//! Obligation intake
//!
//! Pulls the obligations the remote authority wants paid in one currency and
//! records the new ones locally. Re-running against the same remote result
//! set changes nothing.

use crate::config::CurrencyConfig;
use crate::core::address::is_valid_address;
use crate::core::operation::PayoutContext;
use crate::core::traits::ObligationCandidate;
use crate::types::{IntakeReport, NewObligation, Outcome, OutcomeStatus, PayoutError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Pull obligations from the remote authority into the local store.
///
/// Candidates whose external id is already known are skipped. Malformed
/// candidates are counted and logged but never persisted; they do not stop
/// the rest of the batch.
pub fn pull_obligations(ctx: &PayoutContext<'_>) -> Result<Outcome<IntakeReport>, PayoutError> {
    ctx.guarded("pull_payouts", |session| {
        let candidates = ctx.authority.fetch_obligations(ctx.code())?;
        debug!(candidates = candidates.len(), "Fetched obligations");

        let now = Utc::now();
        let mut report = IntakeReport::default();
        for candidate in candidates {
            // stored ids are trimmed, so compare the trimmed form
            if session.contains_external_id(candidate.external_id.trim())? {
                report.repeated += 1;
                continue;
            }
            match validate_candidate(candidate, ctx.currency, now) {
                Ok(obligation) => {
                    debug!(
                        external_id = %obligation.external_id,
                        address = %obligation.destination_address,
                        amount = %obligation.amount,
                        "Accepted obligation"
                    );
                    session.insert(obligation);
                    report.inserted += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Rejected obligation");
                    report.invalid += 1;
                }
            }
        }

        let summary = format!(
            "{} new, {} already known, {} rejected",
            report.inserted, report.repeated, report.invalid
        );
        if report.inserted == 0 {
            return Ok(Outcome::new(OutcomeStatus::NoOp, summary, report));
        }
        if ctx.simulate {
            session.rollback();
            return Ok(Outcome::new(
                OutcomeStatus::NoOp,
                format!("Simulated pull: {summary}"),
                report,
            ));
        }

        let created = session.commit()?;
        info!(inserted = created.len(), "Recorded new obligations");
        Ok(Outcome::success(summary, report))
    })
}

/// Check one candidate against the currency's rules and build the record to
/// insert.
///
/// # Errors
///
/// [`PayoutError::Validation`] when the external id is empty, the address
/// does not decode to an accepted version, or the amount is not a positive
/// decimal representable in the currency's smallest unit.
pub fn validate_candidate(
    candidate: ObligationCandidate,
    currency: &CurrencyConfig,
    now: DateTime<Utc>,
) -> Result<NewObligation, PayoutError> {
    let external_id = candidate.external_id.trim();
    if external_id.is_empty() {
        return Err(PayoutError::validation("<missing>", "missing external id"));
    }

    if !is_valid_address(&candidate.address, &currency.valid_address_versions) {
        return Err(PayoutError::validation(
            external_id,
            format!("invalid {} address {}", currency.currency_code, candidate.address),
        ));
    }

    let amount = Decimal::from_str(candidate.amount.trim())
        .or_else(|_| Decimal::from_scientific(candidate.amount.trim()))
        .map_err(|_| {
            PayoutError::validation(
                external_id,
                format!("amount '{}' is not a decimal number", candidate.amount),
            )
        })?
        .normalize();

    if amount <= Decimal::ZERO {
        return Err(PayoutError::validation(
            external_id,
            format!("amount {amount} is not positive"),
        ));
    }
    if amount.scale() > currency.decimal_places {
        return Err(PayoutError::validation(
            external_id,
            format!(
                "amount {amount} has more than {} fractional digits",
                currency.decimal_places
            ),
        ));
    }

    Ok(NewObligation {
        external_id: external_id.to_string(),
        payee: candidate.payee,
        destination_address: candidate.address,
        currency: currency.currency_code.clone(),
        amount,
        pulled_at: now,
    })
}
