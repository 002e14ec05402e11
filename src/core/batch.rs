//! Batch planning
//!
//! Turns a set of locked obligations into the outputs of one wallet
//! transaction. Planning is a pure function: it does not touch the store or
//! the wallet, so the disbursement engine can plan, inspect the result, and
//! only then decide what to unlock, commit and submit.

use crate::types::{ExcludedAddress, ExclusionReason, Obligation, ObligationId, PayoutError};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;

/// Per-currency limits applied while planning a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Outputs below this amount are held back for a later cycle
    pub minimum_output: Decimal,
    /// Most outputs one transaction may carry
    pub max_outputs: usize,
    /// Fractional digits of the smallest unit the wallet can send
    pub decimal_places: u32,
}

/// One output of the planned transaction and the obligations it pays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub address: String,
    pub amount: Decimal,
    pub obligations: Vec<ObligationId>,
}

/// Result of planning: the outputs to send and the addresses held back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    /// Surviving outputs in address order
    pub outputs: Vec<PlannedOutput>,
    /// Excluded addresses paired with the obligations to unlock
    pub excluded: Vec<(ExcludedAddress, Vec<ObligationId>)>,
}

impl BatchPlan {
    /// Sum of all surviving outputs
    pub fn total(&self) -> Result<Decimal, PayoutError> {
        self.outputs.iter().try_fold(Decimal::ZERO, |acc, output| {
            acc.checked_add(output.amount)
                .ok_or_else(|| PayoutError::arithmetic_overflow(&output.address))
        })
    }

    /// Address → amount map handed to the wallet
    pub fn wallet_outputs(&self) -> BTreeMap<String, Decimal> {
        self.outputs
            .iter()
            .map(|output| (output.address.clone(), output.amount))
            .collect()
    }

    /// Ids of every obligation paid by the surviving outputs
    pub fn members(&self) -> Vec<ObligationId> {
        self.outputs
            .iter()
            .flat_map(|output| output.obligations.iter().copied())
            .collect()
    }

    /// Ids of every obligation held back
    pub fn excluded_members(&self) -> Vec<ObligationId> {
        self.excluded
            .iter()
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Group obligations by destination address and apply the batch policy.
///
/// Addresses are visited in sorted order so the same input always produces
/// the same plan. Each address total is rounded to `decimal_places` before it
/// is compared with the minimum output.
///
/// # Errors
///
/// Returns [`PayoutError::ArithmeticOverflow`] if an address total does not
/// fit in a decimal.
pub fn plan_batch(obligations: &[Obligation], policy: &BatchPolicy) -> Result<BatchPlan, PayoutError> {
    let mut grouped: BTreeMap<&str, (Decimal, Vec<ObligationId>)> = BTreeMap::new();
    for obligation in obligations {
        let entry = grouped
            .entry(obligation.destination_address.as_str())
            .or_insert_with(|| (Decimal::ZERO, Vec::new()));
        entry.0 = entry
            .0
            .checked_add(obligation.amount)
            .ok_or_else(|| PayoutError::arithmetic_overflow(&obligation.destination_address))?;
        entry.1.push(obligation.id);
    }

    let mut plan = BatchPlan::default();
    for (address, (sum, ids)) in grouped {
        let amount = sum
            .round_dp_with_strategy(policy.decimal_places, RoundingStrategy::MidpointAwayFromZero)
            .normalize();

        let reason = if amount < policy.minimum_output || amount.is_zero() {
            Some(ExclusionReason::BelowMinimumOutput)
        } else if plan.outputs.len() >= policy.max_outputs {
            Some(ExclusionReason::OutputLimitReached)
        } else {
            None
        };

        match reason {
            Some(reason) => plan.excluded.push((
                ExcludedAddress {
                    address: address.to_string(),
                    amount,
                    reason,
                },
                ids,
            )),
            None => plan.outputs.push(PlannedOutput {
                address: address.to_string(),
                amount,
                obligations: ids,
            }),
        }
    }

    Ok(plan)
}
