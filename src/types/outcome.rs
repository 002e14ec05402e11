//! Operation outcomes
//!
//! Every operation ends in an [`Outcome`]: a status, a one-line summary for
//! operators, and a typed report of what happened.

use super::obligation::ObligationId;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

/// Final status of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The operation did its work
    Success,
    /// Nothing to do, or the work was simulated
    NoOp,
    /// The operation failed in a way the next cycle can retry
    Failure,
    /// Funds may have moved without a recorded transaction id; obligations
    /// stay locked until an operator resolves them
    ManualIntervention,
}

impl OutcomeStatus {
    /// Process exit code for this status
    pub fn exit_code(self) -> i32 {
        match self {
            OutcomeStatus::Success | OutcomeStatus::NoOp => 0,
            OutcomeStatus::Failure => 1,
            OutcomeStatus::ManualIntervention => 2,
        }
    }

    /// The more severe of two statuses
    pub fn worst(self, other: OutcomeStatus) -> OutcomeStatus {
        fn rank(status: OutcomeStatus) -> u8 {
            match status {
                OutcomeStatus::NoOp => 0,
                OutcomeStatus::Success => 1,
                OutcomeStatus::Failure => 2,
                OutcomeStatus::ManualIntervention => 3,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::NoOp => "no-op",
            OutcomeStatus::Failure => "failure",
            OutcomeStatus::ManualIntervention => "manual intervention required",
        };
        f.write_str(name)
    }
}

/// Result of one operation together with its typed report
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<R = ()> {
    pub status: OutcomeStatus,
    pub summary: String,
    pub report: R,
}

impl<R> Outcome<R> {
    pub fn new(status: OutcomeStatus, summary: impl Into<String>, report: R) -> Self {
        Outcome {
            status,
            summary: summary.into(),
            report,
        }
    }

    pub fn success(summary: impl Into<String>, report: R) -> Self {
        Self::new(OutcomeStatus::Success, summary, report)
    }

    /// Drop the typed report, keeping status and summary
    pub fn into_untyped(self) -> Outcome {
        Outcome {
            status: self.status,
            summary: self.summary,
            report: (),
        }
    }
}

impl<R: Default> Outcome<R> {
    pub fn no_op(summary: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::NoOp, summary, R::default())
    }

    pub fn failure(summary: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Failure, summary, R::default())
    }
}

/// What an intake pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeReport {
    pub inserted: usize,
    pub repeated: usize,
    pub invalid: usize,
}

/// An address left out of a disbursement batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedAddress {
    pub address: String,
    pub amount: Decimal,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    BelowMinimumOutput,
    OutputLimitReached,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::BelowMinimumOutput => f.write_str("below minimum output"),
            ExclusionReason::OutputLimitReached => f.write_str("output limit reached"),
        }
    }
}

/// What a disbursement cycle did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisbursementReport {
    /// Wallet transaction id, present only after a successful send
    pub transaction_id: Option<String>,
    /// Amount sent (or planned) per destination address
    pub outputs: BTreeMap<String, Decimal>,
    pub total: Decimal,
    /// Fee reported by the wallet right after the send, when available
    pub fee: Option<Decimal>,
    /// Obligations moved to PAID by this cycle
    pub finalized: Vec<ObligationId>,
    /// Obligations still LOCKED after an ambiguous submission failure
    pub stuck: Vec<ObligationId>,
    pub excluded: Vec<ExcludedAddress>,
}

/// What an association pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationReport {
    /// Transaction ids acknowledged, with the number of obligations in each
    pub associated: BTreeMap<String, usize>,
    /// Transaction ids whose fee lookup failed
    pub skipped: Vec<String>,
    /// Transaction ids the remote authority refused or could not be told about
    pub rejected: Vec<String>,
}

/// What a confirmation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationReport {
    pub checked: usize,
    pub confirmed: Vec<String>,
    pub pending: Vec<String>,
    /// Transaction ids the wallet could not look up
    pub failed_lookups: Vec<String>,
}

/// What an administrative command touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminReport {
    pub affected: usize,
}
