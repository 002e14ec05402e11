//! Obligation record and lifecycle
//!
//! An obligation is a single payout owed to one payee at one destination
//! address, mirrored locally from the remote authority. Its lifecycle only
//! moves forward:
//!
//! ```text
//! PULLED ──lock──▶ LOCKED ──mark_paid──▶ PAID ──mark_associated──▶ ASSOCIATED
//!    ▲               │
//!    └─release_lock──┘
//! ```
//!
//! Every transition is a method on [`Obligation`] that refuses to run from the
//! wrong state, so no caller can regress a paid or associated record.

use super::error::PayoutError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local surrogate key of an obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObligationId(pub u64);

impl ObligationId {
    /// Big-endian key bytes, so sled iterates in id order
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode a key produced by [`ObligationId::to_key`]
    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 8] = bytes.try_into().ok()?;
        Some(ObligationId(u64::from_be_bytes(arr)))
    }
}

impl fmt::Display for ObligationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derived lifecycle state of an obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObligationState {
    /// Pulled from the remote authority, waiting for a disbursement cycle
    Pulled,
    /// Part of an in-flight disbursement attempt
    Locked,
    /// Paid by a wallet transaction, not yet acknowledged remotely
    Paid,
    /// Transaction id and fee acknowledged by the remote authority
    Associated,
}

impl fmt::Display for ObligationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObligationState::Pulled => "pulled",
            ObligationState::Locked => "locked",
            ObligationState::Paid => "paid",
            ObligationState::Associated => "associated",
        };
        f.write_str(name)
    }
}

/// A freshly pulled obligation that has not been given a local id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewObligation {
    pub external_id: String,
    pub payee: String,
    pub destination_address: String,
    pub currency: String,
    pub amount: Decimal,
    pub pulled_at: DateTime<Utc>,
}

impl NewObligation {
    /// Attach the surrogate key assigned by the store
    pub fn into_obligation(self, id: ObligationId) -> Obligation {
        Obligation {
            id,
            external_id: self.external_id,
            payee: self.payee,
            destination_address: self.destination_address,
            currency: self.currency,
            amount: self.amount,
            transaction_id: None,
            locked: false,
            associated: false,
            pulled_at: self.pulled_at,
            locked_at: None,
            paid_at: None,
            associated_at: None,
        }
    }
}

/// Persisted obligation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: ObligationId,

    /// Identifier assigned by the remote authority; unique in the store
    pub external_id: String,

    pub payee: String,
    pub destination_address: String,
    pub currency: String,

    /// Exact amount owed, serialized as a decimal string
    pub amount: Decimal,

    /// Wallet transaction that paid this obligation, set exactly once
    pub transaction_id: Option<String>,

    pub locked: bool,
    pub associated: bool,

    pub pulled_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub associated_at: Option<DateTime<Utc>>,
}

impl Obligation {
    /// Current lifecycle state, derived from the flags
    pub fn state(&self) -> ObligationState {
        if self.associated {
            ObligationState::Associated
        } else if self.locked {
            ObligationState::Locked
        } else if self.transaction_id.is_some() {
            ObligationState::Paid
        } else {
            ObligationState::Pulled
        }
    }

    /// Eligible for the next disbursement cycle
    pub fn is_payable(&self) -> bool {
        self.state() == ObligationState::Pulled
    }

    /// Paid and waiting to be reported to the remote authority
    pub fn is_awaiting_association(&self) -> bool {
        self.state() == ObligationState::Paid
    }

    fn require(&self, expected: ObligationState, operation: &str) -> Result<(), PayoutError> {
        let state = self.state();
        if state != expected {
            return Err(PayoutError::invalid_transition(self.id, state, operation));
        }
        Ok(())
    }

    /// PULLED → LOCKED
    pub fn lock(&mut self, now: DateTime<Utc>) -> Result<(), PayoutError> {
        self.require(ObligationState::Pulled, "lock")?;
        self.locked = true;
        self.locked_at = Some(now);
        Ok(())
    }

    /// LOCKED → PULLED, only while no transaction id has been recorded
    pub fn release_lock(&mut self) -> Result<(), PayoutError> {
        self.require(ObligationState::Locked, "release_lock")?;
        if self.transaction_id.is_some() {
            return Err(PayoutError::invalid_transition(
                self.id,
                self.state(),
                "release_lock",
            ));
        }
        self.locked = false;
        self.locked_at = None;
        Ok(())
    }

    /// LOCKED → PAID
    pub fn mark_paid(&mut self, transaction_id: &str, now: DateTime<Utc>) -> Result<(), PayoutError> {
        self.require(ObligationState::Locked, "mark_paid")?;
        if self.transaction_id.is_some() {
            return Err(PayoutError::invalid_transition(self.id, self.state(), "mark_paid"));
        }
        self.transaction_id = Some(transaction_id.to_string());
        self.paid_at = Some(now);
        self.locked = false;
        Ok(())
    }

    /// PAID → ASSOCIATED
    pub fn mark_associated(&mut self, now: DateTime<Utc>) -> Result<(), PayoutError> {
        self.require(ObligationState::Paid, "mark_associated")?;
        self.associated = true;
        self.associated_at = Some(now);
        Ok(())
    }

    /// Operator override: drop the lock of an obligation stuck in LOCKED.
    ///
    /// Without a transaction id the obligation becomes payable again; with one
    /// it becomes PAID.
    pub fn force_unlock(&mut self) -> Result<(), PayoutError> {
        self.require(ObligationState::Locked, "force_unlock")?;
        self.locked = false;
        if self.transaction_id.is_none() {
            self.locked_at = None;
        }
        Ok(())
    }

    /// Operator override: record the transaction that is known to have paid a
    /// locked obligation. LOCKED → PAID.
    pub fn assign_transaction(
        &mut self,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PayoutError> {
        self.require(ObligationState::Locked, "assign_transaction")?;
        self.mark_paid(transaction_id, now)
    }
}
