//! Collaborator traits
//!
//! The reconciliation core talks to two external systems it does not own:
//! the remote authority that decides who is owed what, and the wallet daemon
//! that holds funds. Both are reached through these traits so the core can be
//! driven by the HTTP/JSON-RPC clients in production and by scripted doubles
//! in tests.
//!
//! All calls are synchronous and bounded by the implementation's timeout; a
//! timeout surfaces as [`PayoutError::Transport`].

use crate::types::PayoutError;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// An obligation as offered by the remote authority, before validation.
///
/// The amount is kept as the raw text the authority sent so a non-numeric
/// value can be rejected per obligation instead of failing the whole pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationCandidate {
    pub payee: String,
    pub address: String,
    pub amount: String,
    pub external_id: String,
}

/// Association pushed to the remote authority for one wallet transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub transaction_id: String,
    pub external_ids: Vec<String>,
    pub fee: Decimal,
    pub currency: String,
}

/// Wallet view of a transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalletTransaction {
    pub confirmations: u64,
    /// Network fee paid, as a non-negative amount
    pub fee: Decimal,
}

/// Result of a successful multi-output send
#[derive(Debug, Clone, PartialEq)]
pub struct SentTransaction {
    pub transaction_id: String,
    /// Wallet details looked up right after the send, if available
    pub details: Option<WalletTransaction>,
}

/// The system of record for payout obligations
pub trait RemoteAuthority {
    /// Obligations ready to be paid in `currency`
    fn fetch_obligations(&self, currency: &str) -> Result<Vec<ObligationCandidate>, PayoutError>;

    /// Report the transaction and fee that paid a group of obligations.
    /// Returns the authority's acknowledgement flag.
    fn push_association(&self, association: &Association) -> Result<bool, PayoutError>;

    /// Report transactions that reached the confirmation threshold
    fn push_confirmations(&self, transaction_ids: &[String]) -> Result<bool, PayoutError>;

    /// Transaction ids the authority still considers unconfirmed
    fn fetch_unconfirmed(&self, currency: &str) -> Result<Vec<String>, PayoutError>;
}

/// The daemon that holds funds and submits transactions
pub trait Wallet {
    /// Liveness probe
    fn probe(&self) -> Result<(), PayoutError>;

    /// Balance of `account`
    fn get_balance(&self, account: &str) -> Result<Decimal, PayoutError>;

    /// Submit one transaction with an output per address
    fn send_many(
        &self,
        account: &str,
        outputs: &BTreeMap<String, Decimal>,
    ) -> Result<SentTransaction, PayoutError>;

    /// Confirmation depth and fee of a transaction
    fn get_transaction(&self, transaction_id: &str) -> Result<WalletTransaction, PayoutError>;
}
