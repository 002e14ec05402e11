//! Core reconciliation module
//!
//! This module contains the payout lifecycle components:
//! - `ledger_store` - Durable obligation store with exclusive sessions
//! - `traits` - Collaborator interfaces for the remote authority and wallet
//! - `operation` - Operation boundary and per-currency context
//! - `address` - Destination address validation
//! - `batch` - Pure batch planning
//! - `intake` - Pulling obligations
//! - `disbursement` - Paying obligations and classifying the outcome
//! - `association` - Reporting transaction ids and fees
//! - `confirmation` - Reporting confirmation depth
//! - `admin` - Operator overrides and dumps

pub mod address;
pub mod admin;
pub mod association;
pub mod batch;
pub mod confirmation;
pub mod disbursement;
pub mod intake;
pub mod ledger_store;
pub mod operation;
pub mod traits;

pub use batch::{plan_batch, BatchPlan, BatchPolicy, PlannedOutput};
pub use ledger_store::{LedgerSession, LedgerStore, StoreError};
pub use operation::{run_guarded, PayoutContext};
pub use traits::{
    Association, ObligationCandidate, RemoteAuthority, SentTransaction, Wallet, WalletTransaction,
};
