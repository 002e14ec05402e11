//! Error types for the payout reconciler
//!
//! Every failure the reconciler can hit is one variant of [`PayoutError`].
//! The operation boundary (see `core::operation`) catches all of them except
//! the fatal class and turns them into a failed outcome, so an invoking
//! scheduler only ever sees a definite result.
//!
//! # Error Categories
//!
//! - **Transport**: remote authority or wallet unreachable, timed out, or
//!   answered with a non-success status. Safe to retry next cycle.
//! - **Untrusted**: a remote response failed signature or freshness checks.
//!   Treated exactly like a transport failure.
//! - **Store**: the embedded ledger store failed. Uncommitted work is rolled back.
//! - **Validation**: a single pulled obligation is malformed and was rejected.
//! - **Unrecoverable**: the store failed while recording the outcome of a
//!   wallet submission. No automatic recovery exists; this one propagates.

use super::obligation::{ObligationId, ObligationState};
use std::fmt;
use thiserror::Error;

/// External collaborator a transport failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    RemoteAuthority,
    Wallet,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::RemoteAuthority => f.write_str("remote authority"),
            Service::Wallet => f.write_str("wallet"),
        }
    }
}

/// Main error type for the payout reconciler
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayoutError {
    /// A collaborator could not be reached or did not answer in time
    #[error("{service} transport failure: {message}")]
    Transport {
        /// Which collaborator failed
        service: Service,
        /// Description of the failure
        message: String,
    },

    /// A response failed signature or freshness checks
    #[error("Untrusted response from remote authority: {message}")]
    Untrusted {
        /// Why the payload was rejected
        message: String,
    },

    /// The wallet daemon answered with an RPC error object
    #[error("Wallet RPC error {code}: {message}")]
    WalletRpc {
        /// Daemon error code
        code: i64,
        /// Daemon error message
        message: String,
    },

    /// The local ledger store failed
    #[error("Ledger store error: {message}")]
    Store {
        /// Description of the storage failure
        message: String,
    },

    /// A pulled obligation was rejected
    #[error("Invalid obligation {external_id}: {reason}")]
    Validation {
        /// Remote identifier of the rejected obligation
        external_id: String,
        /// Why it was rejected
        reason: String,
    },

    /// A lifecycle transition was attempted from the wrong state
    #[error("Obligation {id} cannot {operation} while {from}")]
    InvalidTransition {
        /// Local id of the obligation
        id: ObligationId,
        /// State the obligation was in
        from: ObligationState,
        /// Transition that was refused
        operation: String,
    },

    /// Decimal arithmetic would overflow
    #[error("Arithmetic overflow while summing payouts to {address}")]
    ArithmeticOverflow {
        /// Destination address being aggregated
        address: String,
    },

    /// Configuration is missing or invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// A report could not be written
    #[error("Report output failed: {message}")]
    Output {
        /// Description of the write failure
        message: String,
    },

    /// The store failed while recording a submission outcome
    #[error("Unrecoverable failure recording disbursement outcome: {message}")]
    Unrecoverable {
        /// Description, including any transaction id that was sent
        message: String,
    },
}

impl PayoutError {
    /// Only failures while classifying a submission escape the operation boundary
    pub fn is_fatal(&self) -> bool {
        matches!(self, PayoutError::Unrecoverable { .. })
    }

    /// Create a Transport error
    pub fn transport(service: Service, message: impl Into<String>) -> Self {
        PayoutError::Transport {
            service,
            message: message.into(),
        }
    }

    /// Create an Untrusted error
    pub fn untrusted(message: impl Into<String>) -> Self {
        PayoutError::Untrusted {
            message: message.into(),
        }
    }

    /// Create a Store error
    pub fn store(message: impl Into<String>) -> Self {
        PayoutError::Store {
            message: message.into(),
        }
    }

    /// Create a Validation error
    pub fn validation(external_id: &str, reason: impl Into<String>) -> Self {
        PayoutError::Validation {
            external_id: external_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidTransition error
    pub fn invalid_transition(id: ObligationId, from: ObligationState, operation: &str) -> Self {
        PayoutError::InvalidTransition {
            id,
            from,
            operation: operation.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(address: &str) -> Self {
        PayoutError::ArithmeticOverflow {
            address: address.to_string(),
        }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        PayoutError::Config {
            message: message.into(),
        }
    }

    /// Create an Output error
    pub fn output(message: impl Into<String>) -> Self {
        PayoutError::Output {
            message: message.into(),
        }
    }

    /// Create an Unrecoverable error
    pub fn unrecoverable(message: impl Into<String>) -> Self {
        PayoutError::Unrecoverable {
            message: message.into(),
        }
    }
}
