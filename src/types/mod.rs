//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `obligation`: the persisted payout obligation and its lifecycle
//! - `outcome`: operation outcomes and per-operation reports
//! - `error`: error taxonomy for the reconciler

pub mod error;
pub mod obligation;
pub mod outcome;

pub use error::{PayoutError, Service};
pub use obligation::{NewObligation, Obligation, ObligationId, ObligationState};
pub use outcome::{
    AdminReport, AssociationReport, ConfirmationReport, DisbursementReport, ExcludedAddress,
    ExclusionReason, IntakeReport, Outcome, OutcomeStatus,
};
