//! Payout Reconciler Library
//! # Overview
//!
//! Reconciles cryptocurrency payouts between a remote authority that decides
//! who is owed what and a wallet daemon that moves the funds, using a local
//! embedded store as the record of what has already been done.
//!
//! # Architecture
//!
//! - [`types`] - Obligation record, error taxonomy, outcomes and reports
//! - [`core`] - Reconciliation components:
//!   - [`core::ledger_store`] - Durable obligation store with exclusive sessions
//!   - [`core::intake`] - Pulling obligations
//!   - [`core::disbursement`] - Paying obligations and classifying the outcome
//!   - [`core::association`] - Reporting transaction ids and fees
//!   - [`core::confirmation`] - Reporting confirmation depth
//!   - [`core::admin`] - Operator overrides and dumps
//! - [`io`] - HTTP and JSON-RPC collaborators, envelope signing, CSV output
//! - [`command`] - Closed set of operations and their dispatcher
//! - [`config`] - TOML configuration
//! - [`cli`] - CLI arguments parsing
//!
//! # Obligation Lifecycle
//!
//! - **Pulled**: recorded locally, waiting for a disbursement cycle
//! - **Locked**: part of an in-flight disbursement
//! - **Paid**: transaction id recorded, not yet reported
//! - **Associated**: transaction id and fee acknowledged remotely
//!
//! A failed submission either returns the batch to Pulled (nothing left the
//! wallet) or leaves it Locked for an operator (funds may have moved).

// Module declarations
pub mod cli;
pub mod command;
pub mod config;
pub mod core;
pub mod io;
pub mod types;

pub use command::{dispatch, Command};
pub use config::{Config, CurrencyConfig};
pub use core::{LedgerStore, PayoutContext, RemoteAuthority, Wallet};
pub use types::{Obligation, ObligationId, ObligationState, Outcome, OutcomeStatus, PayoutError};
