//! I/O module
//!
//! Implementations of the collaborator traits and report output.
//!
//! # Components
//!
//! - `envelope` - Signed, timestamped envelope codec
//! - `authority_client` - HTTP client for the remote authority
//! - `wallet_rpc` - JSON-RPC client for the wallet daemon
//! - `csv_format` - CSV ledger dumps

pub mod authority_client;
pub mod csv_format;
pub mod envelope;
pub mod wallet_rpc;

#[cfg(test)]
mod stub_http;

pub use authority_client::HttpAuthority;
pub use csv_format::write_obligations_csv;
pub use envelope::{EnvelopeError, EnvelopeSigner};
pub use wallet_rpc::RpcWallet;
