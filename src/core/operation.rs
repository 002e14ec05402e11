//! Operation boundary
//!
//! Every operation runs through [`run_guarded`]: it opens a tracing span for
//! the operation, takes the exclusive store session, runs the body, and turns
//! any non-fatal error into a `Failure` outcome after discarding whatever the
//! body staged but did not commit. Only [`PayoutError::Unrecoverable`] gets
//! past this boundary.

use crate::config::CurrencyConfig;
use crate::core::ledger_store::{LedgerSession, LedgerStore};
use crate::core::traits::{RemoteAuthority, Wallet};
use crate::types::{Outcome, OutcomeStatus, PayoutError};
use tracing::{error, info, info_span, warn};

/// Everything an operation needs for one currency
///
/// Built once per currency at process start and passed by reference into
/// each operation.
#[derive(Clone, Copy)]
pub struct PayoutContext<'a> {
    pub currency: &'a CurrencyConfig,
    pub store: &'a LedgerStore,
    pub wallet: &'a dyn Wallet,
    pub authority: &'a dyn RemoteAuthority,
    /// Read and report only: no commits, no wallet sends, no remote pushes
    pub simulate: bool,
}

impl<'a> PayoutContext<'a> {
    pub fn code(&self) -> &'a str {
        &self.currency.currency_code
    }

    /// [`run_guarded`] with this context's store, currency and simulate flag
    pub fn guarded<R, F>(&self, operation: &'static str, body: F) -> Result<Outcome<R>, PayoutError>
    where
        R: Default,
        F: FnOnce(&mut LedgerSession<'_>) -> Result<Outcome<R>, PayoutError>,
    {
        run_guarded(self.store, operation, self.code(), self.simulate, body)
    }
}

/// Run `body` inside an exclusive store session.
///
/// - `Ok` outcomes are logged; anything still staged is discarded.
/// - Non-fatal errors are rolled back, logged and returned as a `Failure`
///   outcome whose summary carries the error.
/// - Fatal errors are logged and returned as `Err`.
pub fn run_guarded<R, F>(
    store: &LedgerStore,
    operation: &'static str,
    currency: &str,
    simulate: bool,
    body: F,
) -> Result<Outcome<R>, PayoutError>
where
    R: Default,
    F: FnOnce(&mut LedgerSession<'_>) -> Result<Outcome<R>, PayoutError>,
{
    let span = info_span!("operation", operation, currency, simulate);
    let _entered = span.enter();

    let mut session = match store.begin() {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Could not acquire ledger store");
            return Ok(Outcome::failure(format!("{operation} failed: {e}")));
        }
    };

    match body(&mut session) {
        Ok(outcome) => {
            if session.has_pending() {
                session.rollback();
            }
            match outcome.status {
                OutcomeStatus::Success | OutcomeStatus::NoOp => {
                    info!(status = %outcome.status, "{}", outcome.summary)
                }
                OutcomeStatus::Failure => warn!(status = %outcome.status, "{}", outcome.summary),
                OutcomeStatus::ManualIntervention => {
                    error!(status = %outcome.status, "{}", outcome.summary)
                }
            }
            Ok(outcome)
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Operation aborted with unrecoverable error");
            Err(e)
        }
        Err(e) => {
            session.rollback();
            warn!(error = %e, "Operation failed, staged changes rolled back");
            Ok(Outcome::failure(format!("{operation} failed: {e}")))
        }
    }
}
