//! Shared fixtures for integration tests
//!
//! Scripted in-memory doubles for the wallet and the remote authority, and a
//! harness that wires them to a ledger store in a temporary directory.

#![allow(dead_code)]

use payout_reconciler::config::{Config, CurrencyConfig};
use payout_reconciler::core::{
    Association, LedgerStore, ObligationCandidate, PayoutContext, RemoteAuthority, SentTransaction,
    Wallet, WalletTransaction,
};
use payout_reconciler::types::{Obligation, PayoutError, Service};
use rust_decimal::Decimal;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

pub const ADDR_A: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
pub const ADDR_B: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
pub const ADDR_P2SH: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn candidate(external_id: &str, address: &str, amount: &str) -> ObligationCandidate {
    ObligationCandidate {
        payee: format!("payee-{external_id}"),
        address: address.to_string(),
        amount: amount.to_string(),
        external_id: external_id.to_string(),
    }
}

/// Wallet whose answers are scripted per test
pub struct MockWallet {
    pub probe_error: RefCell<Option<PayoutError>>,
    /// Answers to successive balance lookups; the last one repeats
    balances: RefCell<VecDeque<Result<Decimal, PayoutError>>>,
    send_result: RefCell<Result<String, PayoutError>>,
    transactions: RefCell<HashMap<String, Result<WalletTransaction, PayoutError>>>,
    pub sends: RefCell<Vec<BTreeMap<String, Decimal>>>,
    pub balance_calls: Cell<usize>,
    /// How long `send_many` takes before answering
    pub send_delay: Cell<Duration>,
}

impl MockWallet {
    pub fn new() -> Self {
        MockWallet {
            probe_error: RefCell::new(None),
            balances: RefCell::new(VecDeque::from([Ok(dec("100"))])),
            send_result: RefCell::new(Ok("tx-1".to_string())),
            transactions: RefCell::new(HashMap::new()),
            sends: RefCell::new(Vec::new()),
            balance_calls: Cell::new(0),
            send_delay: Cell::new(Duration::ZERO),
        }
    }

    pub fn script_balances(&self, answers: Vec<Result<Decimal, PayoutError>>) {
        *self.balances.borrow_mut() = answers.into();
    }

    pub fn send_succeeds(&self, txid: &str) {
        *self.send_result.borrow_mut() = Ok(txid.to_string());
    }

    pub fn send_fails(&self, error: PayoutError) {
        *self.send_result.borrow_mut() = Err(error);
    }

    pub fn set_transaction(&self, txid: &str, confirmations: u64, fee: &str) {
        self.transactions.borrow_mut().insert(
            txid.to_string(),
            Ok(WalletTransaction {
                confirmations,
                fee: dec(fee),
            }),
        );
    }

    pub fn fail_transaction(&self, txid: &str) {
        self.transactions.borrow_mut().insert(
            txid.to_string(),
            Err(PayoutError::transport(Service::Wallet, "lookup timed out")),
        );
    }

    pub fn send_count(&self) -> usize {
        self.sends.borrow().len()
    }
}

impl Wallet for MockWallet {
    fn probe(&self) -> Result<(), PayoutError> {
        match self.probe_error.borrow().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn get_balance(&self, _account: &str) -> Result<Decimal, PayoutError> {
        self.balance_calls.set(self.balance_calls.get() + 1);
        let mut balances = self.balances.borrow_mut();
        if balances.len() > 1 {
            balances.pop_front().unwrap()
        } else {
            balances.front().cloned().unwrap_or(Ok(Decimal::ZERO))
        }
    }

    fn send_many(
        &self,
        _account: &str,
        outputs: &BTreeMap<String, Decimal>,
    ) -> Result<SentTransaction, PayoutError> {
        thread::sleep(self.send_delay.get());
        self.sends.borrow_mut().push(outputs.clone());
        let txid = self.send_result.borrow().clone()?;
        let details = self.transactions.borrow().get(&txid).cloned().and_then(Result::ok);
        Ok(SentTransaction {
            transaction_id: txid,
            details,
        })
    }

    fn get_transaction(&self, transaction_id: &str) -> Result<WalletTransaction, PayoutError> {
        self.transactions
            .borrow()
            .get(transaction_id)
            .cloned()
            .unwrap_or_else(|| Err(PayoutError::WalletRpc {
                code: -5,
                message: "Invalid or non-wallet transaction id".to_string(),
            }))
    }
}

/// Remote authority whose answers are scripted per test
pub struct MockAuthority {
    obligations: RefCell<Result<Vec<ObligationCandidate>, PayoutError>>,
    unconfirmed: RefCell<Vec<String>>,
    pub association_ack: Cell<bool>,
    pub confirmation_ack: Cell<bool>,
    /// Association pushes for this txid fail in transport
    pub unreachable_for: RefCell<Option<String>>,
    pub associations: RefCell<Vec<Association>>,
    pub confirmations: RefCell<Vec<Vec<String>>>,
}

impl MockAuthority {
    pub fn new() -> Self {
        MockAuthority {
            obligations: RefCell::new(Ok(Vec::new())),
            unconfirmed: RefCell::new(Vec::new()),
            association_ack: Cell::new(true),
            confirmation_ack: Cell::new(true),
            unreachable_for: RefCell::new(None),
            associations: RefCell::new(Vec::new()),
            confirmations: RefCell::new(Vec::new()),
        }
    }

    pub fn offer(&self, candidates: Vec<ObligationCandidate>) {
        *self.obligations.borrow_mut() = Ok(candidates);
    }

    pub fn fail_fetch(&self, error: PayoutError) {
        *self.obligations.borrow_mut() = Err(error);
    }

    pub fn set_unconfirmed(&self, txids: &[&str]) {
        *self.unconfirmed.borrow_mut() = txids.iter().map(|t| t.to_string()).collect();
    }
}

impl RemoteAuthority for MockAuthority {
    fn fetch_obligations(&self, _currency: &str) -> Result<Vec<ObligationCandidate>, PayoutError> {
        self.obligations.borrow().clone()
    }

    fn push_association(&self, association: &Association) -> Result<bool, PayoutError> {
        if self.unreachable_for.borrow().as_deref() == Some(association.transaction_id.as_str()) {
            return Err(PayoutError::transport(Service::RemoteAuthority, "connection reset"));
        }
        self.associations.borrow_mut().push(association.clone());
        Ok(self.association_ack.get())
    }

    fn push_confirmations(&self, transaction_ids: &[String]) -> Result<bool, PayoutError> {
        self.confirmations.borrow_mut().push(transaction_ids.to_vec());
        Ok(self.confirmation_ack.get())
    }

    fn fetch_unconfirmed(&self, _currency: &str) -> Result<Vec<String>, PayoutError> {
        Ok(self.unconfirmed.borrow().clone())
    }
}

/// Store, currency settings and doubles for one test
pub struct Harness {
    pub store: LedgerStore,
    pub currency: CurrencyConfig,
    pub wallet: MockWallet,
    pub authority: MockAuthority,
    // dropped last, after the store has closed
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_currency_toml("")
    }

    /// Extra `key = value` lines are appended to the currency table
    pub fn with_currency_toml(extra: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let text = format!(
            r#"
            [remote]
            url = "http://authority.invalid"
            signature_secret = "secret"

            [[currencies]]
            currency_code = "BTC"
            valid_address_versions = [0, 5]
            database_dir = "{}"
            minimum_tx_output = "0.001"
            {}

            [currencies.wallet]
            url = "http://wallet.invalid"
            "#,
            dir.path().display().to_string().replace('\\', "/"),
            extra
        );
        let config = Config::from_toml_str(&text).unwrap();
        let currency = config.currencies[0].clone();
        let store = LedgerStore::open(currency.store_path()).unwrap();

        Harness {
            store,
            currency,
            wallet: MockWallet::new(),
            authority: MockAuthority::new(),
            dir,
        }
    }

    pub fn ctx(&self) -> PayoutContext<'_> {
        PayoutContext {
            currency: &self.currency,
            store: &self.store,
            wallet: &self.wallet,
            authority: &self.authority,
            simulate: false,
        }
    }

    pub fn simulated(&self) -> PayoutContext<'_> {
        PayoutContext {
            simulate: true,
            ..self.ctx()
        }
    }

    /// Every obligation currently persisted, in id order
    pub fn obligations(&self) -> Vec<Obligation> {
        self.store.begin().unwrap().all().unwrap()
    }

    pub fn by_external_id(&self, external_id: &str) -> Obligation {
        self.obligations()
            .into_iter()
            .find(|o| o.external_id == external_id)
            .unwrap()
    }

    /// Pull `candidates` into the store
    pub fn seed(&self, candidates: Vec<ObligationCandidate>) {
        self.authority.offer(candidates);
        payout_reconciler::core::intake::pull_obligations(&self.ctx()).unwrap();
    }
}
