//! Wallet daemon JSON-RPC client
//!
//! Speaks the bitcoind JSON-RPC 1.0 dialect over HTTP with basic auth.
//! Amounts are exchanged as exact JSON numbers: the request side writes the
//! decimal's digits verbatim and the response side parses them back without
//! passing through a float.

use crate::config::WalletConfig;
use crate::core::traits::{SentTransaction, Wallet, WalletTransaction};
use crate::types::{PayoutError, Service};
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Exact decimal → JSON number
pub fn decimal_to_json(amount: Decimal) -> Value {
    let text = amount.normalize().to_string();
    match serde_json::Number::from_str(&text) {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(text),
    }
}

/// JSON number or numeric string → exact decimal
pub fn json_to_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Wallet reached over JSON-RPC
pub struct RpcWallet {
    client: Client,
    url: String,
    username: String,
    password: String,
    probe_method: String,
}

impl RpcWallet {
    pub fn new(config: &WalletConfig) -> Result<Self, PayoutError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PayoutError::config(format!("cannot build wallet HTTP client: {e}")))?;
        Ok(RpcWallet {
            client,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            probe_method: config.probe_method.clone(),
        })
    }

    fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, PayoutError> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: "payout-reconciler",
            method,
            params,
        };
        debug!(method, "Wallet RPC call");

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .map_err(|e| PayoutError::transport(Service::Wallet, format!("{method}: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| PayoutError::transport(Service::Wallet, format!("{method}: {e}")))?;

        // bitcoind reports RPC errors with a JSON body and a 500 status
        let reply: RpcReply = serde_json::from_str(&text).map_err(|_| {
            PayoutError::transport(Service::Wallet, format!("{method}: HTTP {status}"))
        })?;
        if let Some(error) = reply.error {
            return Err(PayoutError::WalletRpc {
                code: error.code,
                message: error.message,
            });
        }
        if !status.is_success() {
            return Err(PayoutError::transport(
                Service::Wallet,
                format!("{method}: HTTP {status}"),
            ));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }

    fn malformed(method: &str, what: &str) -> PayoutError {
        PayoutError::transport(Service::Wallet, format!("{method}: malformed result, {what}"))
    }
}

impl Wallet for RpcWallet {
    fn probe(&self) -> Result<(), PayoutError> {
        self.call(&self.probe_method, Vec::new()).map(|_| ())
    }

    fn get_balance(&self, account: &str) -> Result<Decimal, PayoutError> {
        let params = if account.is_empty() {
            Vec::new()
        } else {
            vec![json!(account)]
        };
        let result = self.call("getbalance", params)?;
        json_to_decimal(&result).ok_or_else(|| Self::malformed("getbalance", "balance is not a number"))
    }

    fn send_many(
        &self,
        account: &str,
        outputs: &BTreeMap<String, Decimal>,
    ) -> Result<SentTransaction, PayoutError> {
        let amounts: serde_json::Map<String, Value> = outputs
            .iter()
            .map(|(address, amount)| (address.clone(), decimal_to_json(*amount)))
            .collect();

        let result = self.call("sendmany", vec![json!(account), Value::Object(amounts)])?;
        let transaction_id = result
            .as_str()
            .filter(|txid| !txid.is_empty())
            .ok_or_else(|| Self::malformed("sendmany", "no transaction id"))?
            .to_string();

        let details = match self.get_transaction(&transaction_id) {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(txid = %transaction_id, error = %e, "Sent, but transaction details unavailable");
                None
            }
        };
        Ok(SentTransaction {
            transaction_id,
            details,
        })
    }

    fn get_transaction(&self, transaction_id: &str) -> Result<WalletTransaction, PayoutError> {
        let result = self.call("gettransaction", vec![json!(transaction_id)])?;

        let confirmations = result
            .get("confirmations")
            .and_then(Value::as_i64)
            .ok_or_else(|| Self::malformed("gettransaction", "no confirmations"))?;
        let fee = result
            .get("fee")
            .and_then(json_to_decimal)
            .ok_or_else(|| Self::malformed("gettransaction", "no fee"))?;

        Ok(WalletTransaction {
            // conflicted transactions report negative depth
            confirmations: u64::try_from(confirmations).unwrap_or(0),
            fee: fee.abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::stub_http::serve_once;
    use rstest::rstest;

    fn wallet(url: String) -> RpcWallet {
        RpcWallet::new(&WalletConfig {
            url,
            username: "rpcuser".to_string(),
            password: "rpcpass".to_string(),
            account: String::new(),
            timeout_secs: 5,
            probe_method: "getinfo".to_string(),
        })
        .unwrap()
    }

    #[rstest]
    #[case::number(json!(0.0035), "0.0035")]
    #[case::string(json!("0.01"), "0.01")]
    #[case::negative(json!(-0.0002), "-0.0002")]
    #[case::integer(json!(12), "12")]
    fn test_json_to_decimal(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(json_to_decimal(&value), Some(Decimal::from_str(expected).unwrap()));
    }

    #[test]
    fn test_json_to_decimal_rejects_non_numbers() {
        assert_eq!(json_to_decimal(&json!(null)), None);
        assert_eq!(json_to_decimal(&json!("abc")), None);
        assert_eq!(json_to_decimal(&json!([1])), None);
    }

    #[test]
    fn test_decimal_to_json_keeps_digits() {
        let value = decimal_to_json(Decimal::from_str("0.00350000").unwrap());
        assert_eq!(serde_json::to_string(&value).unwrap(), "0.0035");
    }

    #[test]
    fn test_get_transaction_reports_absolute_fee() {
        let (url, server) = serve_once(
            200,
            r#"{"result":{"confirmations":13,"fee":-0.0002,"txid":"tx1"},"error":null,"id":"payout-reconciler"}"#
                .to_string(),
        );

        let details = wallet(url).get_transaction("tx1").unwrap();
        assert_eq!(details.confirmations, 13);
        assert_eq!(details.fee, Decimal::from_str("0.0002").unwrap());

        let request = server.join().unwrap();
        let body: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["method"], "gettransaction");
        assert_eq!(body["params"], json!(["tx1"]));
        assert!(request.head.to_ascii_lowercase().contains("authorization: basic"));
    }

    #[test]
    fn test_rpc_error_object_is_surfaced() {
        let (url, server) = serve_once(
            500,
            r#"{"result":null,"error":{"code":-6,"message":"Insufficient funds"},"id":"payout-reconciler"}"#
                .to_string(),
        );

        let result = wallet(url).get_balance("");
        assert_eq!(
            result,
            Err(PayoutError::WalletRpc {
                code: -6,
                message: "Insufficient funds".to_string()
            })
        );
        server.join().unwrap();
    }

    #[test]
    fn test_non_json_error_is_transport_failure() {
        let (url, server) = serve_once(401, String::new());
        let result = wallet(url).probe();
        assert!(matches!(
            result,
            Err(PayoutError::Transport { service: Service::Wallet, .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_wallet_is_transport_failure() {
        let result = wallet("http://127.0.0.1:1".to_string()).probe();
        assert!(matches!(result, Err(PayoutError::Transport { .. })));
    }
}
