//! Remote authority HTTP client
//!
//! Each call is a `POST <url>/rpc/<endpoint>` whose body is a signed
//! envelope, answered by a signed envelope. An answer that fails
//! verification is reported as [`PayoutError::Untrusted`].

use crate::config::RemoteConfig;
use crate::core::traits::{Association, ObligationCandidate, RemoteAuthority};
use crate::io::envelope::EnvelopeSigner;
use crate::io::wallet_rpc::decimal_to_json;
use crate::types::{PayoutError, Service};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

mod endpoints {
    pub const GET_PAYOUTS: &str = "get_payouts";
    pub const ASSOCIATE_PAYOUTS: &str = "associate_payouts";
    pub const CONFIRM_TRANSACTIONS: &str = "confirm_transactions";
    pub const GET_UNCONFIRMED: &str = "get_unconfirmed_transactions";
}

#[derive(Deserialize)]
struct PayoutsReply {
    #[serde(default)]
    pids: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct ResultReply {
    result: bool,
}

#[derive(Deserialize)]
struct UnconfirmedReply {
    #[serde(default)]
    objects: Vec<UnconfirmedEntry>,
}

#[derive(Deserialize)]
struct UnconfirmedEntry {
    txid: String,
}

/// Remote authority reached over signed HTTP
pub struct HttpAuthority {
    client: Client,
    base_url: String,
    signer: EnvelopeSigner,
}

impl HttpAuthority {
    pub fn new(config: &RemoteConfig) -> Result<Self, PayoutError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PayoutError::config(format!("cannot build HTTP client: {e}")))?;
        Ok(HttpAuthority {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            signer: EnvelopeSigner::new(&config.signature_secret, config.max_age()),
        })
    }

    fn call<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp, PayoutError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/rpc/{}", self.base_url, endpoint);
        let token = self.signer.sign(body)?;
        debug!(%url, "Remote authority call");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(token)
            .send()
            .map_err(|e| PayoutError::transport(Service::RemoteAuthority, format!("{endpoint}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PayoutError::transport(
                Service::RemoteAuthority,
                format!("{endpoint}: HTTP {status}"),
            ));
        }
        let text = response
            .text()
            .map_err(|e| PayoutError::transport(Service::RemoteAuthority, format!("{endpoint}: {e}")))?;

        Ok(self.signer.verify(&text)?)
    }
}

/// Text of a JSON scalar; numbers keep their exact digits
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

/// `[payee, address, amount, external_id]` → candidate.
///
/// Short or odd rows become candidates with empty fields so intake rejects
/// and counts them.
fn candidate_from_row(row: &[Value]) -> ObligationCandidate {
    let field = |i: usize| row.get(i).map(scalar_text).unwrap_or_default();
    ObligationCandidate {
        payee: field(0),
        address: field(1),
        amount: field(2),
        external_id: field(3),
    }
}

impl RemoteAuthority for HttpAuthority {
    fn fetch_obligations(&self, currency: &str) -> Result<Vec<ObligationCandidate>, PayoutError> {
        let reply: PayoutsReply = self.call(endpoints::GET_PAYOUTS, &json!({ "currency": currency }))?;
        Ok(reply.pids.iter().map(|row| candidate_from_row(row)).collect())
    }

    fn push_association(&self, association: &Association) -> Result<bool, PayoutError> {
        let body = json!({
            "coin_txid": association.transaction_id,
            "pids": association.external_ids,
            "tx_fee": decimal_to_json(association.fee),
            "currency": association.currency,
        });
        let reply: ResultReply = self.call(endpoints::ASSOCIATE_PAYOUTS, &body)?;
        Ok(reply.result)
    }

    fn push_confirmations(&self, transaction_ids: &[String]) -> Result<bool, PayoutError> {
        let reply: ResultReply =
            self.call(endpoints::CONFIRM_TRANSACTIONS, &json!({ "tids": transaction_ids }))?;
        Ok(reply.result)
    }

    fn fetch_unconfirmed(&self, currency: &str) -> Result<Vec<String>, PayoutError> {
        let reply: UnconfirmedReply =
            self.call(endpoints::GET_UNCONFIRMED, &json!({ "currency": currency }))?;
        Ok(reply.objects.into_iter().map(|entry| entry.txid).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::stub_http::serve_once;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::time::Duration;

    const SECRET: &str = "shared secret";

    fn authority(url: String) -> HttpAuthority {
        HttpAuthority::new(&RemoteConfig {
            url,
            signature_secret: SECRET.to_string(),
            max_age_secs: 10,
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn signer() -> EnvelopeSigner {
        EnvelopeSigner::new(SECRET, Duration::from_secs(10))
    }

    #[test]
    fn test_candidate_from_row() {
        let row = vec![json!("alice"), json!("1A1z"), json!(0.001), json!(42)];
        let candidate = candidate_from_row(&row);
        assert_eq!(candidate.payee, "alice");
        assert_eq!(candidate.amount, "0.001");
        assert_eq!(candidate.external_id, "42");

        let short = candidate_from_row(&[json!("bob")]);
        assert_eq!(short.address, "");
        assert_eq!(short.external_id, "");
    }

    #[test]
    fn test_fetch_obligations_signs_request_and_verifies_reply() {
        let reply = signer()
            .sign(&json!({"pids": [["alice", "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "0.001", "7"]]}))
            .unwrap();
        let (url, server) = serve_once(200, reply);

        let candidates = authority(url).fetch_obligations("BTC").unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].external_id, "7");

        let request = server.join().unwrap();
        assert!(request.head.starts_with("POST /rpc/get_payouts "));
        let body: Value = signer().verify(&request.body).unwrap();
        assert_eq!(body, json!({"currency": "BTC"}));
    }

    #[test]
    fn test_push_association_sends_exact_fee() {
        let (url, server) = serve_once(200, signer().sign(&json!({"result": true})).unwrap());

        let association = Association {
            transaction_id: "tx1".to_string(),
            external_ids: vec!["1".to_string(), "2".to_string()],
            fee: Decimal::from_str("0.0002").unwrap(),
            currency: "BTC".to_string(),
        };
        assert!(authority(url).push_association(&association).unwrap());

        let body: Value = signer().verify(&server.join().unwrap().body).unwrap();
        assert_eq!(body["coin_txid"], "tx1");
        assert_eq!(body["pids"], json!(["1", "2"]));
        assert_eq!(body["tx_fee"].to_string(), "0.0002");
    }

    #[test]
    fn test_forged_reply_is_untrusted() {
        let forged = EnvelopeSigner::new("wrong", Duration::from_secs(10))
            .sign(&json!({"result": true}))
            .unwrap();
        let (url, server) = serve_once(200, forged);

        let result = authority(url).push_confirmations(&["tx1".to_string()]);
        assert!(matches!(result, Err(PayoutError::Untrusted { .. })));
        server.join().unwrap();
    }

    #[test]
    fn test_http_error_is_transport_failure() {
        let (url, server) = serve_once(503, String::new());
        let result = authority(url).fetch_unconfirmed("BTC");
        assert!(matches!(
            result,
            Err(PayoutError::Transport { service: Service::RemoteAuthority, .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_fetch_unconfirmed() {
        let reply = signer()
            .sign(&json!({"objects": [{"txid": "tx1"}, {"txid": "tx2"}]}))
            .unwrap();
        let (url, server) = serve_once(200, reply);

        let txids = authority(url).fetch_unconfirmed("BTC").unwrap();
        assert_eq!(txids, vec!["tx1".to_string(), "tx2".to_string()]);
        server.join().unwrap();
    }
}
