// src/explorer/tron.rs
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{
    decimals_field, get_json, integer_text, ExplorerClient, RawAmount, RawBalancePayload, RawTransfer,
    RawTransferPayload, TokenListing, TransferKind,
};
use crate::config::TrackedToken;
use crate::error::{FetchError, Fetched};
use crate::models::{Direction, NetworkKind};

const SOURCE: &str = "TronGrid";

/// Native transfers are interleaved with contract calls, so more records are
/// pulled than will be kept
const NATIVE_WINDOW: usize = 10;

const TRANSFER_CONTRACT: &str = "TransferContract";
const TRC20_TRANSFER: &str = "Transfer";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Fetched<Vec<T>> {
        if self.success == Some(false) {
            let message = self.error.unwrap_or_else(|| "request rejected".to_string());
            return Err(FetchError::remote(SOURCE, message));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    balance: Option<u64>, // sun; absent when zero
    #[serde(default)]
    trc20: Vec<serde_json::Map<String, Value>>, // [{ "<contract>": "<amount>" }]
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    address: String,
    #[serde(default)]
    decimals: Value,
}

#[derive(Debug, Deserialize)]
struct Trc20Transfer {
    token_info: TokenInfo,
    block_timestamp: i64,
    from: String,
    to: String,
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ContractParameter {
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct Contract {
    #[serde(rename = "type")]
    kind: String,
    parameter: ContractParameter,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    #[serde(default)]
    contract: Vec<Contract>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    #[serde(default)]
    block_timestamp: i64,
    #[serde(default)]
    raw_data: RawData,
}

/// TronGrid v1 REST client
pub struct TronGridClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    tracked: Vec<TrackedToken>,
}

impl TronGridClient {
    pub fn new(http: Client, base_url: &str, api_key: Option<String>, tracked: Vec<TrackedToken>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            tracked,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let req = self.http.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.header("TRON-PRO-API-KEY", key),
            None => req,
        }
    }

    async fn token_transfers(&self, address: &str, limit: usize) -> Fetched<Vec<RawTransfer>> {
        let mut path = format!("/v1/accounts/{}/transactions/trc20?only_confirmed=true", address);
        match self.tracked.as_slice() {
            [single] => {
                path.push_str(&format!("&limit={}&contract_address={}", limit, single.identifier));
            }
            many => path.push_str(&format!("&limit={}", limit * many.len().max(1))),
        }

        let envelope: Envelope<Trc20Transfer> = get_json(self.get(&path), SOURCE).await?;
        let records = envelope.into_data()?;
        debug!("TronGrid returned {} TRC-20 records for {}", records.len(), address);

        Ok(records
            .into_iter()
            .filter(|r| r.kind == TRC20_TRANSFER)
            .filter(|r| self.tracked.iter().any(|t| t.identifier == r.token_info.address))
            .filter_map(|r| {
                let (direction, counterparty) = direction_of(address, &r.from, &r.to);
                Some(RawTransfer {
                    kind: TransferKind::Token { identifier: r.token_info.address.clone() },
                    amount: RawAmount::new(integer_text(&Value::String(r.value))?, decimals_field(&r.token_info.decimals)),
                    counterparty,
                    direction,
                    timestamp_ms: r.block_timestamp,
                })
            })
            .collect())
    }

    async fn native_transfers(&self, address: &str, limit: usize) -> Fetched<Vec<RawTransfer>> {
        let path = format!(
            "/v1/accounts/{}/transactions?only_confirmed=true&limit={}",
            address,
            limit * NATIVE_WINDOW
        );

        let envelope: Envelope<Transaction> = get_json(self.get(&path), SOURCE).await?;
        let records = envelope.into_data()?;
        debug!("TronGrid returned {} transactions for {}", records.len(), address);

        Ok(records.iter().filter_map(|tx| native_transfer(address, tx)).collect())
    }
}

#[async_trait]
impl ExplorerClient for TronGridClient {
    fn network(&self) -> NetworkKind {
        NetworkKind::Tron
    }

    async fn fetch_balances(&self, address: &str) -> RawBalancePayload {
        let path = format!("/v1/accounts/{}", address);
        let fetched = get_json::<Envelope<Account>>(self.get(&path), SOURCE)
            .await
            .and_then(Envelope::into_data);

        let accounts = match fetched {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("TronGrid account lookup failed for {}: {}", address, e);
                return RawBalancePayload::failed(e);
            }
        };

        let Some(account) = accounts.into_iter().next() else {
            // never activated on-chain
            return RawBalancePayload { native: Ok(None), tokens: Ok(Vec::new()) };
        };

        let tokens = account
            .trc20
            .iter()
            .flat_map(|entry| entry.iter())
            .filter_map(|(contract, amount)| {
                Some(TokenListing {
                    identifier: Some(contract.clone()),
                    name: None,
                    symbol: None,
                    amount: RawAmount::new(integer_text(amount)?, None),
                })
            })
            .collect();

        RawBalancePayload {
            native: Ok(Some(RawAmount::new(account.balance.unwrap_or(0), None))),
            tokens: Ok(tokens),
        }
    }

    async fn fetch_transfers(&self, address: &str, limit: usize) -> RawTransferPayload {
        let (token, native) = tokio::join!(
            self.token_transfers(address, limit),
            self.native_transfers(address, limit)
        );
        RawTransferPayload { native, token }
    }
}

/// Keep only plain TRX transfers; staking, contract calls etc. are skipped
fn native_transfer(address: &str, tx: &Transaction) -> Option<RawTransfer> {
    let contract = tx.raw_data.contract.first()?;
    if contract.kind != TRANSFER_CONTRACT {
        return None;
    }

    let value = &contract.parameter.value;
    let amount = integer_text(value.get("amount")?)?;
    let from = readable_address(value.get("owner_address")?.as_str()?)?;
    let to = readable_address(value.get("to_address")?.as_str()?)?;
    let (direction, counterparty) = direction_of(address, &from, &to);

    Some(RawTransfer {
        kind: TransferKind::Native,
        amount: RawAmount::new(amount, None),
        counterparty,
        direction,
        timestamp_ms: tx.block_timestamp,
    })
}

fn direction_of(wallet: &str, from: &str, to: &str) -> (Direction, String) {
    if from == wallet {
        (Direction::Out, to.to_string())
    } else if to == wallet {
        (Direction::In, from.to_string())
    } else {
        (Direction::Unknown, to.to_string())
    }
}

/// Raw transactions carry `41…` hex addresses; convert to base58check
pub fn readable_address(addr: &str) -> Option<String> {
    if addr.starts_with('T') {
        return Some(addr.to_string());
    }

    let bytes = hex::decode(addr).ok()?;
    if bytes.len() != 21 || bytes[0] != 0x41 {
        return None;
    }

    let checksum = Sha256::digest(Sha256::digest(&bytes));
    let mut full = bytes;
    full.extend_from_slice(&checksum[..4]);
    Some(bs58::encode(full).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "TDqhrxGnktwBCim5ZXcJPvMWASSfYWsdt6";
    const WALLET_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
    const PEER_HEX: &str = "41e552f6487585c2b58bc2c9bb4492bc1f17132cd0";

    fn client(server: &MockServer) -> TronGridClient {
        let cfg = Config::default();
        TronGridClient::new(
            Client::new(),
            &server.uri(),
            Some("test-key".to_string()),
            cfg.tron.tracked.clone(),
        )
    }

    #[test]
    fn hex_addresses_become_base58() {
        let readable = readable_address(WALLET_HEX).unwrap();
        assert!(readable.starts_with('T'));
        assert_eq!(readable.len(), 34);

        let decoded = bs58::decode(&readable).into_vec().unwrap();
        assert_eq!(hex::encode(&decoded[..21]), WALLET_HEX);

        assert_eq!(readable_address(WALLET).as_deref(), Some(WALLET));
        assert_eq!(readable_address("zz"), None);
        assert_eq!(readable_address("42a614f803b6fd780986a42c78ec9c7f77e6ded13c"), None);
    }

    #[tokio::test]
    async fn balances_are_read_from_the_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{}", WALLET)))
            .and(header("TRON-PRO-API-KEY", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [{
                    "balance": 1500000,
                    "trc20": [
                        { "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t": "2000000" },
                        { "TXLAQ63Xg1NAzckPwKHvzw7CSEmLMEqcdj": "5" }
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let payload = client(&server).fetch_balances(WALLET).await;
        assert_eq!(payload.native.unwrap(), Some(RawAmount::new(1500000, None)));
        let tokens = payload.tokens.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].identifier.as_deref(), Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"));
        assert_eq!(tokens[0].amount.base_units, "2000000");
    }

    #[tokio::test]
    async fn unknown_account_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{}", WALLET)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": [] })))
            .mount(&server)
            .await;

        let payload = client(&server).fetch_balances(WALLET).await;
        assert_eq!(payload.native.unwrap(), None);
        assert!(payload.tokens.unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_errors_fail_both_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let payload = client(&server).fetch_balances(WALLET).await;
        assert!(matches!(payload.native, Err(FetchError::Status { status: 503, .. })));
        assert!(payload.tokens.is_err());
    }

    #[tokio::test]
    async fn transfers_skip_unrelated_kinds() {
        let server = MockServer::start().await;
        let wallet = readable_address(WALLET_HEX).unwrap();
        let peer = readable_address(PEER_HEX).unwrap();

        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{}/transactions/trc20", wallet)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [
                    {
                        "token_info": { "address": "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", "decimals": 6, "symbol": "USDT" },
                        "block_timestamp": 1700000000000i64,
                        "from": wallet, "to": peer, "type": "Transfer", "value": "2500000"
                    },
                    {
                        "token_info": { "address": "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", "decimals": 6 },
                        "block_timestamp": 1700000001000i64,
                        "from": wallet, "to": peer, "type": "Approval", "value": "0"
                    }
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{}/transactions", wallet)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [
                    {
                        "block_timestamp": 1700000002000i64,
                        "raw_data": { "contract": [{
                            "type": "TransferContract",
                            "parameter": { "value": { "amount": 3000000, "owner_address": PEER_HEX, "to_address": WALLET_HEX } }
                        }]}
                    },
                    {
                        "block_timestamp": 1700000003000i64,
                        "raw_data": { "contract": [{
                            "type": "TriggerSmartContract",
                            "parameter": { "value": { "owner_address": WALLET_HEX } }
                        }]}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let payload = client(&server).fetch_transfers(&wallet, 3).await;

        let token = payload.token.unwrap();
        assert_eq!(token.len(), 1);
        assert_eq!(token[0].direction, Direction::Out);
        assert_eq!(token[0].counterparty, peer);
        assert_eq!(token[0].amount, RawAmount::new(2500000, Some(6)));

        let native = payload.native.unwrap();
        assert_eq!(native.len(), 1);
        assert_eq!(native[0].kind, TransferKind::Native);
        assert_eq!(native[0].direction, Direction::In);
        assert_eq!(native[0].counterparty, peer);
    }

    #[tokio::test]
    async fn rejected_request_is_a_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false, "error": "rate limited", "data": []
            })))
            .mount(&server)
            .await;

        let payload = client(&server).fetch_transfers(WALLET, 3).await;
        assert!(matches!(payload.token, Err(FetchError::Remote { .. })));
        assert!(matches!(payload.native, Err(FetchError::Remote { .. })));
    }
}
