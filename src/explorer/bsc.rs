// src/explorer/bsc.rs
use alloy::primitives::Address as EvmAddress;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, warn};

use super::{
    decimals_field, get_json, integer_text, ExplorerClient, RawAmount, RawBalancePayload, RawTransfer,
    RawTransferPayload, TokenListing, TransferKind,
};
use crate::config::TrackedToken;
use crate::error::{FetchError, Fetched};
use crate::models::{Direction, NetworkKind};

const SOURCE: &str = "BscScan";

/// Plain value transfers carry no calldata
const EMPTY_INPUT: &str = "0x";

/// Etherscan-style envelope: `status` is "1" on success, "0" with an empty
/// array for "No transactions found", "0" with a message string otherwise
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl ApiResponse {
    fn into_result(self) -> Fetched<Value> {
        if self.status == "1" || self.result.is_array() {
            return Ok(self.result);
        }
        let detail = self.result.as_str().unwrap_or_default();
        Err(FetchError::remote(SOURCE, format!("{} {}", self.message, detail).trim()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TokenHolding {
    #[serde(default)]
    token_address: Option<String>,
    #[serde(default)]
    token_name: Option<String>,
    #[serde(default)]
    token_symbol: Option<String>,
    token_quantity: Value,
    #[serde(default)]
    token_divisor: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NormalTx {
    time_stamp: String,
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    #[serde(default)]
    is_error: String,
    #[serde(default)]
    input: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenTx {
    time_stamp: String,
    from: String,
    to: String,
    value: String,
    contract_address: String,
    #[serde(default)]
    token_decimal: Value,
}

/// BscScan account API client
pub struct BscScanClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    tracked: Vec<TrackedToken>,
}

impl BscScanClient {
    pub fn new(http: Client, base_url: &str, api_key: Option<String>, tracked: Vec<TrackedToken>) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            api_key,
            tracked,
        }
    }

    async fn call(&self, params: &[(&str, String)]) -> Fetched<Value> {
        let mut req = self.http.get(&self.base_url).query(&[("module", "account")]).query(params);
        if let Some(key) = &self.api_key {
            req = req.query(&[("apikey", key)]);
        }
        get_json::<ApiResponse>(req, SOURCE).await?.into_result()
    }

    async fn native_balance(&self, address: &str) -> Fetched<Option<RawAmount>> {
        let result = self
            .call(&[("action", "balance".to_string()), ("address", address.to_string())])
            .await?;
        let wei = integer_text(&result).ok_or_else(|| FetchError::decode(SOURCE, "balance is not an integer"))?;
        Ok(Some(RawAmount::new(wei, None)))
    }

    async fn token_holdings(&self, address: &str) -> Fetched<Vec<TokenListing>> {
        let result = self
            .call(&[
                ("action", "addresstokenbalance".to_string()),
                ("address", address.to_string()),
                ("page", "1".to_string()),
                ("offset", "100".to_string()),
            ])
            .await?;
        let holdings: Vec<TokenHolding> = serde_json::from_value(result).map_err(|e| FetchError::decode(SOURCE, e))?;

        Ok(holdings
            .into_iter()
            .filter_map(|h| {
                Some(TokenListing {
                    identifier: h.token_address,
                    name: h.token_name,
                    symbol: h.token_symbol,
                    amount: RawAmount::new(integer_text(&h.token_quantity)?, decimals_field(&h.token_divisor)),
                })
            })
            .collect())
    }

    async fn native_transfers(&self, address: &str, limit: usize) -> Fetched<Vec<RawTransfer>> {
        let result = self
            .call(&[
                ("action", "txlist".to_string()),
                ("address", address.to_string()),
                ("page", "1".to_string()),
                ("offset", (limit * 10).to_string()),
                ("sort", "desc".to_string()),
            ])
            .await?;
        let txs: Vec<NormalTx> = serde_json::from_value(result).map_err(|e| FetchError::decode(SOURCE, e))?;
        debug!("BscScan returned {} transactions for {}", txs.len(), address);

        // contract calls, failed txs and zero-value pings are skipped
        Ok(txs
            .into_iter()
            .filter(|tx| tx.input == EMPTY_INPUT && tx.is_error != "1" && tx.value != "0")
            .filter_map(|tx| {
                let (direction, counterparty) = direction_of(address, &tx.from, &tx.to);
                Some(RawTransfer {
                    kind: TransferKind::Native,
                    amount: RawAmount::new(integer_text(&Value::String(tx.value))?, None),
                    counterparty,
                    direction,
                    timestamp_ms: seconds_to_ms(&tx.time_stamp)?,
                })
            })
            .collect())
    }

    async fn token_transfers(&self, address: &str, limit: usize) -> Fetched<Vec<RawTransfer>> {
        let mut params = vec![
            ("action", "tokentx".to_string()),
            ("address", address.to_string()),
            ("page", "1".to_string()),
            ("offset", (limit * self.tracked.len().max(1)).to_string()),
            ("sort", "desc".to_string()),
        ];
        if let [single] = self.tracked.as_slice() {
            params.push(("contractaddress", single.identifier.clone()));
        }

        let result = self.call(&params).await?;
        let txs: Vec<TokenTx> = serde_json::from_value(result).map_err(|e| FetchError::decode(SOURCE, e))?;
        debug!("BscScan returned {} token transfers for {}", txs.len(), address);

        Ok(txs
            .into_iter()
            .filter_map(|tx| {
                let tracked = self
                    .tracked
                    .iter()
                    .find(|t| same_address(&t.identifier, &tx.contract_address))?;
                let (direction, counterparty) = direction_of(address, &tx.from, &tx.to);
                Some(RawTransfer {
                    kind: TransferKind::Token { identifier: tracked.identifier.clone() },
                    amount: RawAmount::new(integer_text(&Value::String(tx.value))?, decimals_field(&tx.token_decimal)),
                    counterparty,
                    direction,
                    timestamp_ms: seconds_to_ms(&tx.time_stamp)?,
                })
            })
            .collect())
    }
}

#[async_trait]
impl ExplorerClient for BscScanClient {
    fn network(&self) -> NetworkKind {
        NetworkKind::Bep20
    }

    async fn fetch_balances(&self, address: &str) -> RawBalancePayload {
        let (native, tokens) = tokio::join!(self.native_balance(address), self.token_holdings(address));
        if let Err(e) = &native {
            warn!("BscScan balance lookup failed for {}: {}", address, e);
        }
        RawBalancePayload { native, tokens }
    }

    async fn fetch_transfers(&self, address: &str, limit: usize) -> RawTransferPayload {
        let (native, token) = tokio::join!(
            self.native_transfers(address, limit),
            self.token_transfers(address, limit)
        );
        RawTransferPayload { native, token }
    }
}

/// EVM addresses compare by value, whatever the checksum casing
fn same_address(a: &str, b: &str) -> bool {
    match (EvmAddress::from_str(a), EvmAddress::from_str(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.eq_ignore_ascii_case(b),
    }
}

fn direction_of(wallet: &str, from: &str, to: &str) -> (Direction, String) {
    if same_address(wallet, from) {
        (Direction::Out, to.to_string())
    } else if same_address(wallet, to) {
        (Direction::In, from.to_string())
    } else {
        (Direction::Unknown, to.to_string())
    }
}

fn seconds_to_ms(secs: &str) -> Option<i64> {
    secs.trim().parse::<i64>().ok()?.checked_mul(1000)
}
