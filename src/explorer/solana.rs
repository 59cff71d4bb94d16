// src/explorer/solana.rs
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{
    decimals_field, get_json, integer_text, ExplorerClient, RawAmount, RawBalancePayload, RawTransfer,
    RawTransferPayload, TokenListing, TransferKind,
};
use crate::config::TrackedToken;
use crate::error::{FetchError, Fetched};
use crate::models::{Direction, NetworkKind};

const SOURCE: &str = "Solana RPC";

/// SPL Token program; token accounts of the owner live under it
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Signatures include votes, swaps etc.; pull more than will be kept
const SIGNATURE_WINDOW: usize = 4;

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureInfo {
    signature: String,
    #[serde(default)]
    err: Value,
}

/// Solana JSON-RPC client
pub struct SolanaRpcClient {
    http: Client,
    rpc_url: String,
    tracked: Vec<TrackedToken>,
}

impl SolanaRpcClient {
    pub fn new(http: Client, rpc_url: &str, tracked: Vec<TrackedToken>) -> Self {
        Self {
            http,
            rpc_url: rpc_url.to_string(),
            tracked,
        }
    }

    /// `Ok(None)` when the node answers `null`
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Fetched<Option<T>> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        debug!("📡 Sending {} → {}", method, self.rpc_url);

        let parsed: RpcResponse<T> = get_json(self.http.post(&self.rpc_url).json(&payload), SOURCE).await?;
        if let Some(err) = parsed.error {
            return Err(FetchError::remote(SOURCE, format!("{} ({})", err.message, err.code)));
        }
        Ok(parsed.result)
    }

    async fn native_balance(&self, address: &str) -> Fetched<Option<RawAmount>> {
        let lamports: WithContext<u64> = self
            .call("getBalance", json!([address]))
            .await?
            .ok_or_else(|| FetchError::decode(SOURCE, "getBalance returned null"))?;
        Ok(Some(RawAmount::new(lamports.value, None)))
    }

    async fn token_accounts(&self, address: &str) -> Fetched<Vec<TokenListing>> {
        let accounts: WithContext<Vec<Value>> = self
            .call(
                "getTokenAccountsByOwner",
                json!([address, { "programId": TOKEN_PROGRAM_ID }, { "encoding": "jsonParsed" }]),
            )
            .await?
            .ok_or_else(|| FetchError::decode(SOURCE, "getTokenAccountsByOwner returned null"))?;

        Ok(accounts
            .value
            .iter()
            .filter_map(|acc| {
                let info = acc.pointer("/account/data/parsed/info")?;
                let amount = info.pointer("/tokenAmount/amount").and_then(integer_text)?;
                let decimals = info.pointer("/tokenAmount/decimals").and_then(decimals_field);
                Some(TokenListing {
                    identifier: info.get("mint").and_then(Value::as_str).map(str::to_string),
                    name: None,
                    symbol: None,
                    amount: RawAmount::new(amount, decimals),
                })
            })
            .collect())
    }

    async fn transaction(&self, signature: &str) -> Fetched<Option<Value>> {
        self.call(
            "getTransaction",
            json!([signature, { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }]),
        )
        .await
    }

    async fn transfers(&self, address: &str, limit: usize) -> Fetched<Vec<RawTransfer>> {
        let signatures: Vec<SignatureInfo> = self
            .call("getSignaturesForAddress", json!([address, { "limit": limit * SIGNATURE_WINDOW }]))
            .await?
            .unwrap_or_default();

        let wanted: Vec<&SignatureInfo> = signatures.iter().filter(|s| s.err.is_null()).collect();
        let lookups = join_all(wanted.iter().map(|s| self.transaction(&s.signature))).await;

        let mut first_error = None;
        let mut found = Vec::new();
        let mut succeeded = 0usize;
        for lookup in lookups {
            match lookup {
                Ok(Some(tx)) => {
                    succeeded += 1;
                    found.extend(self.transfers_in(address, &tx));
                }
                Ok(None) => succeeded += 1,
                Err(e) => {
                    warn!("getTransaction failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        // only a total loss counts as a failure
        match first_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => {
                info!("Solana: {} transfers in {} signatures for {}", found.len(), wanted.len(), address);
                Ok(found)
            }
        }
    }

    /// System `transfer` and SPL `transfer`/`transferChecked` of a tracked
    /// mint; every other instruction is skipped
    fn transfers_in(&self, wallet: &str, tx: &Value) -> Vec<RawTransfer> {
        let Some(timestamp_ms) = tx
            .get("blockTime")
            .and_then(Value::as_i64)
            .and_then(|secs| secs.checked_mul(1000))
        else {
            return Vec::new();
        };
        let Some(instructions) = tx.pointer("/transaction/message/instructions").and_then(Value::as_array) else {
            return Vec::new();
        };

        instructions
            .iter()
            .filter_map(|ix| {
                let program = ix.get("program").and_then(Value::as_str)?;
                let kind = ix.pointer("/parsed/type").and_then(Value::as_str)?;
                let info = ix.pointer("/parsed/info")?;
                let field = |name: &str| info.get(name).and_then(Value::as_str).unwrap_or_default().to_string();

                match (program, kind) {
                    ("system", "transfer") => {
                        let (direction, counterparty) = direction_of(wallet, &field("source"), &field("destination"));
                        Some(RawTransfer {
                            kind: TransferKind::Native,
                            amount: RawAmount::new(info.get("lamports").and_then(integer_text)?, None),
                            counterparty,
                            direction,
                            timestamp_ms,
                        })
                    }
                    ("spl-token", "transfer" | "transferChecked") => {
                        let mint = match kind {
                            "transferChecked" => field("mint"),
                            _ => mint_of_account(tx, &field("source"))?,
                        };
                        let tracked = self.tracked.iter().find(|t| t.identifier == mint)?;
                        // report owners, not token accounts, on both sides
                        let (direction, counterparty) = if field("authority") == wallet {
                            let destination = field("destination");
                            (Direction::Out, owner_of_account(tx, &destination).unwrap_or(destination))
                        } else {
                            (Direction::In, field("authority"))
                        };
                        Some(RawTransfer {
                            kind: TransferKind::Token { identifier: tracked.identifier.clone() },
                            amount: RawAmount::new(
                                info.pointer("/tokenAmount/amount").or_else(|| info.get("amount")).and_then(integer_text)?,
                                info.pointer("/tokenAmount/decimals").and_then(decimals_field),
                            ),
                            counterparty,
                            direction,
                            timestamp_ms,
                        })
                    }
                    _ => None,
                }
            })
            .collect()
    }
}

#[async_trait]
impl ExplorerClient for SolanaRpcClient {
    fn network(&self) -> NetworkKind {
        NetworkKind::Solana
    }

    async fn fetch_balances(&self, address: &str) -> RawBalancePayload {
        let (native, tokens) = tokio::join!(self.native_balance(address), self.token_accounts(address));
        RawBalancePayload { native, tokens }
    }

    async fn fetch_transfers(&self, address: &str, limit: usize) -> RawTransferPayload {
        // both kinds come out of the same transaction list
        match self.transfers(address, limit).await {
            Ok(all) => {
                let (native, token): (Vec<_>, Vec<_>) =
                    all.into_iter().partition(|t| t.kind == TransferKind::Native);
                RawTransferPayload { native: Ok(native), token: Ok(token) }
            }
            Err(e) => RawTransferPayload::failed(e),
        }
    }
}

/// Entry of the transaction's token balance tables describing `account`
fn token_balance_of<'a>(tx: &'a Value, account: &str) -> Option<&'a Value> {
    let keys = tx.pointer("/transaction/message/accountKeys")?.as_array()?;
    let index = keys.iter().position(|key| {
        key.get("pubkey").and_then(Value::as_str).or_else(|| key.as_str()) == Some(account)
    })?;

    ["/meta/postTokenBalances", "/meta/preTokenBalances"]
        .iter()
        .filter_map(|table| tx.pointer(table).and_then(Value::as_array))
        .flatten()
        .find(|entry| entry.get("accountIndex").and_then(Value::as_u64) == Some(index as u64))
}

/// Plain SPL `transfer` carries no mint
fn mint_of_account(tx: &Value, account: &str) -> Option<String> {
    token_balance_of(tx, account)?.get("mint")?.as_str().map(str::to_string)
}

fn owner_of_account(tx: &Value, account: &str) -> Option<String> {
    token_balance_of(tx, account)?.get("owner")?.as_str().map(str::to_string)
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
