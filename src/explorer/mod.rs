// src/explorer/mod.rs
//! Per-network explorer adapters.
//!
//! Each adapter speaks one remote API and lifts its JSON into the raw shapes
//! below: amounts stay in base units, token holdings keep whatever identity
//! fields the source offered. Every remote call yields its own [`Fetched`], so
//! one failing endpoint only blanks the fields it feeds.

pub mod bsc;
pub mod solana;
pub mod tron;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::{FetchError, Fetched};
use crate::models::{Direction, NetworkKind};

pub use bsc::BscScanClient;
pub use solana::SolanaRpcClient;
pub use tron::TronGridClient;

/// Integer quantity plus the decimal count the source declared for it, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAmount {
    pub base_units: String,
    pub decimals: Option<u32>,
}

impl RawAmount {
    pub fn new(base_units: impl ToString, decimals: Option<u32>) -> Self {
        Self { base_units: base_units.to_string(), decimals }
    }
}

/// A fungible-token holding as reported by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenListing {
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub amount: RawAmount,
}

#[derive(Debug, Clone)]
pub struct RawBalancePayload {
    /// `Ok(None)` when the source does not know the account
    pub native: Fetched<Option<RawAmount>>,
    pub tokens: Fetched<Vec<TokenListing>>,
}

impl RawBalancePayload {
    pub fn failed(err: FetchError) -> Self {
        Self { native: Err(err.clone()), tokens: Err(err) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    Native,
    Token { identifier: String },
}

/// A transfer already filtered to a kind the pipeline reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransfer {
    pub kind: TransferKind,
    pub amount: RawAmount,
    pub counterparty: String, // full address
    pub direction: Direction,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct RawTransferPayload {
    pub native: Fetched<Vec<RawTransfer>>,
    pub token: Fetched<Vec<RawTransfer>>,
}

impl RawTransferPayload {
    pub fn failed(err: FetchError) -> Self {
        Self { native: Err(err.clone()), token: Err(err) }
    }
}

#[async_trait]
pub trait ExplorerClient: Send + Sync {
    fn network(&self) -> NetworkKind;

    async fn fetch_balances(&self, address: &str) -> RawBalancePayload;

    async fn fetch_transfers(&self, address: &str, limit: usize) -> RawTransferPayload;
}

/// Shared HTTP client; the timeout bounds every explorer and price call
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Send a request and decode a JSON body; non-2xx is a failure
pub(crate) async fn get_json<T: DeserializeOwned>(request: RequestBuilder, source: &str) -> Fetched<T> {
    let resp = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(source, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status { source_name: source.to_string(), status: status.as_u16() });
    }

    let text = resp.text().await.map_err(|e| FetchError::from_reqwest(source, e))?;
    debug!("📩 {} answered {} bytes", source, text.len());

    serde_json::from_str(&text).map_err(|e| FetchError::decode(source, e))
}

/// Lenient integer field: explorers send numbers both as JSON numbers and strings
pub(crate) fn integer_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) if n.is_u64() => n.as_u64().map(|v| v.to_string()),
        serde_json::Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            Some(s.clone())
        }
        _ => None,
    }
}

pub(crate) fn decimals_field(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_text_accepts_numbers_and_digit_strings() {
        assert_eq!(integer_text(&json!(1500000)), Some("1500000".to_string()));
        assert_eq!(integer_text(&json!("2000000")), Some("2000000".to_string()));
        assert_eq!(integer_text(&json!("12.5")), None);
        assert_eq!(integer_text(&json!(-3)), None);
        assert_eq!(integer_text(&json!(null)), None);
    }

    #[test]
    fn decimals_field_accepts_both_encodings() {
        assert_eq!(decimals_field(&json!(6)), Some(6));
        assert_eq!(decimals_field(&json!("18")), Some(18));
        assert_eq!(decimals_field(&json!("x")), None);
    }
}
