// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Network an address is guessed to belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkKind {
    Tron,
    Bep20,
    Solana,
    Unknown,
}

impl NetworkKind {
    /// Ticker of the network's gas token
    pub fn native_symbol(&self) -> &'static str {
        match self {
            NetworkKind::Tron => "TRX",
            NetworkKind::Bep20 => "BNB",
            NetworkKind::Solana => "SOL",
            NetworkKind::Unknown => "",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkKind::Tron => write!(f, "TRON"),
            NetworkKind::Bep20 => write!(f, "BEP20"),
            NetworkKind::Solana => write!(f, "SOLANA"),
            NetworkKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// User-supplied address with the network inferred from its shape.
/// Not validated: the account may not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub raw: String,
    pub network: NetworkKind,
}

impl Address {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let network = crate::classifier::classify(&raw);
        Self { raw, network }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
    Unknown,
}

/// One recent movement of the native asset or a tracked stablecoin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub asset: String,
    pub amount: Decimal,
    pub counterparty: String, // display-truncated
    pub occurred_at: DateTime<Utc>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StablecoinBalance {
    pub symbol: String,
    pub amount: Decimal,
}

/// Where the native price used for valuation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Live,
    Cached,
    Default,
}

/// Short free-text classification of a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RiskVerdict(pub String);

impl RiskVerdict {
    pub const UNAVAILABLE: &'static str = "classification unavailable";

    pub fn unavailable() -> Self {
        RiskVerdict(Self::UNAVAILABLE.to_string())
    }

    pub fn is_unavailable(&self) -> bool {
        self.0 == Self::UNAVAILABLE
    }
}

impl fmt::Display for RiskVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical result of one aggregation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSnapshot {
    pub address: Address,
    pub network: NetworkKind,
    pub native_asset: String,
    pub native_balance: Decimal,
    pub stablecoin_balances: Vec<StablecoinBalance>,
    pub recent_transfers: Vec<Transfer>, // newest first
    pub native_price: Decimal,
    pub price_source: Option<PriceSource>,
    pub fiat_total: Decimal,
    pub risk: Option<RiskVerdict>,
    pub diagnostics: Vec<String>,
}

impl WalletSnapshot {
    /// Zeroed snapshot; also the terminal result for unrecognised input
    pub fn empty(address: Address) -> Self {
        let network = address.network;
        Self {
            address,
            network,
            native_asset: network.native_symbol().to_string(),
            native_balance: Decimal::ZERO,
            stablecoin_balances: Vec::new(),
            recent_transfers: Vec::new(),
            native_price: Decimal::ZERO,
            price_source: None,
            fiat_total: Decimal::ZERO,
            risk: None,
            diagnostics: Vec::new(),
        }
    }

    /// `None` when the sum leaves the decimal range
    pub fn stablecoin_total(&self) -> Option<Decimal> {
        self.stablecoin_balances
            .iter()
            .try_fold(Decimal::ZERO, |total, b| total.checked_add(b.amount))
    }
}
