use dotenvy::dotenv;
use eyre::Result;
use rust_decimal::Decimal;
use std::{env, fmt, str::FromStr, time::Duration};
use tracing::info;

use crate::models::NetworkKind;

/// A stablecoin the pipeline looks for on one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedToken {
    pub symbol: String,
    pub name: String,
    pub identifier: String,     // contract address / mint
    pub default_decimals: u32,  // used only when the source does not declare decimals
}

impl TrackedToken {
    pub fn new(symbol: &str, name: &str, identifier: &str, default_decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            identifier: identifier.to_string(),
            default_decimals,
        }
    }
}

/// Per-network knobs that the explorer sources do not declare themselves
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub network: NetworkKind,
    pub native_decimals: u32,
    pub price_id: String, // price feed id of the native asset
    pub fallback_price: Decimal,
    pub tracked: Vec<TrackedToken>,
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub http_timeout: Duration,
    pub transfer_cap: usize,
    pub counterparty_prefix: usize,
    pub counterparty_suffix: usize,

    pub trongrid_url: String,
    pub trongrid_api_key: Option<String>,
    pub bscscan_url: String,
    pub bscscan_api_key: Option<String>,
    pub solana_rpc_url: String,
    pub price_feed_url: String,

    pub openai_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    pub tron: NetworkSettings,
    pub bsc: NetworkSettings,
    pub solana: NetworkSettings,
}

pub const MAX_TRANSFER_CAP: usize = 5;

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 10000,
            http_timeout: Duration::from_secs(12),
            transfer_cap: 3,
            counterparty_prefix: 6,
            counterparty_suffix: 4,

            trongrid_url: "https://api.trongrid.io".to_string(),
            trongrid_api_key: None,
            bscscan_url: "https://api.bscscan.com/api".to_string(),
            bscscan_api_key: None,
            solana_rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            price_feed_url: "https://api.coingecko.com/api/v3".to_string(),

            openai_url: "https://api.openai.com".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),

            tron: NetworkSettings {
                network: NetworkKind::Tron,
                native_decimals: 6,
                price_id: "tron".to_string(),
                fallback_price: Decimal::new(15, 2),
                tracked: vec![TrackedToken::new(
                    "USDT",
                    "Tether USD",
                    "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t",
                    6,
                )],
            },
            bsc: NetworkSettings {
                network: NetworkKind::Bep20,
                native_decimals: 18,
                price_id: "binancecoin".to_string(),
                fallback_price: Decimal::new(300, 0),
                tracked: vec![TrackedToken::new(
                    "USDT",
                    "Tether USD",
                    "0x55d398326f99059fF775485246999027B3197955",
                    18,
                )],
            },
            solana: NetworkSettings {
                network: NetworkKind::Solana,
                native_decimals: 9,
                price_id: "solana".to_string(),
                fallback_price: Decimal::new(100, 0),
                tracked: vec![TrackedToken::new(
                    "USDT",
                    "USDT",
                    "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
                    6,
                )],
            },
        }
    }
}

impl Config {
    pub fn network(&self, kind: NetworkKind) -> Option<&NetworkSettings> {
        match kind {
            NetworkKind::Tron => Some(&self.tron),
            NetworkKind::Bep20 => Some(&self.bsc),
            NetworkKind::Solana => Some(&self.solana),
            NetworkKind::Unknown => None,
        }
    }
}

// Keys are never printed
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(key: &Option<String>) -> &'static str {
            if key.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("http_timeout", &self.http_timeout)
            .field("transfer_cap", &self.transfer_cap)
            .field("trongrid_url", &self.trongrid_url)
            .field("trongrid_api_key", &redact(&self.trongrid_api_key))
            .field("bscscan_url", &self.bscscan_url)
            .field("bscscan_api_key", &redact(&self.bscscan_api_key))
            .field("solana_rpc_url", &self.solana_rpc_url)
            .field("price_feed_url", &self.price_feed_url)
            .field("openai_url", &self.openai_url)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .finish()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn load() -> Result<Config> {
    dotenv().ok(); // load .env if present

    let mut cfg = Config::default();

    cfg.bind_addr = env_or("BIND_ADDR", cfg.bind_addr);
    cfg.port = env_or("PORT", cfg.port);
    cfg.http_timeout = Duration::from_secs(env_or("HTTP_TIMEOUT_SECS", cfg.http_timeout.as_secs()));
    cfg.transfer_cap = env_or("TRANSFER_CAP", cfg.transfer_cap).clamp(1, MAX_TRANSFER_CAP);

    cfg.trongrid_url = env_or("TRONGRID_URL", cfg.trongrid_url);
    cfg.trongrid_api_key = env_opt("TRONGRID_API_KEY");
    cfg.bscscan_url = env_or("BSCSCAN_URL", cfg.bscscan_url);
    cfg.bscscan_api_key = env_opt("BSCSCAN_API_KEY");
    cfg.solana_rpc_url = env_or("SOLANA_RPC_URL", cfg.solana_rpc_url);
    cfg.price_feed_url = env_or("PRICE_FEED_URL", cfg.price_feed_url);

    cfg.openai_url = env_or("OPENAI_URL", cfg.openai_url);
    cfg.openai_api_key = env_opt("OPENAI_API_KEY");
    cfg.openai_model = env_or("OPENAI_MODEL", cfg.openai_model);

    // Canonical stablecoin identifiers
    if let Some(contract) = env_opt("TRON_USDT_CONTRACT") {
        cfg.tron.tracked[0].identifier = contract;
    }
    if let Some(contract) = env_opt("BSC_USDT_CONTRACT") {
        cfg.bsc.tracked[0].identifier = contract;
    }
    if let Some(mint) = env_opt("SOLANA_USDT_MINT") {
        cfg.solana.tracked[0].identifier = mint;
    }

    cfg.tron.fallback_price = env_or("TRX_FALLBACK_PRICE", cfg.tron.fallback_price);
    cfg.bsc.fallback_price = env_or("BNB_FALLBACK_PRICE", cfg.bsc.fallback_price);
    cfg.solana.fallback_price = env_or("SOL_FALLBACK_PRICE", cfg.solana.fallback_price);

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}
