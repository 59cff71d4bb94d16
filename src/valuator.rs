// src/valuator.rs
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromStr;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::config::NetworkSettings;
use crate::error::{FetchError, Fetched};
use crate::explorer::get_json;
use crate::models::{PriceSource, WalletSnapshot};

const SOURCE: &str = "price feed";

/// Last good native prices, shared by every request.
///
/// No expiry: an entry is only replaced by the next successful live lookup,
/// last writer wins. Readers may see a value that is being refreshed.
#[derive(Debug, Default)]
pub struct PriceCache {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl PriceCache {
    pub fn get(&self, price_id: &str) -> Option<Decimal> {
        // a poisoned lock just means "nothing cached"
        self.prices.read().ok()?.get(price_id).copied()
    }

    pub fn put(&self, price_id: &str, price: Decimal) {
        if let Ok(mut prices) = self.prices.write() {
            prices.insert(price_id.to_string(), price);
        }
    }
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn usd_price(&self, price_id: &str) -> Fetched<Decimal>;
}

/// CoinGecko `simple/price` endpoint
pub struct CoinGeckoFeed {
    http: Client,
    base_url: String,
}

impl CoinGeckoFeed {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn usd_price(&self, price_id: &str) -> Fetched<Decimal> {
        let req = self
            .http
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", price_id), ("vs_currencies", "usd")]);
        let body: Value = get_json(req, SOURCE).await?;

        let number = body
            .get(price_id)
            .and_then(|asset| asset.get("usd"))
            .and_then(Value::as_f64)
            .ok_or_else(|| FetchError::decode(SOURCE, format!("no usd rate for {}", price_id)))?;

        // f64 → Decimal via its shortest text form
        let price = Decimal::from_str(&number.to_string()).map_err(|e| FetchError::decode(SOURCE, e))?;
        if price <= Decimal::ZERO {
            return Err(FetchError::decode(SOURCE, format!("non-positive rate {} for {}", price, price_id)));
        }
        Ok(price)
    }
}

/// Fiat total plus a note for every term that had to be left out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valuation {
    pub total: Decimal,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: Decimal,
    pub source: PriceSource,
}

pub struct Valuator {
    feed: Arc<dyn PriceFeed>,
    cache: Arc<PriceCache>,
}

impl Valuator {
    pub fn new(feed: Arc<dyn PriceFeed>, cache: Arc<PriceCache>) -> Self {
        Self { feed, cache }
    }

    /// Live price, else last cached, else the configured static default
    pub async fn price(&self, network: &NetworkSettings) -> PriceQuote {
        match self.feed.usd_price(&network.price_id).await {
            Ok(price) => {
                self.cache.put(&network.price_id, price);
                debug!("💲 {} = {} (live)", network.price_id, price);
                PriceQuote { price, source: PriceSource::Live }
            }
            Err(e) => {
                warn!("Price lookup for {} failed: {}", network.price_id, e);
                match self.cache.get(&network.price_id) {
                    Some(price) => PriceQuote { price, source: PriceSource::Cached },
                    None => PriceQuote { price: network.fallback_price, source: PriceSource::Default },
                }
            }
        }
    }

    /// `native × price + Σ stablecoins`; stablecoins count 1:1. A term that
    /// overflows the decimal range is left out of the total and noted.
    pub fn value(snapshot: &WalletSnapshot, native_price: Decimal) -> Valuation {
        let mut notes = Vec::new();

        let native = match snapshot.native_balance.checked_mul(native_price) {
            Some(fiat) => fiat,
            None => {
                notes.push(format!(
                    "{} {} at {} USD is out of range, left out of the total",
                    snapshot.native_balance, snapshot.native_asset, native_price
                ));
                Decimal::ZERO
            }
        };

        let stable = match snapshot.stablecoin_total() {
            Some(total) => total,
            None => {
                notes.push("stablecoin balances are out of range, left out of the total".to_string());
                Decimal::ZERO
            }
        };

        let total = match native.checked_add(stable) {
            Some(total) => total,
            None => {
                notes.push("stablecoin balances overflow the total, left out".to_string());
                native
            }
        };

        if !notes.is_empty() {
            warn!("Valuation of {} dropped {} term(s)", snapshot.address.raw, notes.len());
        }
        Valuation { total, notes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Address, StablecoinBalance};
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Replays scripted answers
    struct ScriptedFeed(Mutex<Vec<Fetched<Decimal>>>);

    #[async_trait]
    impl PriceFeed for ScriptedFeed {
        async fn usd_price(&self, _price_id: &str) -> Fetched<Decimal> {
            self.0.lock().unwrap().remove(0)
        }
    }

    fn down() -> Fetched<Decimal> {
        Err(FetchError::Timeout { source_name: SOURCE.into() })
    }

    #[tokio::test]
    async fn falls_back_to_cache_then_default() {
        let cfg = Config::default();
        let feed = ScriptedFeed(Mutex::new(vec![down(), Ok(dec("0.2")), down()]));
        let valuator = Valuator::new(Arc::new(feed), Arc::new(PriceCache::default()));

        let first = valuator.price(&cfg.tron).await;
        assert_eq!(first, PriceQuote { price: dec("0.15"), source: PriceSource::Default });

        let second = valuator.price(&cfg.tron).await;
        assert_eq!(second, PriceQuote { price: dec("0.2"), source: PriceSource::Live });

        let third = valuator.price(&cfg.tron).await;
        assert_eq!(third, PriceQuote { price: dec("0.2"), source: PriceSource::Cached });
    }

    #[test]
    fn cache_is_keyed_per_asset() {
        let cache = PriceCache::default();
        cache.put("tron", dec("0.1"));
        cache.put("tron", dec("0.12"));
        assert_eq!(cache.get("tron"), Some(dec("0.12")));
        assert_eq!(cache.get("solana"), None);
    }

    #[test]
    fn value_applies_the_fiat_formula() {
        let mut snapshot = WalletSnapshot::empty(Address::new("TDqhrxGnktwBCim5ZXcJPvMWASSfYWsdt6"));
        snapshot.native_balance = dec("1.5");
        snapshot.stablecoin_balances = vec![
            StablecoinBalance { symbol: "USDT".into(), amount: dec("2") },
            StablecoinBalance { symbol: "USDC".into(), amount: dec("0.5") },
        ];
        assert_eq!(
            Valuator::value(&snapshot, dec("0.15")),
            Valuation { total: dec("2.725"), notes: vec![] }
        );
    }

    #[test]
    fn out_of_range_terms_are_left_out() {
        let mut snapshot = WalletSnapshot::empty(Address::new("TDqhrxGnktwBCim5ZXcJPvMWASSfYWsdt6"));
        snapshot.native_balance = Decimal::MAX;
        snapshot.stablecoin_balances = vec![StablecoinBalance { symbol: "USDT".into(), amount: dec("2") }];

        let valuation = Valuator::value(&snapshot, dec("300"));
        assert_eq!(valuation.total, dec("2"));
        assert_eq!(valuation.notes.len(), 1);

        snapshot.native_balance = dec("1");
        snapshot.stablecoin_balances.push(StablecoinBalance { symbol: "USDC".into(), amount: Decimal::MAX });
        let valuation = Valuator::value(&snapshot, dec("300"));
        assert_eq!(valuation.total, dec("300"));
        assert!(valuation.notes[0].contains("stablecoin"));
    }

    #[tokio::test]
    async fn coingecko_rate_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "tron"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tron": { "usd": 0.1534 } })))
            .mount(&server)
            .await;

        let feed = CoinGeckoFeed::new(Client::new(), &server.uri());
        assert_eq!(feed.usd_price("tron").await.unwrap(), dec("0.1534"));
        assert!(matches!(feed.usd_price("solana").await, Err(FetchError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn missing_asset_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let feed = CoinGeckoFeed::new(Client::new(), &server.uri());
        assert!(matches!(feed.usd_price("tron").await, Err(FetchError::Decode { .. })));
    }
}
