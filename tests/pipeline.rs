use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wallet_inspector::config::Config;
use wallet_inspector::models::{Direction, PriceSource, RiskVerdict, StablecoinBalance};
use wallet_inspector::render::render;
use wallet_inspector::valuator::PriceCache;
use wallet_inspector::{NetworkKind, WalletAggregator};

const TRON_WALLET: &str = "TDqhrxGnktwBCim5ZXcJPvMWASSfYWsdt6";
const TRON_USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
const PEER: &str = "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn config_for(server: &MockServer) -> Config {
    Config {
        http_timeout: Duration::from_secs(2),
        trongrid_url: server.uri(),
        bscscan_url: format!("{}/api", server.uri()),
        solana_rpc_url: format!("{}/rpc", server.uri()),
        price_feed_url: server.uri(),
        openai_url: server.uri(),
        ..Config::default()
    }
}

async fn mount_tron_wallet(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/accounts/{}", TRON_WALLET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{ "balance": 1_500_000, "trc20": [{ TRON_USDT: "2000000" }] }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/accounts/{}/transactions/trc20", TRON_WALLET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                {
                    "token_info": { "address": TRON_USDT, "decimals": 6, "symbol": "USDT", "name": "Tether USD" },
                    "block_timestamp": 1_700_000_000_000i64,
                    "from": PEER, "to": TRON_WALLET, "type": "Transfer", "value": "2000000"
                }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/accounts/{}/transactions", TRON_WALLET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": [] })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn tron_wallet_end_to_end() {
    let server = MockServer::start().await;
    mount_tron_wallet(&server).await;

    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "tron"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tron": { "usd": 0.15 } })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "OK: small personal wallet" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = Config { openai_api_key: Some("sk-test".into()), ..config_for(&server) };
    let aggregator = WalletAggregator::from_config(&cfg, Arc::new(PriceCache::default())).unwrap();

    let snapshot = aggregator.aggregate(&format!("  {}\n", TRON_WALLET)).await;

    assert_eq!(snapshot.network, NetworkKind::Tron);
    assert_eq!(snapshot.address.raw, TRON_WALLET);
    assert_eq!(snapshot.native_balance, dec("1.5"));
    assert_eq!(snapshot.stablecoin_balances, vec![StablecoinBalance { symbol: "USDT".into(), amount: dec("2") }]);
    assert_eq!(snapshot.price_source, Some(PriceSource::Live));
    assert_eq!(snapshot.fiat_total, dec("2.225"));
    assert_eq!(snapshot.risk, Some(RiskVerdict("OK: small personal wallet".into())));
    assert!(snapshot.diagnostics.is_empty(), "{:?}", snapshot.diagnostics);

    assert_eq!(snapshot.recent_transfers.len(), 1);
    let transfer = &snapshot.recent_transfers[0];
    assert_eq!(transfer.asset, "USDT");
    assert_eq!(transfer.amount, dec("2"));
    assert_eq!(transfer.direction, Direction::In);
    assert_eq!(transfer.counterparty, "TJRabP...RTv8");

    let text = render(&snapshot);
    assert!(text.contains("Total: ~$2.22") || text.contains("Total: ~$2.23"));
    assert!(text.contains("Risk: OK: small personal wallet"));
}

#[tokio::test]
async fn cached_price_survives_a_feed_outage() {
    let server = MockServer::start().await;
    mount_tron_wallet(&server).await;

    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tron": { "usd": 0.2 } })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let cache = Arc::new(PriceCache::default());
    let cfg = config_for(&server);

    let first = WalletAggregator::from_config(&cfg, cache.clone()).unwrap().aggregate(TRON_WALLET).await;
    assert_eq!(first.price_source, Some(PriceSource::Live));

    // feed now answers 404; a new aggregator shares the same cache
    let second = WalletAggregator::from_config(&cfg, cache).unwrap().aggregate(TRON_WALLET).await;
    assert_eq!(second.price_source, Some(PriceSource::Cached));
    assert_eq!(second.native_price, dec("0.2"));
    assert_eq!(second.fiat_total, dec("1.5") * dec("0.2") + dec("2"));
    assert!(second.risk.as_ref().is_some_and(RiskVerdict::is_unavailable));
}

#[tokio::test]
async fn every_network_degrades_when_all_sources_fail() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cfg = config_for(&server);
    let aggregator = WalletAggregator::from_config(&cfg, Arc::new(PriceCache::default())).unwrap();

    for (address, network) in [
        (TRON_WALLET.to_string(), NetworkKind::Tron),
        ("0x8894e0a0c962cb723c1976a4421c95949be2d4e3".to_string(), NetworkKind::Bep20),
        ("4".repeat(60), NetworkKind::Solana),
    ] {
        let snapshot = aggregator.aggregate(&address).await;
        assert_eq!(snapshot.network, network);
        assert_eq!(snapshot.native_balance, Decimal::ZERO);
        assert!(snapshot.stablecoin_balances.iter().all(|b| b.amount.is_zero()));
        assert!(snapshot.recent_transfers.is_empty());
        assert_eq!(snapshot.fiat_total, Decimal::ZERO);
        assert_eq!(snapshot.price_source, Some(PriceSource::Default));
        assert!(snapshot.diagnostics.iter().any(|d| d.contains("HTTP 500")), "{:?}", snapshot.diagnostics);
    }
}

#[tokio::test]
async fn unrecognised_input_touches_nothing() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cfg = Config { openai_api_key: Some("sk-test".into()), ..config_for(&server) };
    let aggregator = WalletAggregator::from_config(&cfg, Arc::new(PriceCache::default())).unwrap();

    let snapshot = aggregator.aggregate("hello").await;
    assert_eq!(snapshot.network, NetworkKind::Unknown);
    assert!(snapshot.stablecoin_balances.is_empty());
    assert_eq!(snapshot.fiat_total, Decimal::ZERO);
    assert!(snapshot.diagnostics.is_empty());
}
