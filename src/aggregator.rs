// src/aggregator.rs
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::explorer::{http_client, BscScanClient, ExplorerClient, SolanaRpcClient, TronGridClient};
use crate::models::{Address, NetworkKind, PriceSource, WalletSnapshot};
use crate::normalizer::SnapshotNormalizer;
use crate::risk::{Classifier, OpenAiClassifier, RiskSummarizer};
use crate::valuator::{CoinGeckoFeed, PriceCache, Valuator};

/// Pipeline stages, in order; every transition is unconditional
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classifying,
    Fetching,
    Normalizing,
    Valuing,
    Summarizing,
    Done,
}

/// Entry point of the pipeline: always returns a snapshot, failures end up in
/// its diagnostics and zeroed fields
pub struct WalletAggregator {
    config: Config,
    clients: HashMap<NetworkKind, Arc<dyn ExplorerClient>>,
    normalizer: SnapshotNormalizer,
    valuator: Valuator,
    summarizer: RiskSummarizer,
}

impl WalletAggregator {
    /// Aggregator without any explorer; add them with [`Self::with_client`]
    pub fn new(config: Config, valuator: Valuator, summarizer: RiskSummarizer) -> Self {
        let normalizer = SnapshotNormalizer::new(
            config.transfer_cap,
            config.counterparty_prefix,
            config.counterparty_suffix,
        );
        Self {
            config,
            clients: HashMap::new(),
            normalizer,
            valuator,
            summarizer,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn ExplorerClient>) -> Self {
        self.clients.insert(client.network(), client);
        self
    }

    /// Wire the production adapters; the price cache outlives single requests
    pub fn from_config(config: &Config, cache: Arc<PriceCache>) -> Result<Self, reqwest::Error> {
        let http = http_client(config.http_timeout)?;

        let classifier: Option<Arc<dyn Classifier>> = config.openai_api_key.as_deref().map(|key| {
            Arc::new(OpenAiClassifier::new(http.clone(), &config.openai_url, key, &config.openai_model))
                as Arc<dyn Classifier>
        });

        let valuator = Valuator::new(Arc::new(CoinGeckoFeed::new(http.clone(), &config.price_feed_url)), cache);

        let aggregator = Self::new(config.clone(), valuator, RiskSummarizer::new(classifier))
            .with_client(Arc::new(TronGridClient::new(
                http.clone(),
                &config.trongrid_url,
                config.trongrid_api_key.clone(),
                config.tron.tracked.clone(),
            )))
            .with_client(Arc::new(BscScanClient::new(
                http.clone(),
                &config.bscscan_url,
                config.bscscan_api_key.clone(),
                config.bsc.tracked.clone(),
            )))
            .with_client(Arc::new(SolanaRpcClient::new(
                http,
                &config.solana_rpc_url,
                config.solana.tracked.clone(),
            )));

        Ok(aggregator)
    }

    pub async fn aggregate(&self, address_text: &str) -> WalletSnapshot {
        enter(Stage::Classifying, address_text);
        let address = Address::new(address_text);
        let kind = address.network;
        info!("🔎 Inspecting {} as {}", address.raw, kind);

        // unrecognised input is a valid terminal result, nothing is fetched
        let (Some(network), Some(client)) = (self.config.network(kind), self.clients.get(&kind)) else {
            let mut snapshot = WalletSnapshot::empty(address);
            if kind != NetworkKind::Unknown {
                snapshot.diagnostics.push(format!("no explorer configured for {}", kind));
            }
            enter(Stage::Done, &snapshot.address.raw);
            return snapshot;
        };

        enter(Stage::Fetching, &address.raw);
        let (balances, transfers) = tokio::join!(
            client.fetch_balances(&address.raw),
            client.fetch_transfers(&address.raw, self.config.transfer_cap)
        );

        enter(Stage::Normalizing, &address.raw);
        let mut snapshot = self.normalizer.normalize(address, network, &balances, &transfers);

        enter(Stage::Valuing, &snapshot.address.raw);
        let quote = self.valuator.price(network).await;
        snapshot.native_price = quote.price;
        snapshot.price_source = Some(quote.source);
        let valuation = Valuator::value(&snapshot, quote.price);
        snapshot.fiat_total = valuation.total;
        snapshot.diagnostics.extend(valuation.notes);
        if quote.source != PriceSource::Live {
            snapshot.diagnostics.push(format!(
                "live {} price unavailable, using {} value {}",
                snapshot.native_asset,
                match quote.source {
                    PriceSource::Cached => "cached",
                    _ => "default",
                },
                quote.price
            ));
        }

        enter(Stage::Summarizing, &snapshot.address.raw);
        snapshot.risk = Some(self.summarizer.summarize(&snapshot).await);

        enter(Stage::Done, &snapshot.address.raw);
        info!(
            "✅ {} on {}: ~${} ({} diagnostics)",
            snapshot.address.raw,
            snapshot.network,
            snapshot.fiat_total.round_dp(2),
            snapshot.diagnostics.len()
        );
        snapshot
    }
}

fn enter(stage: Stage, address: &str) {
    debug!(?stage, "{}", address);
}
