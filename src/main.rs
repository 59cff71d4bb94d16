use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use wallet_inspector::{api, config, valuator::PriceCache, WalletAggregator};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Wallet inspector starting...");

    let cfg = config::load()?;
    info!("  Port: {}", cfg.port);
    info!("  Transfer cap: {}", cfg.transfer_cap);
    info!("  Classifier: {}", if cfg.openai_api_key.is_some() { cfg.openai_model.as_str() } else { "disabled" });
    debug!("{:?}", cfg);

    // Price cache lives for the whole process
    let cache = Arc::new(PriceCache::default());
    let aggregator = Arc::new(WalletAggregator::from_config(&cfg, cache)?);

    let api_handle = tokio::spawn({
        let cfg = cfg.clone();
        let aggregator = Arc::clone(&aggregator);
        async move { api::serve(cfg, aggregator).await }
    });

    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Wallet inspector stopped.");
    Ok(())
}
