use axum::{
    extract::Query,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::aggregator::WalletAggregator;
use crate::config::Config;
use crate::models::WalletSnapshot;
use crate::render::render;

/// Longest input accepted before the pipeline is even asked
pub const MAX_INPUT_LEN: usize = 128;

pub const LIVENESS: &str = "Wallet inspector running";

#[derive(Deserialize)]
pub struct WalletQuery {
    #[serde(default)]
    pub address: String,
}

type Rejection = (StatusCode, String);

pub fn router(aggregator: Arc<WalletAggregator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { LIVENESS }))
        .route("/wallet", get({
            let aggregator = Arc::clone(&aggregator);
            move |q: Query<WalletQuery>| {
                let aggregator = Arc::clone(&aggregator);
                async move { inspect(&aggregator, &q.address).await.map(Json) }
            }
        }))
        .route("/wallet/text", get({
            let aggregator = Arc::clone(&aggregator);
            move |q: Query<WalletQuery>| {
                let aggregator = Arc::clone(&aggregator);
                async move { inspect(&aggregator, &q.address).await.map(|s| render(&s)) }
            }
        }))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn serve(cfg: Config, aggregator: Arc<WalletAggregator>) -> eyre::Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.bind_addr, cfg.port).parse()?;
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(aggregator).into_make_service()).await?;

    Ok(())
}

async fn inspect(aggregator: &WalletAggregator, input: &str) -> Result<WalletSnapshot, Rejection> {
    check_input(input)?;
    Ok(aggregator.aggregate(input).await)
}

/// Cheap UX check; the classifier copes with anything that gets past it
pub fn check_input(input: &str) -> Result<(), Rejection> {
    let input = input.trim();
    if input.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "address is required".to_string()));
    }
    if input.chars().count() > MAX_INPUT_LEN {
        return Err((StatusCode::BAD_REQUEST, format!("address longer than {} characters", MAX_INPUT_LEN)));
    }
    Ok(())
}
