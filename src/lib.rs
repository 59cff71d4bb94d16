//! Wallet snapshot pipeline: classify an address, pull balances and recent
//! transfers from the matching explorer, normalize them, value them in USD and
//! ask a classifier for a short risk verdict.

pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod explorer;
pub mod models;
pub mod normalizer;
pub mod render;
pub mod risk;
pub mod valuator;

pub use aggregator::{Stage, WalletAggregator};
pub use models::{Address, NetworkKind, WalletSnapshot};
