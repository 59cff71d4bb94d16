// src/normalizer.rs
use chrono::DateTime;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{NetworkSettings, TrackedToken};
use crate::explorer::{RawAmount, RawBalancePayload, RawTransfer, RawTransferPayload, TokenListing, TransferKind};
use crate::models::{Address, StablecoinBalance, Transfer, WalletSnapshot};

/// Maps raw explorer payloads onto [`WalletSnapshot`].
///
/// Leaves price and fiat total at zero; valuation happens afterwards.
#[derive(Debug, Clone)]
pub struct SnapshotNormalizer {
    pub transfer_cap: usize,
    pub counterparty_prefix: usize,
    pub counterparty_suffix: usize,
}

impl SnapshotNormalizer {
    pub fn new(transfer_cap: usize, counterparty_prefix: usize, counterparty_suffix: usize) -> Self {
        Self { transfer_cap, counterparty_prefix, counterparty_suffix }
    }

    pub fn normalize(
        &self,
        address: Address,
        network: &NetworkSettings,
        balances: &RawBalancePayload,
        transfers: &RawTransferPayload,
    ) -> WalletSnapshot {
        let mut snapshot = WalletSnapshot::empty(address);
        let diagnostics = &mut snapshot.diagnostics;

        // native balance
        match &balances.native {
            Ok(Some(raw)) => match to_decimal(raw, network.native_decimals) {
                Ok(amount) => snapshot.native_balance = amount,
                Err(reason) => diagnostics.push(format!("native balance unusable: {}", reason)),
            },
            Ok(None) => diagnostics.push(format!("account not found on {}", network.network)),
            Err(e) => diagnostics.push(format!("native balance unavailable: {}", e)),
        }

        // tracked stablecoins; always reported, zero when missing
        let listings: &[TokenListing] = match &balances.tokens {
            Ok(listings) => listings,
            Err(e) => {
                diagnostics.push(format!("token balances unavailable: {}", e));
                &[]
            }
        };
        for token in &network.tracked {
            let amount = match resolve_stablecoin(listings, token) {
                Some(listing) => to_decimal(&listing.amount, token.default_decimals).unwrap_or_else(|reason| {
                    diagnostics.push(format!("{} balance unusable: {}", token.symbol, reason));
                    Decimal::ZERO
                }),
                None => {
                    if balances.tokens.is_ok() {
                        diagnostics.push(format!("{} token not found", token.symbol));
                    }
                    Decimal::ZERO
                }
            };
            snapshot.stablecoin_balances.push(StablecoinBalance { symbol: token.symbol.clone(), amount });
        }

        // transfers: token records first, so equal timestamps keep that order
        let mut raw: Vec<&RawTransfer> = Vec::new();
        match &transfers.token {
            Ok(records) => raw.extend(records),
            Err(e) => diagnostics.push(format!("token transfers unavailable: {}", e)),
        }
        match &transfers.native {
            Ok(records) => raw.extend(records),
            Err(e) => diagnostics.push(format!("native transfers unavailable: {}", e)),
        }

        let mut recent: Vec<Transfer> = raw
            .into_iter()
            .filter_map(|t| match self.transfer(t, network) {
                Ok(transfer) => Some(transfer),
                Err(reason) => {
                    diagnostics.push(reason);
                    None
                }
            })
            .collect();

        recent.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at)); // stable
        recent.truncate(self.transfer_cap);
        snapshot.recent_transfers = recent;

        debug!(
            "Normalized {}: native={} stablecoins={} transfers={} diagnostics={}",
            snapshot.address.raw,
            snapshot.native_balance,
            snapshot.stablecoin_balances.len(),
            snapshot.recent_transfers.len(),
            snapshot.diagnostics.len()
        );

        snapshot
    }

    fn transfer(&self, raw: &RawTransfer, network: &NetworkSettings) -> Result<Transfer, String> {
        let (asset, default_decimals) = match &raw.kind {
            TransferKind::Native => (network.network.native_symbol().to_string(), network.native_decimals),
            TransferKind::Token { identifier } => {
                let token = network
                    .tracked
                    .iter()
                    .find(|t| identifiers_match(&t.identifier, identifier))
                    .ok_or_else(|| format!("skipped transfer of untracked token {}", identifier))?;
                (token.symbol.clone(), token.default_decimals)
            }
        };

        let amount = to_decimal(&raw.amount, default_decimals)
            .map_err(|reason| format!("skipped {} transfer: {}", asset, reason))?;
        let occurred_at = DateTime::from_timestamp_millis(raw.timestamp_ms)
            .ok_or_else(|| format!("skipped {} transfer: bad timestamp {}", asset, raw.timestamp_ms))?;

        Ok(Transfer {
            asset,
            amount,
            counterparty: shorten(&raw.counterparty, self.counterparty_prefix, self.counterparty_suffix),
            occurred_at,
            direction: raw.direction,
        })
    }
}

/// `base_units / 10^decimals`, using the source-declared decimals when present
pub fn to_decimal(raw: &RawAmount, default_decimals: u32) -> Result<Decimal, String> {
    let units: i128 = raw
        .base_units
        .trim()
        .parse::<u128>()
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or_else(|| format!("'{}' is not a base-unit integer", raw.base_units))?;

    let scale = raw.decimals.unwrap_or(default_decimals);
    Decimal::try_from_i128_with_scale(units, scale)
        .map(|d| d.normalize())
        .map_err(|e| format!("{} with {} decimals is out of range: {}", raw.base_units, scale, e))
}

/// Identifier match first; name + symbol only when no listing carries the
/// canonical identifier
pub fn resolve_stablecoin<'a>(listings: &'a [TokenListing], token: &TrackedToken) -> Option<&'a TokenListing> {
    listings
        .iter()
        .find(|l| l.identifier.as_deref().is_some_and(|id| identifiers_match(id, &token.identifier)))
        .or_else(|| {
            listings.iter().find(|l| {
                let name = l.name.as_deref().is_some_and(|n| n.trim().eq_ignore_ascii_case(&token.name));
                let symbol = l.symbol.as_deref().is_some_and(|s| s.trim().eq_ignore_ascii_case(&token.symbol));
                name && symbol
            })
        })
}

/// Hex identifiers are case-insensitive, base58 ones are not
fn identifiers_match(a: &str, b: &str) -> bool {
    if a.starts_with("0x") || a.starts_with("0X") {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// `TDqhrx...sdt6`: short prefix and suffix, never the full address
pub fn shorten(address: &str, prefix: usize, suffix: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= prefix + suffix + 3 {
        return address.to_string();
    }
    let head: String = chars[..prefix].iter().collect();
    let tail: String = chars[chars.len() - suffix..].iter().collect();
    format!("{}...{}", head, tail)
}
