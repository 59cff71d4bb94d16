// src/render.rs
use rust_decimal::Decimal;
use std::fmt::Write;

use crate::models::{Direction, NetworkKind, WalletSnapshot};
use crate::normalizer::shorten;

/// Plain-text reply for chat front ends. Zero balances are always shown.
pub fn render(snapshot: &WalletSnapshot) -> String {
    let mut out = String::new();
    let wallet = shorten(&snapshot.address.raw, 10, 4);

    if snapshot.network == NetworkKind::Unknown {
        let _ = write!(
            out,
            "Wallet: {}\nNetwork: UNKNOWN\nAddress format not recognised (expected TRON, BEP20 or SOLANA).",
            wallet
        );
        return out;
    }

    let native_fiat = snapshot.native_balance.checked_mul(snapshot.native_price);
    let mut balance = format!("{}: {}", snapshot.native_asset, money(snapshot.native_balance, native_fiat));
    for coin in &snapshot.stablecoin_balances {
        let _ = write!(balance, " | {}: {}", coin.symbol, money(coin.amount, Some(coin.amount)));
    }

    let _ = writeln!(out, "Wallet: {}", wallet);
    let _ = writeln!(out, "Network: {}", snapshot.network);
    let _ = writeln!(out, "Balance: {}", balance);
    let _ = writeln!(out, "Total: ~${:.2}", snapshot.fiat_total);

    if snapshot.recent_transfers.is_empty() {
        let _ = writeln!(out, "Transfers: none");
    } else {
        let _ = writeln!(out, "Transfers:");
        for t in &snapshot.recent_transfers {
            let arrow = match t.direction {
                Direction::Out => "→",
                Direction::In => "←",
                Direction::Unknown => "↔",
            };
            let _ = writeln!(
                out,
                "{} {} | {:.2} {} | {}",
                arrow,
                t.counterparty,
                t.amount,
                t.asset,
                t.occurred_at.format("%d.%m %H:%M")
            );
        }
    }

    if let Some(risk) = &snapshot.risk {
        let _ = writeln!(out, "Risk: {}", risk);
    }

    // notes only help when something came back empty
    let any_zero = snapshot.native_balance.is_zero() || snapshot.stablecoin_balances.iter().any(|b| b.amount.is_zero());
    if any_zero && !snapshot.diagnostics.is_empty() {
        let _ = writeln!(out, "Notes:");
        for note in &snapshot.diagnostics {
            let _ = writeln!(out, "- {}", note);
        }
    }

    out.trim_end().to_string()
}

fn money(amount: Decimal, fiat: Option<Decimal>) -> String {
    match fiat {
        Some(fiat) => format!("{:.2} (~${:.2})", amount, fiat),
        None => format!("{:.2} (~$?)", amount),
    }
}
