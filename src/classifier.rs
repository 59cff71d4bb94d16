// src/classifier.rs
use crate::models::NetworkKind;

/// Guess the network from the address shape alone.
///
/// First match wins: `0x` + 42 chars is EVM-style, `T` + 34 chars is TRON,
/// anything longer than 50 chars is taken as a base58 long-form key (SOLANA).
/// Never fails; unrecognised input is `Unknown`.
pub fn classify(raw: &str) -> NetworkKind {
    let len = raw.chars().count();

    if raw.starts_with("0x") && len == 42 {
        NetworkKind::Bep20
    } else if raw.starts_with('T') && len == 34 {
        NetworkKind::Tron
    } else if len > 50 {
        NetworkKind::Solana
    } else {
        NetworkKind::Unknown
    }
}
