/// Small shared helpers

use crate::constants::LAMPORTS_PER_SOL;

/// Truncate a string to at most `max_len` characters without panicking on
/// short input. Used to keep addresses readable in logs.
pub fn safe_truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Rounded, not truncated - 0.03 * 1e9 lands just below the integer in f64
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

/// Solscan link for a transaction signature, for log lines
pub fn solscan_tx_url(signature: &str) -> String {
    format!("https://solscan.io/tx/{}", signature)
}

/// Compact USD formatting for market caps: $1.2K, $3.4M
pub fn format_usd_compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000_000.0 {
        format!("${:.1}B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("${:.1}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else {
        format!("${:.1}", value)
    }
}

/// Deterministic embed color derived from a string (same hash the web
/// frontends use, so a token keeps its color across surfaces).
pub fn string_to_color(s: &str) -> u32 {
    let mut hash: i32 = 0;
    for c in s.chars() {
        hash = (c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    let mut color: u32 = 0;
    for i in 0..3 {
        let value = (hash >> (i * 8)) & 0xff;
        color = (color << 8) | value as u32;
    }
    color
}
