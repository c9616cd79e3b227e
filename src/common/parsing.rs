// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{WEI_PER_ETH, WEI_PER_GWEI};
use alloy::primitives::U256;
use alloy::primitives::utils::{format_units, parse_ether};

pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn parse_u128_hex(s: &str) -> Option<u128> {
    u128::from_str_radix(strip_0x(s), 16).ok()
}

/// Relays report quantities as JSON numbers, decimal strings or 0x-hex strings.
pub fn parse_quantity(value: &serde_json::Value) -> Option<u128> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(u128::from),
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.starts_with("0x") || s.starts_with("0X") {
                parse_u128_hex(s)
            } else {
                s.parse::<u128>().ok()
            }
        }
        _ => None,
    }
}

/// "0.002" -> wei.
pub fn parse_ether_amount(raw: &str) -> Option<U256> {
    parse_ether(raw.trim()).ok()
}

pub fn gwei_to_wei(gwei: f64) -> u128 {
    if !gwei.is_finite() || gwei <= 0.0 {
        return 0;
    }
    (gwei * WEI_PER_GWEI as f64).round() as u128
}

pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI as f64
}

pub fn format_gwei(wei: u128) -> String {
    format!("{:.2}", wei_to_gwei(wei))
}

pub fn format_eth(wei: U256) -> String {
    format_units(wei, "ether")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .map(|v| format!("{v:.6}"))
        .unwrap_or_else(|| {
            let whole = wei / U256::from(WEI_PER_ETH);
            format!("{whole}")
        })
}
