//! Ether denomination parsing and formatting

use crate::error::{GatewayError, GatewayResult};

use ethers::types::U256;
use ethers::utils::{format_units, parse_ether};
use lazy_static::lazy_static;
use regex::Regex;

/// Fractional digits of one ether
pub const ETHER_DECIMALS: usize = 18;

lazy_static! {
    static ref AMOUNT_RE: Regex = Regex::new(r"^\d+(\.\d+)?$").unwrap();
}

/// Parse a decimal ether amount into wei. The amount must be positive.
pub fn parse_ether_amount(value: &str) -> GatewayResult<U256> {
    let value = value.trim();
    if !AMOUNT_RE.is_match(value) {
        return Err(GatewayError::InvalidAmount(value.to_string()));
    }

    if let Some((_, fraction)) = value.split_once('.') {
        if fraction.len() > ETHER_DECIMALS {
            return Err(GatewayError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                value, ETHER_DECIMALS
            )));
        }
    }

    let wei = parse_ether(value).map_err(|e| GatewayError::InvalidAmount(e.to_string()))?;
    if wei.is_zero() {
        return Err(GatewayError::InvalidAmount(format!(
            "{} must be greater than zero",
            value
        )));
    }

    Ok(wei)
}

/// Format wei as ether without trailing fractional zeros
pub fn format_ether(wei: U256) -> String {
    format_trimmed(wei, "ether")
}

/// Format wei as gwei without trailing fractional zeros
pub fn format_gwei(wei: U256) -> String {
    format_trimmed(wei, "gwei")
}

fn format_trimmed(wei: U256, unit: &str) -> String {
    // Both unit names are known to ethers; fall back to the raw wei value anyway
    let formatted = format_units(wei, unit).unwrap_or_else(|_| wei.to_string());
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

/// Add `percent`% headroom to a value
pub fn with_buffer(value: U256, percent: u64) -> U256 {
    if percent == 0 {
        return value;
    }
    value.saturating_add(value.saturating_mul(U256::from(percent)) / U256::from(100))
}
