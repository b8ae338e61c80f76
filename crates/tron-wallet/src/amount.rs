use crate::errors::WalletError;
use rust_decimal::prelude::ToPrimitive as _;
use rust_decimal::Decimal;
use std::str::FromStr as _;

/// Both TRX (sun) and TRC-20 USDT use six decimal places.
pub const TRX_DECIMALS: u32 = 6;
pub const USDT_DECIMALS: u32 = 6;

/// Parse a user-entered amount. Accepts plain and scientific notation; the result is always
/// strictly greater than zero.
pub fn parse_positive_amount(s: &str) -> Result<Decimal, WalletError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(WalletError::validation("Invalid amount"));
    }
    let v = Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| WalletError::validation(format!("Invalid amount: {e}")))?;
    if v <= Decimal::ZERO {
        return Err(WalletError::validation("Invalid amount"));
    }
    Ok(v)
}

/// Convert a UI amount into integer base units (`amount * 10^decimals`).
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u64, WalletError> {
    let scale = 10_u64
        .checked_pow(decimals)
        .ok_or_else(|| WalletError::validation("decimals too large"))?;
    let base = amount
        .checked_mul(Decimal::from(scale))
        .ok_or_else(|| WalletError::validation("amount overflow"))?;
    if !base.fract().is_zero() {
        return Err(WalletError::validation(format!(
            "too many decimal places (max {decimals})"
        )));
    }
    base.to_u64()
        .ok_or_else(|| WalletError::validation("amount overflow"))
}

/// Format a base-unit integer amount into a UI decimal string without using floats.
///
/// Examples:
/// - base=1500000, decimals=6 => "1.5"
/// - base=1, decimals=6 => "0.000001"
pub fn format_base_units(base: u128, decimals: u32) -> eyre::Result<String> {
    if decimals == 0 {
        return Ok(base.to_string());
    }
    let scale = 10_u128
        .checked_pow(decimals)
        .ok_or_else(|| eyre::eyre!("decimals too large"))?;
    let whole = base / scale;
    let frac = base % scale;
    if frac == 0 {
        return Ok(whole.to_string());
    }
    let mut frac_s = format!("{frac:0width$}", width = decimals as usize);
    while frac_s.ends_with('0') {
        frac_s.pop();
    }
    Ok(format!("{whole}.{frac_s}"))
}
