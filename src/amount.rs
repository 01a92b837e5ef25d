//! Human amount parsing and formatting
//!
//! Amounts are entered either in base units (`"1000000000000000000"`) or in
//! token units with a decimal point (`"1.5"`). A decimal point is the only
//! thing that switches to token units.

use alloy::primitives::U256;

use crate::error::CouponError;

/// Decimals used by the claim tokens this tool was built for.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Largest `decimals` for which `10^decimals` fits in a 256-bit word.
pub const MAX_DECIMALS: u8 = 77;

fn scale(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// Parse an amount string into base units.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, CouponError> {
    if decimals > MAX_DECIMALS {
        return Err(CouponError::InvalidAmount(format!(
            "token decimals {} out of range (max {})",
            decimals, MAX_DECIMALS
        )));
    }

    let amount = amount.trim();
    let (whole, frac) = match amount.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (amount, None),
    };

    let whole = parse_digits(whole, "whole part")?;

    let Some(frac) = frac else {
        return Ok(whole);
    };

    if frac.len() > decimals as usize {
        return Err(CouponError::InvalidAmount(format!(
            "too many decimal places ({}, max {})",
            frac.len(),
            decimals
        )));
    }
    let frac_value = if frac.is_empty() {
        U256::ZERO
    } else {
        parse_digits(frac, "fractional part")?
    };

    let frac_scale = scale(decimals - frac.len() as u8);
    whole
        .checked_mul(scale(decimals))
        .and_then(|w| frac_value.checked_mul(frac_scale).and_then(|f| w.checked_add(f)))
        .ok_or(CouponError::FieldOverflow {
            field: "withdraw_amount",
        })
}

fn parse_digits(s: &str, part: &str) -> Result<U256, CouponError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CouponError::InvalidAmount(format!("invalid {}: '{}'", part, s)));
    }
    U256::from_str_radix(s, 10).map_err(|_| CouponError::FieldOverflow {
        field: "withdraw_amount",
    })
}

/// Render base units as a token amount, trimming trailing zeros.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if decimals == 0 || decimals > MAX_DECIMALS {
        return amount.to_string();
    }
    let unit = scale(decimals);
    let whole = amount / unit;
    let frac = amount % unit;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
