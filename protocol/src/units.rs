//! # Token Units
//!
//! The ledger only ever stores integers in the smallest unit (18 fractional
//! digits). Humans think in whole tokens. This module converts between the
//! two without ever touching floating point, because `0.1 + 0.2` has no
//! business anywhere near a balance.

use thiserror::Error;

use crate::config::{ONE_TOKEN, TOKEN_DECIMALS};

/// Errors produced when parsing a decimal token amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    /// The string was not a non-negative decimal number.
    #[error("invalid token amount: {0:?}")]
    Malformed(String),

    /// More fractional digits than the token supports.
    #[error("too many fractional digits in {value:?}: token has {max}")]
    TooPrecise {
        /// The rejected input.
        value: String,
        /// Supported fractional digits.
        max: u8,
    },

    /// The amount does not fit in a `u128` of smallest units.
    #[error("token amount overflows: {0:?}")]
    Overflow(String),
}

/// Converts whole tokens into smallest units. `None` on overflow.
pub fn tokens(whole: u128) -> Option<u128> {
    whole.checked_mul(ONE_TOKEN)
}

/// Parses a decimal token amount such as `"12"` or `"0.5"` into smallest units.
///
/// # Errors
///
/// Returns [`UnitsError`] for malformed input, excess precision, or overflow.
pub fn parse_units(value: &str) -> Result<u128, UnitsError> {
    let trimmed = value.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty())
        || !digits_only(whole)
        || !digits_only(frac)
        || (trimmed.contains('.') && frac.is_empty())
    {
        return Err(UnitsError::Malformed(value.to_string()));
    }
    if frac.len() > TOKEN_DECIMALS as usize {
        return Err(UnitsError::TooPrecise {
            value: value.to_string(),
            max: TOKEN_DECIMALS,
        });
    }

    let overflow = || UnitsError::Overflow(value.to_string());
    let whole_units = if whole.is_empty() {
        0
    } else {
        let w: u128 = whole.parse().map_err(|_| overflow())?;
        tokens(w).ok_or_else(overflow)?
    };

    let frac_units = if frac.is_empty() {
        0
    } else {
        let scale = 10u128.pow(TOKEN_DECIMALS as u32 - frac.len() as u32);
        let f: u128 = frac.parse().map_err(|_| overflow())?;
        f * scale
    };

    whole_units.checked_add(frac_units).ok_or_else(overflow)
}

/// Renders smallest units as a decimal token amount, trimming trailing
/// zeros: `10_500_000_000_000_000_000` becomes `"10.5"`.
pub fn format_units(amount: u128) -> String {
    let whole = amount / ONE_TOKEN;
    let frac = amount % ONE_TOKEN;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:0width$}", frac, width = TOKEN_DECIMALS as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}
