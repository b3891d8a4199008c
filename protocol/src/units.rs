//! # Fixed-Point Amount Conversion
//!
//! The vault and token contracts store every amount as an integer scaled by
//! a fixed power of ten. This module converts between that representation
//! and the decimal strings the dashboard works with.
//!
//! The two directions deliberately follow different policies:
//!
//! - [`to_fixed_point`] is **strict**. It guards writes, so anything that is
//!   not a finite non-negative decimal is rejected with
//!   [`GatewayError::InvalidAmount`].
//! - [`from_fixed_point`] is **lenient**. It feeds display paths, so anything
//!   unparsable renders as `"0"`.
//!
//! All arithmetic works on decimal digit strings; binary floating point is
//! never involved, so conversions round-trip exactly.

use std::fmt;

use crate::error::{GatewayError, Result};

/// Decimal exponent of token and vault principal amounts (PDOT, pTokens).
pub const TOKEN_DECIMALS: u32 = 9;

/// Decimal exponent of the vault's exchange rate.
pub const EXCHANGE_RATE_DECIMALS: u32 = 6;

/// Amount minted per faucet request: 1000 PDOT in contract units.
pub const MINT_AMOUNT_UNITS: u128 = 1_000 * 10u128.pow(TOKEN_DECIMALS);

/// Largest exponent we accept. `10^38` is the biggest power of ten in `u128`.
const MAX_EXPONENT: u32 = 38;

/// An integer amount paired with its decimal exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    /// Scaled integer value as stored by the contract.
    pub value: u128,
    /// Power of ten the value is scaled by.
    pub exponent: u32,
}

impl FixedPoint {
    /// Parses a decimal string at the given exponent. See [`to_fixed_point`].
    pub fn parse(decimal: &str, exponent: u32) -> Result<Self> {
        Ok(Self {
            value: to_fixed_point(decimal, exponent)?,
            exponent,
        })
    }

    /// Token amount (9 decimals).
    pub fn token(decimal: &str) -> Result<Self> {
        Self::parse(decimal, TOKEN_DECIMALS)
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.value.to_string(), self.exponent, false))
    }
}

/// Converts a human-readable decimal into contract units, truncating any
/// precision below `10^-exponent`.
///
/// Accepts an optional leading `+`, at most one `.`, and an optional
/// `e`/`E` exponent so that JSON numbers such as `1e-7` are understood.
///
/// ```
/// use peridot_protocol::units::to_fixed_point;
///
/// assert_eq!(to_fixed_point("1.5", 9).unwrap(), 1_500_000_000);
/// assert_eq!(to_fixed_point("0.0000000019", 9).unwrap(), 1);
/// assert!(to_fixed_point("-1", 9).is_err());
/// ```
pub fn to_fixed_point(decimal: &str, exponent: u32) -> Result<u128> {
    let invalid = || GatewayError::InvalidAmount(format!("{:?} is not a non-negative number", decimal));

    if exponent > MAX_EXPONENT {
        return Err(GatewayError::InvalidAmount(format!(
            "exponent {} exceeds {}",
            exponent, MAX_EXPONENT
        )));
    }

    let s = decimal.trim();
    let s = s.strip_prefix('+').unwrap_or(s);

    let (mantissa, sci_exp) = match s.find(|c: char| c == 'e' || c == 'E') {
        Some(i) => {
            let exp: i64 = s[i + 1..].parse().map_err(|_| invalid())?;
            (&s[..i], exp)
        }
        None => (s, 0),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    // digits * 10^(shift) is the scaled value, where shift counts how far the
    // implied decimal point moves right of the last digit.
    let digits = format!("{}{}", int_part, frac_part);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    let shift = (exponent as i64)
        .saturating_add(sci_exp)
        .saturating_sub(frac_part.len() as i64);

    let kept = if shift >= 0 {
        if shift > MAX_EXPONENT as i64 + 1 {
            return Err(GatewayError::InvalidAmount(format!("{:?} overflows", decimal)));
        }
        let mut owned = digits.to_string();
        owned.extend(std::iter::repeat('0').take(shift as usize));
        owned
    } else {
        let drop = shift.unsigned_abs();
        if drop >= digits.len() as u64 {
            return Ok(0);
        }
        digits[..digits.len() - drop as usize].to_string()
    };

    kept.parse::<u128>()
        .map_err(|_| GatewayError::InvalidAmount(format!("{:?} overflows", decimal)))
}

/// Converts contract units back into a canonical decimal string.
///
/// Accepts an optionally quoted, optionally signed integer (the shapes the
/// CLI and the SDK codec print). Returns `"0"` for anything else.
///
/// ```
/// use peridot_protocol::units::from_fixed_point;
///
/// assert_eq!(from_fixed_point("1000000000", 9), "1");
/// assert_eq!(from_fixed_point("\"1500000\"", 6), "1.5");
/// assert_eq!(from_fixed_point("not-a-number", 9), "0");
/// ```
pub fn from_fixed_point(raw: &str, exponent: u32) -> String {
    let s = raw.trim();
    let s = s
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
        .trim();

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return "0".to_string();
    }

    render(digits, exponent, negative)
}

/// Typed variant of [`from_fixed_point`] for already-decoded integers.
pub fn from_fixed_point_int(value: i128, exponent: u32) -> String {
    render(&value.unsigned_abs().to_string(), exponent, value < 0)
}

/// Places the decimal point `exponent` digits from the right and strips
/// redundant zeros.
fn render(digits: &str, exponent: u32, negative: bool) -> String {
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return "0".to_string();
    }

    let exp = exponent as usize;
    let padded = if digits.len() <= exp {
        format!("{}{}", "0".repeat(exp - digits.len() + 1), digits)
    } else {
        digits.to_string()
    };

    let split = padded.len() - exp;
    let (int_part, frac_part) = padded.split_at(split);
    let frac_part = frac_part.trim_end_matches('0');

    let mut out = String::with_capacity(padded.len() + 2);
    if negative {
        out.push('-');
    }
    out.push_str(int_part);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
