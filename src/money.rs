//! Money Arithmetic Module
//!
//! Every monetary value in the ledger is a fixed-point decimal with
//! [`MONEY_SCALE`] fractional digits. All arithmetic results MUST be passed
//! through [`round`] before they are compared or stored.
//!
//! ## Rounding
//! Half-up (ties away from zero), matching the `NUMERIC(20,4)` columns of the
//! ledger schema.
//!
//! ## Usage
//! ```rust
//! use money_transfer::money::{multiply, parse_amount, round};
//! use rust_decimal::Decimal;
//!
//! let amount = parse_amount("100.00").unwrap();
//! let fee = multiply(amount, Decimal::new(1, 2)).unwrap(); // 1%
//! assert_eq!(fee, Decimal::new(1_0000, 4));
//! assert_eq!(round(Decimal::new(1_00005, 5)), Decimal::new(1_0001, 4));
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

/// Fractional digits carried by every monetary value
pub const MONEY_SCALE: u32 = 4;

/// Maximum integer digits accepted at the request boundary
pub const MAX_INTEGER_DIGITS: u32 = 15;

/// Largest balance a `NUMERIC(20,4)` column holds: 9999999999999999.9999
pub const MAX_STORED_BALANCE: Decimal =
    Decimal::from_parts(0x630F_FFFF, 0x6BC7_5E2D, 0x5, false, MONEY_SCALE);

/// Money arithmetic errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Round to the money scale using half-up.
#[inline]
pub fn round(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    // Pin the scale so "899" and "899.0000" render identically in logs and rows.
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Multiply two decimals and round the product.
pub fn multiply(a: Decimal, b: Decimal) -> Result<Decimal, MoneyError> {
    a.checked_mul(b).map(round).ok_or(MoneyError::Overflow)
}

/// Add two decimals and round the sum.
pub fn add(a: Decimal, b: Decimal) -> Result<Decimal, MoneyError> {
    a.checked_add(b).map(round).ok_or(MoneyError::Overflow)
}

/// Subtract `b` from `a` and round the difference.
pub fn subtract(a: Decimal, b: Decimal) -> Result<Decimal, MoneyError> {
    a.checked_sub(b).map(round).ok_or(MoneyError::Overflow)
}

/// Parse a client amount string.
///
/// Rejects more than [`MONEY_SCALE`] fractional digits instead of silently
/// rounding, and rejects zero or negative values.
pub fn parse_amount(amount_str: &str) -> Result<Decimal, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let decimal = Decimal::from_str(amount_str)
        .map_err(|e| MoneyError::InvalidFormat(format!("{}: {}", amount_str, e)))?;

    check_precision(decimal)?;

    if decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(round(decimal))
}

/// Check that a decimal fits the money scale and integer digit limits.
pub fn check_precision(decimal: Decimal) -> Result<(), MoneyError> {
    let normalized = decimal.normalize();
    if normalized.scale() > MONEY_SCALE {
        return Err(MoneyError::PrecisionOverflow {
            provided: normalized.scale(),
            max: MONEY_SCALE,
        });
    }

    let limit = Decimal::from(10u64.pow(MAX_INTEGER_DIGITS));
    if decimal.abs().trunc() >= limit {
        return Err(MoneyError::Overflow);
    }

    Ok(())
}

/// Format an amount with exactly [`MONEY_SCALE`] fractional digits.
pub fn format_amount(amount: Decimal) -> String {
    round(amount).to_string()
}
