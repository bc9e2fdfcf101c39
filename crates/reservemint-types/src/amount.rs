//! Amount normalization
//!
//! Token balances arrive as unsigned integers in the token's smallest unit
//! (e.g. 10^-6 USDT). Mint amounts are semantic decimals. Every comparison
//! between the two happens on exact `Decimal` values, never floats.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, TypesError};

/// Maximum precision `Decimal` can carry
pub const MAX_DECIMALS: u8 = 28;

/// Balance exactly as reported by a balance source, in smallest units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBalance(pub String);

impl RawBalance {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Normalize using the given decimal precision
    pub fn normalize(&self, decimals: u8) -> Result<Decimal> {
        normalize_balance(&self.0, decimals)
    }
}

impl fmt::Display for RawBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a smallest-unit balance into a decimal amount.
///
/// `"5000000"` at 6 decimals is `5`. Signs, separators, fractions and
/// values beyond `Decimal` range are rejected as malformed.
pub fn normalize_balance(raw: &str, decimals: u8) -> Result<Decimal> {
    let malformed = |reason: &str| TypesError::MalformedBalance {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    if decimals > MAX_DECIMALS {
        return Err(malformed("unsupported decimal precision"));
    }

    let digits = raw.trim();
    if digits.is_empty() {
        return Err(malformed("empty"));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("not an unsigned integer"));
    }

    let units: i128 = digits
        .parse::<u128>()
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or_else(|| malformed("out of range"))?;

    Decimal::try_from_i128_with_scale(units, u32::from(decimals))
        .map_err(|_| malformed("out of range"))
}

/// Convert a decimal amount into the token's smallest unit.
///
/// The amount must be positive and must not carry more fractional digits
/// than the token supports.
pub fn to_smallest_units(amount: Decimal, decimals: u8) -> Result<u128> {
    let invalid = |reason: &str| TypesError::InvalidAmount {
        amount: amount.to_string(),
        reason: reason.to_string(),
    };

    if amount <= Decimal::ZERO {
        return Err(invalid("must be positive"));
    }
    if decimals > MAX_DECIMALS {
        return Err(invalid("unsupported decimal precision"));
    }
    if amount.normalize().scale() > u32::from(decimals) {
        return Err(invalid("more fractional digits than the token supports"));
    }

    let multiplier = Decimal::from_i128_with_scale(10i128.pow(u32::from(decimals)), 0);
    amount
        .checked_mul(multiplier)
        .and_then(|units| units.trunc().to_u128())
        .ok_or_else(|| invalid("out of range"))
}

/// Parse a requested mint amount; it must be a positive decimal
pub fn parse_mint_amount(s: &str) -> Result<Decimal> {
    let amount = Decimal::from_str(s.trim()).map_err(|e| TypesError::InvalidAmount {
        amount: s.to_string(),
        reason: e.to_string(),
    })?;
    if amount <= Decimal::ZERO {
        return Err(TypesError::InvalidAmount {
            amount: s.to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(amount)
}
