// src/integrator.rs
//! Exact base-unit arithmetic for stream amounts.
//!
//! Rates and amounts arrive as decimal strings of arbitrary size (uint256 on
//! chain) and are only ever handled as `BigUint`.
use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{AccountingError, Result};

/// Parse a non-negative base-10 integer string.
pub fn parse_amount(value: &str) -> Result<BigUint> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AccountingError::InvalidAmount {
            value: value.to_string(),
        });
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10).ok_or_else(|| AccountingError::InvalidAmount {
        value: value.to_string(),
    })
}

/// `rate * seconds`, returned as a decimal string.
pub fn multiply(rate: &str, seconds: u64) -> Result<String> {
    Ok((parse_amount(rate)? * BigUint::from(seconds)).to_string())
}

/// Sum of decimal amount strings. An empty list sums to "0".
pub fn sum<I, S>(amounts: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut total = BigUint::zero();
    for amount in amounts {
        total += parse_amount(amount.as_ref())?;
    }
    Ok(total.to_string())
}

/// Integrate `(duration, rate)` segments into one amount.
pub fn integrate<'a, I>(segments: I) -> Result<String>
where
    I: IntoIterator<Item = (u64, &'a str)>,
{
    let parts = segments
        .into_iter()
        .map(|(seconds, rate)| multiply(rate, seconds))
        .collect::<Result<Vec<_>>>()?;
    sum(parts)
}
