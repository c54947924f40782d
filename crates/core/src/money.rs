//! Money arithmetic helpers.
//!
//! Every money value in the system is a [`rust_decimal::Decimal`] at currency
//! minor-unit precision (2 decimal places). Floating point never appears, and
//! comparisons are exact decimal ordering.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Currency minor-unit precision (cents).
pub const MONEY_SCALE: u32 = 2;

/// Reject amounts carrying more precision than the currency minor unit.
///
/// Trailing zeros are fine (`10.500` normalizes to `10.5`); a real third
/// decimal digit is not.
pub fn ensure_money_scale(amount: Decimal, what: &str) -> DomainResult<()> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(DomainError::invalid_amount(format!(
            "{what} cannot have more than {MONEY_SCALE} decimal places"
        )));
    }
    Ok(())
}

/// Reject non-positive or over-precise amounts.
pub fn ensure_positive_money(amount: Decimal, what: &str) -> DomainResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::invalid_amount(format!("{what} must be positive")));
    }
    ensure_money_scale(amount, what)
}

/// Reject negative or over-precise amounts (zero is allowed).
pub fn ensure_non_negative_money(amount: Decimal, what: &str) -> DomainResult<()> {
    if amount < Decimal::ZERO {
        return Err(DomainError::invalid_amount(format!("{what} cannot be negative")));
    }
    ensure_money_scale(amount, what)
}

/// Checked addition; overflow surfaces as an invariant violation, never a wrap.
pub fn checked_money_add(lhs: Decimal, rhs: Decimal, what: &str) -> DomainResult<Decimal> {
    lhs.checked_add(rhs)
        .ok_or_else(|| DomainError::invariant(format!("{what} overflowed")))
}

/// Checked sum over a sequence of amounts.
pub fn checked_money_sum<I>(amounts: I, what: &str) -> DomainResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let mut total = Decimal::ZERO;
    for amount in amounts {
        total = checked_money_add(total, amount, what)?;
    }
    Ok(total)
}
