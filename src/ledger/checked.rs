//! Overflow-checked decimal arithmetic
//!
//! `Decimal` operators panic once a result leaves the 96-bit range. Ledger
//! and portfolio figures go through these helpers instead, so an extreme
//! quantity or price is rejected as a validation error and nothing is stored.

use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};

fn out_of_range(what: &str) -> LedgerError {
    LedgerError::Validation(format!("{} is out of range", what))
}

pub fn add(what: &str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| out_of_range(what))
}

pub fn sub(what: &str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b).ok_or_else(|| out_of_range(what))
}

pub fn mul(what: &str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(|| out_of_range(what))
}

pub fn div(what: &str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_div(b).ok_or_else(|| out_of_range(what))
}

/// `part` as a percentage of `whole`; `None` when `whole` is not positive.
pub fn percent_of(what: &str, part: Decimal, whole: Decimal) -> Result<Option<Decimal>> {
    if whole <= Decimal::ZERO {
        return Ok(None);
    }
    let ratio = div(what, part, whole)?;
    mul(what, ratio, Decimal::ONE_HUNDRED).map(Some)
}

/// `*total += value`, rejecting overflow.
pub fn accumulate(what: &str, total: &mut Decimal, value: Decimal) -> Result<()> {
    *total = add(what, *total, value)?;
    Ok(())
}
