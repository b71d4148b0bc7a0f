//! Utility functions for formatting and common operations
//!
//! This module provides centralized formatting utilities for consistent
//! display of money, percentages and quantities throughout the application.

use rust_decimal::Decimal;

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol<'a> {
    /// "$" prefix (US dollar)
    Usd,
    /// ISO code suffix, e.g. "1,234.56 EUR"
    Code(&'a str),
    /// No currency marker (table cells)
    None,
}

impl<'a> CurrencySymbol<'a> {
    /// Symbol for an ISO currency code
    pub fn for_code(code: &'a str) -> Self {
        if code.eq_ignore_ascii_case("USD") {
            CurrencySymbol::Usd
        } else {
            CurrencySymbol::Code(code)
        }
    }
}

/// Group the integer digits of a non-negative amount in thousands.
fn group_thousands(integer_part: &str) -> String {
    let digits: Vec<char> = integer_part.chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}

/// Core formatting function with full control over output.
///
/// Rounds to cents and formats with `,` as thousands separator and `.` as
/// decimal separator. `width` right-aligns the result (0 for no padding).
///
/// # Examples
/// ```
/// use folio::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Usd),
///     "$1,234.56"
/// );
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234), 12, CurrencySymbol::None),
///     "    1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let rounded = value.round_dp(2);
    let is_negative = rounded < Decimal::ZERO;
    let formatted = format!("{:.2}", rounded.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let sign = if is_negative { "-" } else { "" };
    let amount = format!("{}.{}", group_thousands(integer_part), decimal_part);

    let result = match symbol {
        CurrencySymbol::Usd => format!("{}${}", sign, amount),
        CurrencySymbol::Code(code) => format!("{}{} {}", sign, amount, code.to_uppercase()),
        CurrencySymbol::None => format!("{}{}", sign, amount),
    };

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

// ============ Convenience functions ============

/// Format as US dollars: "$1,234.56"
///
/// # Examples
/// ```
/// use folio::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1234.56)), "$1,234.56");
/// assert_eq!(format_currency(dec!(-500)), "-$500.00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Usd)
}

/// Format in the position's own currency
pub fn format_money(value: Decimal, currency: &str) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::for_code(currency))
}

/// Format number only (no symbol): "1,234.56"
pub fn format_decimal(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::None)
}

/// Signed percentage with two decimals: "+12.50%", "-3.00%"
///
/// # Examples
/// ```
/// use folio::utils::format_percent;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_percent(dec!(12.5)), "+12.50%");
/// assert_eq!(format_percent(dec!(0)), "0.00%");
/// ```
pub fn format_percent(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    if rounded > Decimal::ZERO {
        format!("+{:.2}%", rounded)
    } else {
        format!("{:.2}%", rounded)
    }
}

/// Quantities keep their own precision, without trailing zeros.
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}
