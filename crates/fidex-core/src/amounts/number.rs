//! Locale-ambiguous number parsing.
//!
//! Handles the regional conventions found in uploaded documents:
//! Russian `1 000 000,50`, US `1,000,000.50`, European `1.000.000,50`
//! and bare `1000000`.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::CurrencyCode;

/// Parse a numeric literal into a [`Decimal`].
///
/// Anything other than ASCII digits, `,` and `.` is discarded first, so
/// spaces of any kind act as thousands separators. Then:
///
/// 1. both `,` and `.` present: the rightmost of the two is the decimal
///    separator, the other is a thousands separator;
/// 2. only `,`: a single comma followed by at most two digits is the decimal
///    separator, otherwise every comma is a thousands separator;
/// 3. only `.`: same rule as for `,`.
///
/// Returns `None` when no digits remain or the value does not fit a decimal.
/// Never panics.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let decimal_separator = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) => Some(if comma > dot { ',' } else { '.' }),
        (Some(_), None) => single_separator_decimal(&cleaned, ','),
        (None, Some(_)) => single_separator_decimal(&cleaned, '.'),
        (None, None) => None,
    };

    let (integer_part, fraction_part) = match decimal_separator.and_then(|sep| cleaned.rfind(sep)) {
        Some(idx) => (&cleaned[..idx], &cleaned[idx + 1..]),
        None => (cleaned.as_str(), ""),
    };

    let integer: String = integer_part.chars().filter(char::is_ascii_digit).collect();
    let fraction: String = fraction_part.chars().filter(char::is_ascii_digit).collect();

    let normalized = match (integer.is_empty(), fraction.is_empty()) {
        (_, true) => integer,
        (true, false) => format!("0.{}", fraction),
        (false, false) => format!("{}.{}", integer, fraction),
    };

    Decimal::from_str(&normalized).ok()
}

/// Decide whether the only separator kind in `s` marks decimals.
fn single_separator_decimal(s: &str, sep: char) -> Option<char> {
    let count = s.matches(sep).count();
    let tail_len = s.rsplit(sep).next().map(str::len).unwrap_or(0);

    (count == 1 && tail_len <= 2).then_some(sep)
}

/// Keep only the characters a number can be written with.
pub fn numeric_residue(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | ' ' | '\u{00a0}' | '\u{202f}'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Format an amount with space-grouped thousands and the currency symbol
/// (e.g. `2 500 000 ₽`, `1 234,56 €`).
pub fn format_amount(amount: Decimal, currency: CurrencyCode) -> String {
    let negative = amount.is_sign_negative() && !amount.is_zero();
    let abs = amount.abs().round_dp(2);

    let s = if abs.fract().is_zero() {
        format!("{}", abs.trunc().normalize())
    } else {
        format!("{:.2}", abs)
    };

    let (integer_part, decimal_part) = match s.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (s.as_str(), None),
    };

    // Add thousand separators
    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    if negative {
        formatted.push('-');
    }
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(' ');
        }
        formatted.push(*c);
    }

    if let Some(decimals) = decimal_part {
        formatted.push(',');
        formatted.push_str(decimals);
    }

    match currency.symbol() {
        "" => formatted,
        symbol => format!("{} {}", formatted, symbol),
    }
}
