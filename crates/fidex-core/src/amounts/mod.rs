//! Monetary amount recognition.
//!
//! Numbers are parsed into [`rust_decimal::Decimal`], classified by currency
//! from the surrounding symbols and finally scored and deduplicated into
//! budget candidates.

pub mod budget;
pub mod currency;
pub mod number;
pub mod patterns;

pub use budget::{BudgetAggregator, BudgetReport};
pub use currency::{CurrencyMatch, CurrencyMatcher};
pub use number::{format_amount, numeric_residue, parse_amount};
