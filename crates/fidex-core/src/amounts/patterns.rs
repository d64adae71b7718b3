//! Regex patterns for currency amounts in Russian, Kazakh, Kyrgyz and English documents.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::CurrencyCode;

/// Numeric literal: space-grouped, separator-grouped or bare digits,
/// each with an optional one- or two-digit fraction.
const AMOUNT: &str = r"\d{1,3}(?:[ \u{00a0}\u{202f}]\d{3})+(?:[.,]\d{1,2})?|\d{1,3}(?:[.,]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?";

/// Symbols that may follow an amount (`2 500 000 ₽`), per currency.
const RUB_AFTER: &str = r"₽|руб(?:лей|ля|ль)?\.?|р\.|rub(?:les?)?";
const USD_AFTER: &str = r"\$|usd|долл(?:ар(?:ов|а)?)?\.?|dollars?";
const EUR_AFTER: &str = r"€|eur(?:os?)?|евро";
const KZT_AFTER: &str = r"₸|kzt|тенге|тг\.?";
const KGS_AFTER: &str = r"сом(?:ов|а)?\b|kgs";

/// Symbols that may precede an amount (`$35,000`), per currency.
const RUB_BEFORE: &str = r"₽|rub";
const USD_BEFORE: &str = r"\$|usd";
const EUR_BEFORE: &str = r"€|eur";
const KZT_BEFORE: &str = r"₸|kzt";
const KGS_BEFORE: &str = r"kgs";

/// Stems of words meaning cost, price, budget, total or amount.
pub const BUDGET_KEYWORDS: &[&str] = &[
    "стоимост",
    "цена",
    "цены",
    "цене",
    "ценой",
    "бюджет",
    "итог",
    "всего",
    "сумм",
    "затрат",
    "смет",
    "құны",
    "сомасы",
    "cost",
    "price",
    "budget",
    "total",
    "amount",
];

/// One compiled amount pattern.
pub struct CurrencyPattern {
    pub currency: CurrencyCode,
    pub regex: Regex,
}

fn amount_then_symbol(currency: CurrencyCode, symbols: &str) -> CurrencyPattern {
    // The leading guard keeps a match from starting in the middle of a number.
    let pattern = format!(
        r"(?i)(?:^|[^\d.,])(?P<m>(?P<amount>{})\s*(?:{}))",
        AMOUNT, symbols
    );
    CurrencyPattern {
        currency,
        regex: Regex::new(&pattern).expect("valid amount pattern"),
    }
}

fn symbol_then_amount(currency: CurrencyCode, symbols: &str) -> CurrencyPattern {
    let pattern = format!(r"(?i)(?P<m>(?:{})\s*(?P<amount>{}))", symbols, AMOUNT);
    CurrencyPattern {
        currency,
        regex: Regex::new(&pattern).expect("valid amount pattern"),
    }
}

lazy_static! {
    /// Every amount pattern, grouped by currency.
    pub static ref CURRENCY_PATTERNS: Vec<CurrencyPattern> = vec![
        amount_then_symbol(CurrencyCode::Rub, RUB_AFTER),
        symbol_then_amount(CurrencyCode::Rub, RUB_BEFORE),
        amount_then_symbol(CurrencyCode::Usd, USD_AFTER),
        symbol_then_amount(CurrencyCode::Usd, USD_BEFORE),
        amount_then_symbol(CurrencyCode::Eur, EUR_AFTER),
        symbol_then_amount(CurrencyCode::Eur, EUR_BEFORE),
        amount_then_symbol(CurrencyCode::Kzt, KZT_AFTER),
        symbol_then_amount(CurrencyCode::Kzt, KZT_BEFORE),
        amount_then_symbol(CurrencyCode::Kgs, KGS_AFTER),
        symbol_then_amount(CurrencyCode::Kgs, KGS_BEFORE),
    ];

    /// Bare currency markers, used to classify table cells.
    pub static ref CURRENCY_SYMBOLS: Vec<CurrencyPattern> = vec![
        CurrencyPattern {
            currency: CurrencyCode::Rub,
            regex: Regex::new(r"(?i)₽|руб|\brub\b|\bр\.").unwrap(),
        },
        CurrencyPattern {
            currency: CurrencyCode::Usd,
            regex: Regex::new(r"(?i)\$|\busd\b|долл|\bdollars?\b").unwrap(),
        },
        CurrencyPattern {
            currency: CurrencyCode::Eur,
            regex: Regex::new(r"(?i)€|\beur\b|евро|\beuros?\b").unwrap(),
        },
        CurrencyPattern {
            currency: CurrencyCode::Kzt,
            regex: Regex::new(r"(?i)₸|\bkzt\b|тенге|\bтг\b").unwrap(),
        },
        CurrencyPattern {
            currency: CurrencyCode::Kgs,
            regex: Regex::new(r"(?i)\bсом(?:ов|а)?\b|\bkgs\b").unwrap(),
        },
    ];
}
