//! Currency amount scanning over free text.

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::trace;

use super::number::parse_amount;
use super::patterns::{CURRENCY_PATTERNS, CURRENCY_SYMBOLS};
use crate::models::{CurrencyCode, CurrencyMention};

/// A currency mention together with the text around it.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyMatch {
    pub currency: CurrencyCode,
    pub amount: Decimal,
    /// Character offset of the match start.
    pub position: usize,
    /// Up to `context_window` characters on each side of the match.
    pub context: String,
}

impl CurrencyMatch {
    pub fn mention(&self) -> CurrencyMention {
        CurrencyMention {
            currency: self.currency,
            amount: self.amount,
            position: self.position,
        }
    }
}

/// Finds amount + currency pairs in text.
#[derive(Debug, Clone)]
pub struct CurrencyMatcher {
    context_window: usize,
}

impl CurrencyMatcher {
    pub fn new(context_window: usize) -> Self {
        Self { context_window }
    }

    /// Every currency mention in `text`, sorted by position.
    ///
    /// Matches whose numeric part does not parse are dropped. A number matched
    /// by two patterns of the same currency (`$35,000 USD`) is reported once.
    pub fn find_all(&self, text: &str) -> Vec<CurrencyMatch> {
        let mut seen: HashSet<(CurrencyCode, usize)> = HashSet::new();
        let mut found: Vec<(usize, CurrencyMatch)> = Vec::new();

        for pattern in CURRENCY_PATTERNS.iter() {
            for caps in pattern.regex.captures_iter(text) {
                let (Some(whole), Some(amount)) = (caps.name("m"), caps.name("amount")) else {
                    continue;
                };

                if !seen.insert((pattern.currency, amount.start())) {
                    continue;
                }

                let Some(value) = parse_amount(amount.as_str()) else {
                    trace!("Discarding unparseable amount {:?}", amount.as_str());
                    continue;
                };

                found.push((
                    whole.start(),
                    CurrencyMatch {
                        currency: pattern.currency,
                        amount: value,
                        position: char_offset(text, whole.start()),
                        context: context_window(text, whole.start(), whole.end(), self.context_window),
                    },
                ));
            }
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, m)| m).collect()
    }

    /// Raw mentions, in text order.
    pub fn mentions(&self, text: &str) -> Vec<CurrencyMention> {
        self.find_all(text).iter().map(CurrencyMatch::mention).collect()
    }

    /// Currency whose symbol appears earliest in `text`, if any.
    pub fn detect_currency(text: &str) -> Option<CurrencyCode> {
        CURRENCY_SYMBOLS
            .iter()
            .filter_map(|p| p.regex.find(text).map(|m| (m.start(), p.currency)))
            .min_by_key(|(start, _)| *start)
            .map(|(_, currency)| currency)
    }
}

impl Default for CurrencyMatcher {
    fn default() -> Self {
        Self::new(50)
    }
}

fn char_offset(text: &str, byte_idx: usize) -> usize {
    text[..byte_idx].chars().count()
}

/// Slice of `text` spanning `window` characters before `start` and after `end`,
/// with line breaks flattened.
fn context_window(text: &str, start: usize, end: usize, window: usize) -> String {
    let from = if window == 0 {
        start
    } else {
        text[..start]
            .char_indices()
            .rev()
            .nth(window - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let to = text[end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());

    text[from..to]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mixed_currencies_in_text_order() {
        let matcher = CurrencyMatcher::default();
        let mentions = matcher.mentions("Стоимость: 2 500 000 ₽, альтернатива $35,000");

        assert_eq!(
            mentions,
            vec![
                CurrencyMention {
                    currency: CurrencyCode::Rub,
                    amount: Decimal::from(2_500_000),
                    position: 11,
                },
                CurrencyMention {
                    currency: CurrencyCode::Usd,
                    amount: Decimal::from(35_000),
                    position: 37,
                },
            ]
        );
    }

    #[test]
    fn test_same_number_reported_once() {
        let matcher = CurrencyMatcher::default();
        let mentions = matcher.mentions("Total: $35,000 USD");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].amount, Decimal::from(35_000));
    }

    #[test]
    fn test_mentions_not_deduplicated_across_positions() {
        let matcher = CurrencyMatcher::default();
        let mentions = matcher.mentions("1 000 000 ₽ ... again 1 000 000 ₽");
        assert_eq!(mentions.len(), 2);
    }

    #[test]
    fn test_context_window_is_char_based() {
        let matcher = CurrencyMatcher::new(5);
        let found = matcher.find_all("Бюджет проекта:\n 10 000 ₽ в год");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].context, "та: 10 000 ₽ в го");
    }

    #[test]
    fn test_detect_currency_prefers_earliest_symbol() {
        assert_eq!(
            CurrencyMatcher::detect_currency("Цена, $ / руб."),
            Some(CurrencyCode::Usd)
        );
        assert_eq!(CurrencyMatcher::detect_currency("Наименование"), None);
    }
}
