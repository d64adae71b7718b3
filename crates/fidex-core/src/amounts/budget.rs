//! Budget candidate scoring, deduplication and summary.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::debug;

use super::currency::{CurrencyMatch, CurrencyMatcher};
use super::number::{format_amount, numeric_residue, parse_amount};
use super::patterns::BUDGET_KEYWORDS;
use crate::models::{
    BudgetCandidate, BudgetConfig, BudgetSource, CurrencyBreakdown, CurrencyCode,
    CurrencyMention, StructuredData, Table,
};

/// Everything the aggregator derives from a document's text and tables.
#[derive(Debug, Clone, Default)]
pub struct BudgetReport {
    pub budgets: Vec<BudgetCandidate>,
    pub currencies: Vec<CurrencyMention>,
    pub structured_data: StructuredData,
}

/// Turns currency mentions and numeric table cells into deduplicated budget candidates.
#[derive(Debug, Clone)]
pub struct BudgetAggregator {
    config: BudgetConfig,
    matcher: CurrencyMatcher,
}

impl BudgetAggregator {
    pub fn new(config: BudgetConfig) -> Self {
        let matcher = CurrencyMatcher::new(config.context_window);
        Self { config, matcher }
    }

    pub fn aggregate(&self, text: &str, tables: &[Table]) -> BudgetReport {
        let matches = self.matcher.find_all(text);
        let currencies: Vec<CurrencyMention> = matches.iter().map(CurrencyMatch::mention).collect();
        let dominant = dominant_currency(&currencies);

        let mut candidates: Vec<BudgetCandidate> =
            matches.iter().map(|m| self.text_candidate(m)).collect();
        for table in tables.iter().filter(|t| t.has_numbers) {
            candidates.extend(self.table_candidates(table, dominant));
        }

        let found = candidates.len();
        let min_amount = Decimal::from(self.config.min_amount);
        candidates.retain(|c| c.amount > min_amount);
        let above_threshold = candidates.len();

        let budgets = deduplicate(candidates, self.tolerance());

        debug!(
            "Budget candidates: {} found, {} above threshold, {} unique",
            found,
            above_threshold,
            budgets.len()
        );

        let structured_data = summarize(&budgets, tables);

        BudgetReport {
            budgets,
            currencies,
            structured_data,
        }
    }

    fn tolerance(&self) -> Decimal {
        Decimal::from_f64(self.config.dedup_tolerance).unwrap_or_else(|| Decimal::new(5, 2))
    }

    fn text_candidate(&self, m: &CurrencyMatch) -> BudgetCandidate {
        let is_budget_context = has_budget_keyword(&m.context);
        let confidence = if is_budget_context {
            self.config.budget_context_confidence
        } else {
            self.config.plain_confidence
        };

        BudgetCandidate {
            amount: m.amount,
            currency: m.currency,
            formatted: format_amount(m.amount, m.currency),
            confidence,
            is_budget_context,
            source: BudgetSource::Text { position: m.position },
            context: m.context.clone(),
        }
    }

    fn table_candidates(&self, table: &Table, fallback: CurrencyCode) -> Vec<BudgetCandidate> {
        let header_currency = CurrencyMatcher::detect_currency(&table.header().join(" "));
        let mut candidates = Vec::new();

        for (row_idx, row) in table.rows.iter().enumerate() {
            let row_currency = || CurrencyMatcher::detect_currency(&row.join(" "));

            for (col_idx, cell) in row.iter().enumerate() {
                let Some(amount) = parse_amount(&numeric_residue(cell)) else {
                    continue;
                };

                let currency = CurrencyMatcher::detect_currency(cell)
                    .or_else(row_currency)
                    .or(header_currency)
                    .unwrap_or(fallback);

                candidates.push(BudgetCandidate {
                    amount,
                    currency,
                    formatted: format_amount(amount, currency),
                    confidence: self.config.table_confidence,
                    is_budget_context: true,
                    source: BudgetSource::Table {
                        row: row_idx,
                        col: col_idx,
                    },
                    context: row.join(" | "),
                });
            }
        }

        candidates
    }
}

impl Default for BudgetAggregator {
    fn default() -> Self {
        Self::new(BudgetConfig::default())
    }
}

/// Whether any budget keyword occurs in `context`, ignoring case.
pub fn has_budget_keyword(context: &str) -> bool {
    let lower = context.to_lowercase();
    BUDGET_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Most frequently mentioned currency; ties go to the one mentioned first.
fn dominant_currency(mentions: &[CurrencyMention]) -> CurrencyCode {
    let mut counts: Vec<(CurrencyCode, usize)> = Vec::new();
    for mention in mentions {
        match counts.iter_mut().find(|(c, _)| *c == mention.currency) {
            Some((_, n)) => *n += 1,
            None => counts.push((mention.currency, 1)),
        }
    }

    counts
        .iter()
        .fold(None, |best: Option<(CurrencyCode, usize)>, &(c, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((c, n)),
        })
        .map(|(c, _)| c)
        .unwrap_or(CurrencyCode::Unknown)
}

/// Presentation order: confidence descending, then amount descending.
fn by_rank(a: &BudgetCandidate, b: &BudgetCandidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.amount.cmp(&a.amount))
}

/// `candidate` duplicates `kept` when both share a currency and differ by at
/// most `tolerance` relative to `kept`.
fn is_duplicate(candidate: &BudgetCandidate, kept: &BudgetCandidate, tolerance: Decimal) -> bool {
    candidate.currency == kept.currency
        && candidate
            .amount
            .checked_sub(kept.amount)
            .is_some_and(|diff| diff.abs() <= tolerance.saturating_mul(kept.amount.abs()))
}

/// Greedy single-pass deduplication.
///
/// Not transitive: with A~B and B~C but not A~C, the outcome depends on the
/// rank order, and A and C may both survive.
pub fn deduplicate(mut candidates: Vec<BudgetCandidate>, tolerance: Decimal) -> Vec<BudgetCandidate> {
    candidates.sort_by(by_rank);

    let mut accepted: Vec<BudgetCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match accepted
            .iter_mut()
            .find(|kept| is_duplicate(&candidate, kept, tolerance))
        {
            Some(kept) => {
                if candidate.confidence > kept.confidence {
                    *kept = candidate;
                }
            }
            None => accepted.push(candidate),
        }
    }

    accepted.sort_by(by_rank);
    accepted
}

/// Per-currency and overall statistics. Informational only.
pub fn summarize(budgets: &[BudgetCandidate], tables: &[Table]) -> StructuredData {
    let mut breakdown: BTreeMap<CurrencyCode, CurrencyBreakdown> = BTreeMap::new();
    for budget in budgets {
        breakdown
            .entry(budget.currency)
            .and_modify(|b| {
                b.count += 1;
                b.total_amount = b.total_amount.saturating_add(budget.amount);
                b.min_amount = b.min_amount.min(budget.amount);
                b.max_amount = b.max_amount.max(budget.amount);
            })
            .or_insert(CurrencyBreakdown {
                count: 1,
                total_amount: budget.amount,
                min_amount: budget.amount,
                max_amount: budget.amount,
            });
    }

    StructuredData {
        total_budgets: budgets.len(),
        currency_breakdown: breakdown,
        largest_amount: budgets.iter().map(|b| b.amount).max(),
        smallest_amount: budgets.iter().map(|b| b.amount).min(),
        has_structured_pricing: tables.iter().any(|t| t.has_numbers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendId;
    use pretty_assertions::assert_eq;

    fn candidate(amount: i64, currency: CurrencyCode, confidence: f64) -> BudgetCandidate {
        let amount = Decimal::from(amount);
        BudgetCandidate {
            amount,
            currency,
            formatted: format_amount(amount, currency),
            confidence,
            is_budget_context: confidence > 0.5,
            source: BudgetSource::Text { position: 0 },
            context: String::new(),
        }
    }

    fn table(rows: &[&[&str]]) -> Table {
        Table {
            source: BackendId::LayoutTable,
            page: Some(1),
            table_id: "layout-table-p1-t0".to_string(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
            has_numbers: true,
        }
    }

    #[test]
    fn test_dedup_within_tolerance_keeps_higher_confidence() {
        let budgets = deduplicate(
            vec![
                candidate(1_030_000, CurrencyCode::Rub, 0.5),
                candidate(1_000_000, CurrencyCode::Rub, 0.8),
            ],
            Decimal::new(5, 2),
        );

        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].amount, Decimal::from(1_000_000));
        assert_eq!(budgets[0].confidence, 0.8);
    }

    #[test]
    fn test_dedup_respects_currency_and_distance() {
        let budgets = deduplicate(
            vec![
                candidate(1_000_000, CurrencyCode::Rub, 0.8),
                candidate(1_000_000, CurrencyCode::Usd, 0.8),
                candidate(1_100_000, CurrencyCode::Rub, 0.8),
            ],
            Decimal::new(5, 2),
        );

        assert_eq!(budgets.len(), 3);
        assert_eq!(budgets[0].amount, Decimal::from(1_100_000));
    }

    #[test]
    fn test_dedup_is_not_transitive() {
        // 1 000 000 ~ 1 040 000 ~ 1 080 000, but the outer pair is 8% apart
        let budgets = deduplicate(
            vec![
                candidate(1_080_000, CurrencyCode::Rub, 0.8),
                candidate(1_040_000, CurrencyCode::Rub, 0.7),
                candidate(1_000_000, CurrencyCode::Rub, 0.5),
            ],
            Decimal::new(5, 2),
        );

        let amounts: Vec<Decimal> = budgets.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![Decimal::from(1_080_000), Decimal::from(1_000_000)]);
    }

    #[test]
    fn test_small_amounts_filtered() {
        let report = BudgetAggregator::default().aggregate("Стоимость доставки 500 ₽", &[]);

        assert_eq!(report.currencies.len(), 1);
        assert!(report.budgets.is_empty());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let report = BudgetAggregator::default().aggregate("Итого 1 000 ₽ и 1 001 ₽", &[]);

        let amounts: Vec<Decimal> = report.budgets.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![Decimal::from(1001)]);
    }

    #[test]
    fn test_budget_context_scoring() {
        let report = BudgetAggregator::default().aggregate(
            "Стоимость: 2 500 000 ₽, альтернатива $35,000",
            &[],
        );

        let rub = report
            .budgets
            .iter()
            .find(|b| b.currency == CurrencyCode::Rub)
            .unwrap();
        assert_eq!(rub.amount, Decimal::from(2_500_000));
        assert_eq!(rub.confidence, 0.8);
        assert!(rub.is_budget_context);
        assert_eq!(rub.formatted, "2 500 000 ₽");
    }

    #[test]
    fn test_plain_context_gets_lower_confidence() {
        let report = BudgetAggregator::default().aggregate("Получено 75 000 $ от партнёра", &[]);

        assert_eq!(report.budgets.len(), 1);
        assert_eq!(report.budgets[0].confidence, 0.5);
        assert!(!report.budgets[0].is_budget_context);
    }

    #[test]
    fn test_table_cells_resolve_currency() {
        let tables = vec![table(&[
            &["Статья", "Сумма, руб."],
            &["Оборудование", "1 200 000"],
            &["Лицензии", "$40,000"],
        ])];

        let report = BudgetAggregator::default().aggregate("", &tables);

        assert_eq!(report.budgets.len(), 2);
        let rub = &report.budgets[0];
        assert_eq!(rub.amount, Decimal::from(1_200_000));
        assert_eq!(rub.currency, CurrencyCode::Rub);
        assert_eq!(rub.confidence, 0.7);
        assert_eq!(rub.source, BudgetSource::Table { row: 1, col: 1 });
        assert!(rub.is_budget_context);

        let usd = &report.budgets[1];
        assert_eq!(usd.currency, CurrencyCode::Usd);
        assert_eq!(usd.amount, Decimal::from(40_000));
    }

    #[test]
    fn test_table_falls_back_to_dominant_currency() {
        let tables = vec![table(&[&["Этап", "Бюджет"], &["Первый", "3 000 000"]])];
        let report = BudgetAggregator::default().aggregate("Аванс 50 000 тенге, остаток 70 000 тенге", &tables);

        let from_table = report
            .budgets
            .iter()
            .find(|b| matches!(b.source, BudgetSource::Table { .. }))
            .unwrap();
        assert_eq!(from_table.currency, CurrencyCode::Kzt);
    }

    #[test]
    fn test_tables_without_numbers_ignored() {
        let mut t = table(&[&["a", "b"], &["5 000 000", "d"]]);
        t.has_numbers = false;

        let report = BudgetAggregator::default().aggregate("", &[t]);
        assert!(report.budgets.is_empty());
        assert!(!report.structured_data.has_structured_pricing);
    }

    #[test]
    fn test_summary() {
        let budgets = vec![
            candidate(3_000_000, CurrencyCode::Rub, 0.8),
            candidate(2_000_000, CurrencyCode::Rub, 0.8),
            candidate(50_000, CurrencyCode::Usd, 0.5),
        ];

        let summary = summarize(&budgets, &[]);

        assert_eq!(summary.total_budgets, 3);
        assert_eq!(summary.largest_amount, Some(Decimal::from(3_000_000)));
        assert_eq!(summary.smallest_amount, Some(Decimal::from(50_000)));
        let rub = &summary.currency_breakdown[&CurrencyCode::Rub];
        assert_eq!(rub.count, 2);
        assert_eq!(rub.total_amount, Decimal::from(5_000_000));
        assert_eq!(rub.min_amount, Decimal::from(2_000_000));
        assert_eq!(rub.max_amount, Decimal::from(3_000_000));
    }

    #[test]
    fn test_summary_total_saturates() {
        let mut huge = candidate(0, CurrencyCode::Rub, 0.8);
        huge.amount = Decimal::MAX - Decimal::from(10);
        let budgets = vec![huge.clone(), candidate(2_000_000, CurrencyCode::Rub, 0.8)];

        let summary = summarize(&budgets, &[]);

        let rub = &summary.currency_breakdown[&CurrencyCode::Rub];
        assert_eq!(rub.count, 2);
        assert_eq!(rub.total_amount, Decimal::MAX);
        assert_eq!(rub.max_amount, huge.amount);
    }
}
