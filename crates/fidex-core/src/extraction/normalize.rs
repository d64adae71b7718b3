//! Cleanup and validation of raw table grids.

use std::collections::HashMap;

use tracing::trace;

use super::RawTable;
use crate::amounts::{numeric_residue, parse_amount};
use crate::models::{BackendId, Table};

/// Turns backend grids into [`Table`]s, rejecting ones that are not actionable.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableNormalizer;

impl TableNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Clean `raw` and tag it with its source. `index` numbers the tables a
    /// backend found in one document.
    ///
    /// Cells are trimmed and missing cells become empty strings. Rows that
    /// are entirely empty are dropped, as are rows whose width differs from
    /// the most common width. Fewer than two surviving rows rejects the table.
    pub fn normalize(&self, raw: RawTable, source: BackendId, index: usize) -> Option<Table> {
        let rows: Vec<Vec<String>> = raw
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.map(|c| c.trim().to_string()).unwrap_or_default())
                    .collect::<Vec<_>>()
            })
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        let width = modal_width(&rows)?;
        let before = rows.len();
        let rows: Vec<Vec<String>> = rows.into_iter().filter(|row| row.len() == width).collect();
        if rows.len() < before {
            trace!("Dropped {} ragged rows (width {})", before - rows.len(), width);
        }

        if rows.len() < 2 {
            return None;
        }

        let has_numbers = rows
            .iter()
            .flatten()
            .any(|cell| parse_amount(&numeric_residue(cell)).is_some());

        let table_id = match raw.page {
            Some(page) => format!("{}-p{}-t{}", source, page, index),
            None => format!("{}-t{}", source, index),
        };

        Some(Table {
            source,
            page: raw.page,
            table_id,
            rows,
            has_numbers,
        })
    }
}

/// Most frequent row length; ties go to the wider grid.
fn modal_width(rows: &[Vec<String>]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.len()).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by_key(|&(width, count)| (count, width))
        .map(|(width, _)| width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(rows: Vec<Vec<Option<&str>>>) -> RawTable {
        RawTable {
            page: Some(2),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(|c| c.map(str::to_string)).collect())
                .collect(),
        }
    }

    #[test]
    fn test_cleans_cells_and_rows() {
        let table = TableNormalizer::new()
            .normalize(
                raw(vec![
                    vec![Some(" Статья "), Some("Сумма")],
                    vec![None, Some("  ")],
                    vec![Some("Работы"), None],
                ]),
                BackendId::LayoutTable,
                0,
            )
            .unwrap();

        assert_eq!(
            table.rows,
            vec![
                vec!["Статья".to_string(), "Сумма".to_string()],
                vec!["Работы".to_string(), String::new()],
            ]
        );
        assert_eq!(table.table_id, "layout-table-p2-t0");
        assert!(!table.has_numbers);
    }

    #[test]
    fn test_single_row_rejected() {
        let normalizer = TableNormalizer::new();
        assert!(normalizer
            .normalize(raw(vec![vec![Some("a"), Some("1")], vec![None, None]]), BackendId::AdvancedTable, 0)
            .is_none());
        assert!(normalizer.normalize(raw(vec![]), BackendId::AdvancedTable, 0).is_none());
    }

    #[test]
    fn test_ragged_rows_dropped() {
        let table = TableNormalizer::new()
            .normalize(
                raw(vec![
                    vec![Some("Итого по смете")],
                    vec![Some("a"), Some("1 000")],
                    vec![Some("b"), Some("2 000")],
                ]),
                BackendId::LayoutTable,
                3,
            )
            .unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.col_count(), 2);
        assert!(table.has_numbers);
    }

    #[test]
    fn test_id_without_page() {
        let mut grid = raw(vec![vec![Some("x")], vec![Some("y")]]);
        grid.page = None;
        let table = TableNormalizer::new().normalize(grid, BackendId::LayoutTable, 1).unwrap();
        assert_eq!(table.table_id, "layout-table-t1");
    }
}
