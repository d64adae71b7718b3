//! Tables reconstructed from text layout.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::{BackendOutput, ExtractionBackend, RawTable};
use crate::document::{DocumentKind, SourceDocument};
use crate::docx::DocxBody;
use crate::error::BackendError;
use crate::models::{BackendId, PdfConfig};
use crate::pdf::{LoadedPdf, TextFragment};

lazy_static! {
    static ref SPACE_RUN: Regex = Regex::new(r"\s{2,}").unwrap();
}

/// Finds tables by alignment: PDF text positions, DOCX table markup,
/// delimited columns in plain text. Also yields page text, which the
/// orchestrator uses only when the text layer came back empty.
pub struct LayoutTableBackend {
    config: PdfConfig,
}

impl LayoutTableBackend {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    fn extract_pdf(&self, bytes: &[u8]) -> Result<BackendOutput, BackendError> {
        let pdf = LoadedPdf::load(bytes)?;
        let mut page_texts = Vec::new();
        let mut tables = Vec::new();

        for (page_num, page_id) in pdf.pages(self.config.max_pages) {
            match pdf.document.extract_text(&[page_num]) {
                Ok(text) if !text.trim().is_empty() => page_texts.push(text.trim().to_string()),
                Ok(_) => {}
                Err(e) => debug!("No text on page {}: {}", page_num, e),
            }

            let geometry = match pdf.geometry(page_id) {
                Ok(geometry) => geometry,
                Err(e) => {
                    debug!("Skipping layout of page {}: {}", page_num, e);
                    continue;
                }
            };
            let rows = group_rows(geometry.fragments, self.config.row_tolerance, self.config.min_column_gap);
            tables.extend(
                aligned_runs(rows)
                    .into_iter()
                    .map(|grid| RawTable::new(Some(page_num), grid)),
            );
        }

        Ok(BackendOutput {
            text: page_texts.join("\n"),
            tables,
            page_count: pdf.page_count(),
        })
    }

    fn extract_docx(&self, bytes: &[u8]) -> Result<BackendOutput, BackendError> {
        let body = DocxBody::read(bytes)?;
        Ok(BackendOutput {
            text: body.text().trim().to_string(),
            tables: body
                .tables
                .into_iter()
                .map(|grid| RawTable::new(None, grid))
                .collect(),
            page_count: 0,
        })
    }

    fn extract_text(&self, text: &str) -> BackendOutput {
        let rows: Vec<Vec<String>> = text.lines().map(split_columns).collect();
        BackendOutput {
            text: String::new(),
            tables: aligned_runs(rows)
                .into_iter()
                .map(|grid| RawTable::new(None, grid))
                .collect(),
            page_count: 0,
        }
    }
}

impl Default for LayoutTableBackend {
    fn default() -> Self {
        Self::new(PdfConfig::default())
    }
}

impl ExtractionBackend for LayoutTableBackend {
    fn id(&self) -> BackendId {
        BackendId::LayoutTable
    }

    fn try_extract(&self, doc: &SourceDocument<'_>) -> Result<BackendOutput, BackendError> {
        let output = match doc.kind {
            DocumentKind::Pdf => self.extract_pdf(doc.bytes)?,
            DocumentKind::Docx => self.extract_docx(doc.bytes)?,
            DocumentKind::Text => self.extract_text(&doc.as_text()),
            kind => return Err(BackendError::Unsupported(kind)),
        };

        debug!("Layout tables: {} candidate grids", output.tables.len());
        Ok(output)
    }
}

/// Split a plain-text line into cells on tabs, pipes, semicolons or runs of
/// two or more spaces, whichever yields the most cells.
fn split_columns(line: &str) -> Vec<String> {
    let trimmed = line.trim().trim_matches('|').trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let candidates = [
        trimmed.split('\t').map(str::to_string).collect::<Vec<_>>(),
        trimmed.split('|').map(str::to_string).collect(),
        trimmed.split(';').map(str::to_string).collect(),
        SPACE_RUN.split(trimmed).map(str::to_string).collect(),
    ];

    candidates
        .into_iter()
        .max_by_key(Vec::len)
        .unwrap_or_default()
        .into_iter()
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Group fragments into visual rows (top to bottom), merging fragments
/// closer than `min_gap` into one cell.
fn group_rows(mut fragments: Vec<TextFragment>, tolerance: f32, min_gap: f32) -> Vec<Vec<String>> {
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<(f32, Vec<TextFragment>)> = Vec::new();
    for fragment in fragments {
        match lines.last_mut() {
            Some((y, line)) if (*y - fragment.y).abs() <= tolerance => line.push(fragment),
            _ => lines.push((fragment.y, vec![fragment])),
        }
    }

    lines
        .into_iter()
        .map(|(_, mut line)| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            let mut cells: Vec<String> = Vec::new();
            let mut right_edge = f32::NEG_INFINITY;

            for fragment in line {
                let gap = fragment.x - right_edge;
                match cells.last_mut() {
                    Some(cell) if gap < min_gap => {
                        if gap > 0.0 && !cell.ends_with(' ') {
                            cell.push(' ');
                        }
                        cell.push_str(fragment.text.trim());
                    }
                    _ => cells.push(fragment.text.trim().to_string()),
                }
                right_edge = right_edge.max(fragment.x + fragment.width);
            }

            cells
        })
        .collect()
}

/// Runs of at least two consecutive rows sharing the same column count (at
/// least two columns).
fn aligned_runs(rows: Vec<Vec<String>>) -> Vec<Vec<Vec<String>>> {
    let mut runs: Vec<Vec<Vec<String>>> = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for row in rows {
        let continues = current.first().is_some_and(|first| first.len() == row.len());
        if !continues {
            let finished = std::mem::take(&mut current);
            if finished.len() >= 2 {
                runs.push(finished);
            }
        }
        if row.len() >= 2 {
            current.push(row);
        }
    }
    if current.len() >= 2 {
        runs.push(current);
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fragment(x: f32, y: f32, text: &str) -> TextFragment {
        TextFragment {
            x,
            y,
            width: text.chars().count() as f32 * 5.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_group_rows_splits_on_gaps() {
        let rows = group_rows(
            vec![
                fragment(300.0, 699.0, "1 200 000"),
                fragment(72.0, 700.0, "Оборудование"),
                fragment(72.0, 680.0, "Монтаж"),
                fragment(104.0, 680.0, "работ"),
                fragment(300.0, 680.0, "300 000"),
            ],
            3.0,
            12.0,
        );

        assert_eq!(
            rows,
            vec![
                vec!["Оборудование".to_string(), "1 200 000".to_string()],
                vec!["Монтаж работ".to_string(), "300 000".to_string()],
            ]
        );
    }

    #[test]
    fn test_aligned_runs() {
        let row = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        let runs = aligned_runs(vec![
            row(&["Заголовок"]),
            row(&["a", "1"]),
            row(&["b", "2"]),
            row(&["c", "3", "x"]),
            row(&["Подпись"]),
            row(&["d", "4"]),
        ]);

        assert_eq!(runs, vec![vec![row(&["a", "1"]), row(&["b", "2"])]]);
    }

    #[test]
    fn test_plain_text_tables() {
        let doc = SourceDocument::new(
            "Смета\nСтатья | Сумма\nРаботы | 1 000 000\nМатериалы | 500 000\n\nПодпись".as_bytes(),
            "smeta.txt",
        );

        let output = LayoutTableBackend::default().try_extract(&doc).unwrap();

        assert_eq!(output.text, "");
        assert_eq!(output.tables.len(), 1);
        assert_eq!(output.tables[0].rows.len(), 3);
        assert_eq!(output.tables[0].rows[1], vec![Some("Работы".to_string()), Some("1 000 000".to_string())]);
    }

    #[test]
    fn test_split_columns() {
        assert_eq!(split_columns("a\tb\tc"), vec!["a", "b", "c"]);
        assert_eq!(split_columns("Итого   2 500 000"), vec!["Итого", "2 500 000"]);
        assert_eq!(split_columns("| x | y |"), vec!["x", "y"]);
        assert_eq!(split_columns("просто текст"), vec!["просто текст"]);
    }
}
