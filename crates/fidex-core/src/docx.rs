//! Reader for the main part of a DOCX package.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::error::BackendError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Text content of a DOCX body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocxBody {
    /// Paragraphs outside tables, in document order.
    pub paragraphs: Vec<String>,
    /// Top-level tables as rows of cell text. Nested tables are flattened
    /// into the text of the enclosing cell.
    pub tables: Vec<Vec<Vec<String>>>,
    /// Every `w:t` run, tables included, in document order.
    pub runs: Vec<String>,
}

impl DocxBody {
    /// Unzip `bytes` and parse `word/document.xml`.
    pub fn read(bytes: &[u8]) -> Result<Self, BackendError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut part = archive.by_name(DOCUMENT_PART)?;

        let mut xml = String::new();
        part.read_to_string(&mut xml)
            .map_err(|e| BackendError::Docx(format!("{}: {}", DOCUMENT_PART, e)))?;

        let body = Self::parse(&xml)?;
        debug!(
            "DOCX: {} paragraphs, {} tables, {} runs",
            body.paragraphs.len(),
            body.tables.len(),
            body.runs.len()
        );
        Ok(body)
    }

    /// Parse the XML of a document part.
    pub fn parse(xml: &str) -> Result<Self, BackendError> {
        let mut reader = Reader::from_str(xml);
        let mut state = ParseState::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => state.open(e.local_name().as_ref()),
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"tab" => state.push_text("\t", false),
                    b"br" | b"cr" => state.push_text("\n", false),
                    _ => {}
                },
                Event::Text(t) => {
                    if state.in_text {
                        let text = t
                            .unescape()
                            .map_err(|e| BackendError::Docx(e.to_string()))?;
                        state.push_text(&text, true);
                    }
                }
                Event::End(e) => state.close(e.local_name().as_ref()),
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(state.body)
    }

    /// Paragraph text joined with newlines.
    pub fn text(&self) -> String {
        self.paragraphs.join("\n")
    }
}

#[derive(Default)]
struct ParseState {
    body: DocxBody,
    in_text: bool,
    paragraph: String,
    table_depth: usize,
    table: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl ParseState {
    fn open(&mut self, name: &[u8]) {
        match name {
            b"t" => self.in_text = true,
            b"p" => self.paragraph.clear(),
            b"tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.table.clear();
                }
            }
            b"tr" if self.table_depth == 1 => self.row.clear(),
            b"tc" if self.table_depth == 1 => self.cell.clear(),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"t" => self.in_text = false,
            b"p" => {
                let paragraph = std::mem::take(&mut self.paragraph);
                if self.table_depth == 0 {
                    self.body.paragraphs.push(paragraph);
                } else {
                    if !self.cell.is_empty() && !paragraph.is_empty() {
                        self.cell.push(' ');
                    }
                    self.cell.push_str(&paragraph);
                }
            }
            b"tc" if self.table_depth == 1 => {
                let cell = std::mem::take(&mut self.cell);
                self.row.push(cell);
            }
            b"tr" if self.table_depth == 1 => {
                let row = std::mem::take(&mut self.row);
                self.table.push(row);
            }
            b"tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                if self.table_depth == 0 {
                    let table = std::mem::take(&mut self.table);
                    self.body.tables.push(table);
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str, is_run: bool) {
        self.paragraph.push_str(text);
        if is_run {
            self.body.runs.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Смета проекта</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Итого: </w:t></w:r><w:r><w:t>2 500 000 ₽</w:t></w:r></w:p>
    <w:tbl>
      <w:tr>
        <w:tc><w:p><w:r><w:t>Статья</w:t></w:r></w:p></w:tc>
        <w:tc><w:p><w:r><w:t>Сумма</w:t></w:r></w:p></w:tc>
      </w:tr>
      <w:tr>
        <w:tc><w:p><w:r><w:t>Работы</w:t></w:r></w:p></w:tc>
        <w:tc><w:p><w:r><w:t>1 000 000</w:t></w:r></w:p></w:tc>
      </w:tr>
    </w:tbl>
    <w:p><w:r><w:t>A</w:t><w:tab/><w:t>B &amp; C</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_parse_paragraphs_and_tables() {
        let body = DocxBody::parse(SAMPLE).unwrap();

        assert_eq!(
            body.paragraphs,
            vec!["Смета проекта", "Итого: 2 500 000 ₽", "A\tB & C"]
        );
        assert_eq!(
            body.tables,
            vec![vec![
                vec!["Статья".to_string(), "Сумма".to_string()],
                vec!["Работы".to_string(), "1 000 000".to_string()],
            ]]
        );
        assert_eq!(body.runs.len(), 9);
    }

    #[test]
    fn test_read_rejects_non_zip() {
        assert!(matches!(DocxBody::read(b"not a zip"), Err(BackendError::Docx(_))));
    }
}
