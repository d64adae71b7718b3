//! Last text reader tried before OCR.

use tracing::{debug, warn};

use super::{BackendOutput, ExtractionBackend};
use crate::document::{DocumentKind, SourceDocument};
use crate::docx::DocxBody;
use crate::error::BackendError;
use crate::models::{BackendId, PdfConfig};
use crate::pdf::LoadedPdf;

/// Simple sequential reader: lopdf page by page for PDFs, raw `w:t` runs for DOCX.
///
/// Tolerates pages that fail to decode, which is where the text-layer
/// backend gives up on the whole document.
pub struct LegacyBackend {
    config: PdfConfig,
}

impl LegacyBackend {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    fn extract_pdf(&self, bytes: &[u8]) -> Result<BackendOutput, BackendError> {
        let pdf = LoadedPdf::load(bytes)?;
        let mut text = String::new();

        for (page_num, _) in pdf.pages(self.config.max_pages) {
            match pdf.document.extract_text(&[page_num]) {
                Ok(page_text) => {
                    let page_text = page_text.trim();
                    if !page_text.is_empty() {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(page_text);
                    }
                }
                Err(e) => warn!("Legacy reader could not read page {}: {}", page_num, e),
            }
        }

        debug!("Legacy reader: {} chars", text.len());

        Ok(BackendOutput {
            text,
            tables: Vec::new(),
            page_count: pdf.page_count(),
        })
    }
}

impl Default for LegacyBackend {
    fn default() -> Self {
        Self::new(PdfConfig::default())
    }
}

impl ExtractionBackend for LegacyBackend {
    fn id(&self) -> BackendId {
        BackendId::Legacy
    }

    fn try_extract(&self, doc: &SourceDocument<'_>) -> Result<BackendOutput, BackendError> {
        match doc.kind {
            DocumentKind::Pdf => self.extract_pdf(doc.bytes),
            DocumentKind::Docx => Ok(BackendOutput {
                text: DocxBody::read(doc.bytes)?.runs.concat().trim().to_string(),
                ..Default::default()
            }),
            kind => Err(BackendError::Unsupported(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_unsupported() {
        let doc = SourceDocument::new(b"hello", "a.txt");
        assert!(LegacyBackend::default().try_extract(&doc).unwrap_err().is_skip());
    }
}
