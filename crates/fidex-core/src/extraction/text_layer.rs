//! Fast path for digitally produced documents.

use tracing::debug;

use super::{BackendOutput, ExtractionBackend};
use crate::document::{DocumentKind, SourceDocument};
use crate::docx::DocxBody;
use crate::error::BackendError;
use crate::models::{BackendId, PdfConfig};
use crate::pdf::LoadedPdf;

/// Reads the embedded text layer: `pdf-extract` for PDFs, paragraphs for
/// DOCX, the bytes themselves for plain text.
pub struct TextLayerBackend {
    config: PdfConfig,
}

impl TextLayerBackend {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    fn extract_pdf(&self, bytes: &[u8]) -> Result<BackendOutput, BackendError> {
        let pdf = LoadedPdf::load(bytes)?;
        let page_count = pdf.page_count();

        let mut pages = pdf_extract::extract_text_from_mem_by_pages(&pdf.data)
            .map_err(|e| BackendError::Pdf(e.to_string()))?;
        if self.config.max_pages > 0 {
            pages.truncate(self.config.max_pages);
        }

        let text = pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        debug!("Text layer: {} pages, {} chars", pages.len(), text.len());

        Ok(BackendOutput {
            text,
            tables: Vec::new(),
            page_count,
        })
    }
}

impl Default for TextLayerBackend {
    fn default() -> Self {
        Self::new(PdfConfig::default())
    }
}

impl ExtractionBackend for TextLayerBackend {
    fn id(&self) -> BackendId {
        BackendId::TextLayer
    }

    fn try_extract(&self, doc: &SourceDocument<'_>) -> Result<BackendOutput, BackendError> {
        match doc.kind {
            DocumentKind::Pdf => self.extract_pdf(doc.bytes),
            DocumentKind::Docx => Ok(BackendOutput {
                text: DocxBody::read(doc.bytes)?.text().trim().to_string(),
                ..Default::default()
            }),
            DocumentKind::Text => Ok(BackendOutput {
                text: doc.as_text().trim().to_string(),
                ..Default::default()
            }),
            kind => Err(BackendError::Unsupported(kind)),
        }
    }
}
