//! PDF loading shared by the PDF backends.

mod content;
mod images;

pub use content::{FontEncodings, PageGeometry, Rule, TextFragment};
pub use images::page_images;

use std::borrow::Cow;

use lopdf::{Document, ObjectId};
use tracing::debug;

use crate::error::BackendError;

/// A parsed PDF plus the bytes text extractors should read.
///
/// For encrypted documents opened with the empty password, `data` holds the
/// decrypted re-serialization so byte-oriented readers see plain content.
pub struct LoadedPdf<'a> {
    pub document: Document,
    pub data: Cow<'a, [u8]>,
}

impl<'a> LoadedPdf<'a> {
    /// Parse `bytes`, decrypting with an empty password when needed.
    pub fn load(bytes: &'a [u8]) -> Result<Self, BackendError> {
        let mut document = Document::load_mem(bytes)?;

        let data = if document.is_encrypted() {
            document
                .decrypt("")
                .map_err(|e| BackendError::Pdf(format!("encrypted PDF: {}", e)))?;
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| BackendError::Pdf(format!("failed to save decrypted PDF: {}", e)))?;
            Cow::Owned(decrypted)
        } else {
            Cow::Borrowed(bytes)
        };

        Ok(Self { document, data })
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Page numbers and object ids in page order, capped at `max_pages` (0 = all).
    pub fn pages(&self, max_pages: usize) -> Vec<(u32, ObjectId)> {
        let pages = self.document.get_pages().into_iter();
        if max_pages == 0 {
            pages.collect()
        } else {
            pages.take(max_pages).collect()
        }
    }

    /// Positioned text and ruling lines of one page.
    pub fn geometry(&self, page_id: ObjectId) -> Result<PageGeometry, BackendError> {
        let raw = self.document.get_page_content(page_id)?;
        let content = lopdf::content::Content::decode(&raw)?;
        let fonts = FontEncodings::for_page(&self.document, page_id);
        Ok(PageGeometry::from_operations(&content.operations, &fonts))
    }
}
