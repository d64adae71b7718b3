//! Document extraction backends and the orchestrator that chains them.

mod advanced_table;
mod layout_table;
mod legacy;
mod normalize;
mod orchestrator;
mod raster_ocr;
mod text_layer;

pub use advanced_table::AdvancedTableBackend;
pub use layout_table::LayoutTableBackend;
pub use legacy::LegacyBackend;
pub use normalize::TableNormalizer;
pub use orchestrator::{ExtractionOrchestrator, OrchestratorBuilder, OrchestratorOutput};
pub use raster_ocr::RasterOcrBackend;
pub use text_layer::TextLayerBackend;

use crate::document::SourceDocument;
use crate::error::BackendError;
use crate::models::BackendId;

/// A grid of cells as a backend found it, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// 1-indexed page, when the document has pages.
    pub page: Option<u32>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(page: Option<u32>, rows: Vec<Vec<String>>) -> Self {
        Self {
            page,
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Some).collect())
                .collect(),
        }
    }
}

/// What one backend produced for a document.
#[derive(Debug, Clone, Default)]
pub struct BackendOutput {
    pub text: String,
    pub tables: Vec<RawTable>,
    /// Pages the backend saw, 0 when the format has no pages.
    pub page_count: u32,
}

/// One document extraction strategy.
pub trait ExtractionBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Extract text and tables.
    ///
    /// Returns [`BackendError::Unsupported`] for document kinds the backend
    /// does not handle.
    fn try_extract(&self, doc: &SourceDocument<'_>) -> Result<BackendOutput, BackendError>;

    /// Whether the backend can run at all in this process.
    fn is_available(&self) -> bool {
        true
    }
}
