//! Fixed-order fallback chain over the extraction backends.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{
    AdvancedTableBackend, BackendOutput, ExtractionBackend, LayoutTableBackend, LegacyBackend,
    RasterOcrBackend, TableNormalizer, TextLayerBackend,
};
use crate::document::SourceDocument;
use crate::error::BackendError;
use crate::models::{BackendId, FidexConfig, Table};

/// Text and tables gathered from one document.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOutput {
    pub text: String,
    pub tables: Vec<Table>,
    /// Backends whose output was kept, in run order.
    pub methods_used: Vec<BackendId>,
    /// Largest page count any backend reported.
    pub page_count: u32,
    /// One entry per backend that failed.
    pub warnings: Vec<String>,
}

/// Runs the backends in priority order, isolating each one.
///
/// 1. text-layer: its text becomes the document text when non-empty.
/// 2. layout-table: always runs; tables are kept, text only fills an empty slot.
/// 3. advanced-table: always runs; tables are added without merging.
/// 4. legacy: only while the text is still empty.
/// 5. raster-ocr: only while the text is still empty and OCR is available.
///
/// A backend error or panic is logged and the chain moves on.
pub struct ExtractionOrchestrator {
    text_layer: Box<dyn ExtractionBackend>,
    layout_table: Box<dyn ExtractionBackend>,
    advanced_table: Box<dyn ExtractionBackend>,
    legacy: Box<dyn ExtractionBackend>,
    ocr: Box<dyn ExtractionBackend>,
    normalizer: TableNormalizer,
}

impl ExtractionOrchestrator {
    /// Orchestrator with the built-in backends.
    pub fn new(config: &FidexConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: &FidexConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config.clone())
    }

    pub fn run(&self, doc: &SourceDocument<'_>) -> OrchestratorOutput {
        let mut out = OrchestratorOutput::default();

        debug!("Extracting {} ({}, {} bytes)", doc.filename, doc.kind, doc.bytes.len());

        if let Some(result) = self.attempt(self.text_layer.as_ref(), doc, &mut out) {
            if !result.text.trim().is_empty() {
                out.text = result.text;
                out.methods_used.push(BackendId::TextLayer);
            }
        }

        for backend in [self.layout_table.as_ref(), self.advanced_table.as_ref()] {
            if let Some(result) = self.attempt(backend, doc, &mut out) {
                let mut contributed = self.keep_tables(backend.id(), result.tables, &mut out.tables);
                if out.text.is_empty() && !result.text.trim().is_empty() {
                    out.text = result.text;
                    contributed = true;
                }
                if contributed {
                    out.methods_used.push(backend.id());
                }
            }
        }

        for backend in [self.legacy.as_ref(), self.ocr.as_ref()] {
            if !out.text.is_empty() {
                break;
            }
            if !backend.is_available() {
                debug!("{} not available, skipping", backend.id());
                continue;
            }
            if let Some(result) = self.attempt(backend, doc, &mut out) {
                if !result.text.trim().is_empty() {
                    out.text = result.text;
                    out.methods_used.push(backend.id());
                }
            }
        }

        info!(
            "Extracted {} chars and {} tables from {} via [{}]",
            out.text.len(),
            out.tables.len(),
            doc.filename,
            out.methods_used
                .iter()
                .map(BackendId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        out
    }

    /// Run one backend, converting errors and panics into a logged skip.
    fn attempt(
        &self,
        backend: &dyn ExtractionBackend,
        doc: &SourceDocument<'_>,
        out: &mut OrchestratorOutput,
    ) -> Option<BackendOutput> {
        let id = backend.id();
        let start = Instant::now();

        let result = catch_unwind(AssertUnwindSafe(|| backend.try_extract(doc)))
            .unwrap_or_else(|payload| Err(BackendError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(output) => {
                debug!(
                    "{}: {} chars, {} tables, {} pages in {:?}",
                    id,
                    output.text.len(),
                    output.tables.len(),
                    output.page_count,
                    start.elapsed()
                );
                out.page_count = out.page_count.max(output.page_count);
                Some(output)
            }
            Err(e) if e.is_skip() => {
                debug!("{} skipped: {}", id, e);
                None
            }
            Err(e) => {
                warn!("{} failed on {}: {}", id, doc.filename, e);
                out.warnings.push(format!("{}: {}", id, e));
                None
            }
        }
    }

    /// Normalize and append tables. Returns whether any survived.
    fn keep_tables(&self, source: BackendId, raw: Vec<super::RawTable>, tables: &mut Vec<Table>) -> bool {
        let found = raw.len();
        let before = tables.len();
        tables.extend(
            raw.into_iter()
                .enumerate()
                .filter_map(|(idx, table)| self.normalizer.normalize(table, source, idx)),
        );
        let kept = tables.len() - before;
        if found > 0 {
            debug!("{}: kept {} of {} tables", source, kept, found);
        }
        kept > 0
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builds an [`ExtractionOrchestrator`], defaulting any backend not supplied.
pub struct OrchestratorBuilder {
    config: FidexConfig,
    text_layer: Option<Box<dyn ExtractionBackend>>,
    layout_table: Option<Box<dyn ExtractionBackend>>,
    advanced_table: Option<Box<dyn ExtractionBackend>>,
    legacy: Option<Box<dyn ExtractionBackend>>,
    ocr: Option<Box<dyn ExtractionBackend>>,
}

impl OrchestratorBuilder {
    pub fn new(config: FidexConfig) -> Self {
        Self {
            config,
            text_layer: None,
            layout_table: None,
            advanced_table: None,
            legacy: None,
            ocr: None,
        }
    }

    /// Use `backend` for the slot named by its [`ExtractionBackend::id`].
    pub fn with_backend(mut self, backend: Box<dyn ExtractionBackend>) -> Self {
        let slot = match backend.id() {
            BackendId::TextLayer => &mut self.text_layer,
            BackendId::LayoutTable => &mut self.layout_table,
            BackendId::AdvancedTable => &mut self.advanced_table,
            BackendId::Legacy => &mut self.legacy,
            BackendId::RasterOcr => &mut self.ocr,
        };
        *slot = Some(backend);
        self
    }

    pub fn build(self) -> ExtractionOrchestrator {
        let pdf = &self.config.pdf;
        ExtractionOrchestrator {
            text_layer: self
                .text_layer
                .unwrap_or_else(|| Box::new(TextLayerBackend::new(pdf.clone()))),
            layout_table: self
                .layout_table
                .unwrap_or_else(|| Box::new(LayoutTableBackend::new(pdf.clone()))),
            advanced_table: self
                .advanced_table
                .unwrap_or_else(|| Box::new(AdvancedTableBackend::new(pdf.clone()))),
            legacy: self
                .legacy
                .unwrap_or_else(|| Box::new(LegacyBackend::new(pdf.clone()))),
            ocr: self
                .ocr
                .unwrap_or_else(|| Box::new(RasterOcrBackend::from_config(&self.config.ocr, pdf))),
            normalizer: TableNormalizer::new(),
        }
    }
}
