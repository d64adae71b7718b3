//! Core library for financial data extraction from uploaded documents.
//!
//! This crate provides:
//! - Document sniffing (PDF, DOCX, plain text, raster images)
//! - A fixed-order chain of extraction backends (text layer, layout and
//!   lattice tables, legacy reader, OCR) that degrades instead of failing
//! - Locale-aware parsing of monetary amounts in RUB, USD, EUR, KZT and KGS
//! - Scored, deduplicated budget candidates with a per-currency summary
//! - A content-addressed on-disk result cache

pub mod amounts;
pub mod cache;
pub mod document;
pub mod docx;
pub mod error;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;

pub use amounts::{BudgetAggregator, BudgetReport, CurrencyMatcher, format_amount, parse_amount};
pub use cache::ResultCache;
pub use document::{DocumentKind, SourceDocument};
pub use error::{BackendError, CacheError, FidexError, OcrError, Result};
pub use extraction::{
    BackendOutput, ExtractionBackend, ExtractionOrchestrator, OrchestratorBuilder, RawTable,
};
pub use models::{
    BackendId, BudgetCandidate, BudgetSource, CurrencyCode, CurrencyMention, ExtractionResult,
    FidexConfig, Table,
};
pub use pipeline::Pipeline;
