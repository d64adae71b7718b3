//! Data models and configuration.

pub mod config;
pub mod currency;
pub mod result;

pub use config::{BudgetConfig, CacheConfig, FidexConfig, OcrConfig, PdfConfig};
pub use currency::CurrencyCode;
pub use result::{
    BackendId, BudgetCandidate, BudgetSource, CurrencyBreakdown, CurrencyMention,
    ExtractionMetadata, ExtractionResult, StructuredData, Table,
};
