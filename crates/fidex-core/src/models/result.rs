//! Extraction result model and its JSON representation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::currency::CurrencyCode;

/// Identifier of an extraction backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendId {
    /// Native text layer of digitally produced documents.
    TextLayer,
    /// Layout-aware text and whitespace-aligned tables.
    LayoutTable,
    /// Ruling-line (lattice) table detection.
    AdvancedTable,
    /// Simple sequential page reader.
    Legacy,
    /// OCR over rasterised pages.
    RasterOcr,
}

impl BackendId {
    /// Fixed priority order in which backends are consulted.
    pub const ORDER: [BackendId; 5] = [
        Self::TextLayer,
        Self::LayoutTable,
        Self::AdvancedTable,
        Self::Legacy,
        Self::RasterOcr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextLayer => "text-layer",
            Self::LayoutTable => "layout-table",
            Self::AdvancedTable => "advanced-table",
            Self::Legacy => "legacy",
            Self::RasterOcr => "raster-ocr",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output of one extraction call.
///
/// Built once by the pipeline and never mutated afterwards; this is also the
/// exact value stored in the result cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Original filename.
    pub filename: String,

    /// When the extraction ran.
    pub extraction_timestamp: DateTime<Utc>,

    /// Backends that contributed non-empty output, in the order they ran.
    pub extraction_methods: Vec<BackendId>,

    /// Best available document text.
    pub text: String,

    /// Tables in discovery order. Different backends may report the same table.
    pub tables: Vec<Table>,

    /// Deduplicated budget candidates, highest confidence first.
    pub budgets: Vec<BudgetCandidate>,

    /// Every currency mention found in the text, in text order.
    pub currencies: Vec<CurrencyMention>,

    /// Summary over `budgets`.
    pub structured_data: StructuredData,

    /// Processing metadata.
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    /// Whether anything useful was extracted.
    pub fn success(&self) -> bool {
        self.metadata.extraction_success
    }

    /// Backends that contributed output.
    pub fn methods_used(&self) -> &[BackendId] {
        &self.extraction_methods
    }

    /// Wall-clock time spent producing this result.
    pub fn processing_time(&self) -> Duration {
        Duration::from_secs_f64(self.metadata.processing_time.max(0.0))
    }

    /// Serialize to the JSON shape used for persistence and caching.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A validated table.
///
/// Always has at least two rows, every row has the same width and contains
/// at least one non-empty cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TableRecord", from = "TableRecord")]
pub struct Table {
    pub source: BackendId,
    /// 1-based page number, when the backend knows it.
    pub page: Option<u32>,
    pub table_id: String,
    pub rows: Vec<Vec<String>>,
    pub has_numbers: bool,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// First row, conventionally the header.
    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Serialize, Deserialize)]
struct TableRecord {
    source: BackendId,
    page: Option<u32>,
    table_id: String,
    data: Vec<Vec<String>>,
    row_count: usize,
    col_count: usize,
    has_numbers: bool,
}

impl From<Table> for TableRecord {
    fn from(table: Table) -> Self {
        Self {
            row_count: table.row_count(),
            col_count: table.col_count(),
            source: table.source,
            page: table.page,
            table_id: table.table_id,
            data: table.rows,
            has_numbers: table.has_numbers,
        }
    }
}

impl From<TableRecord> for Table {
    fn from(record: TableRecord) -> Self {
        Self {
            source: record.source,
            page: record.page,
            table_id: record.table_id,
            rows: record.data,
            has_numbers: record.has_numbers,
        }
    }
}

/// Where a budget candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetSource {
    /// Character offset of the match in the document text.
    Text { position: usize },
    /// Cell coordinates inside a table.
    Table { row: usize, col: usize },
}

impl fmt::Display for BudgetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { position } => write!(f, "text:{}", position),
            Self::Table { row, col } => write!(f, "table:{}:{}", row, col),
        }
    }
}

impl FromStr for BudgetSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let number = |p: &str| p.parse::<usize>().map_err(|e| format!("{}: {}", s, e));
        match parts.as_slice() {
            ["text", position] => Ok(Self::Text { position: number(position)? }),
            ["table", row, col] => Ok(Self::Table {
                row: number(row)?,
                col: number(col)?,
            }),
            _ => Err(format!("invalid budget source: {}", s)),
        }
    }
}

impl Serialize for BudgetSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BudgetSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A detected monetary amount that survived filtering and deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCandidate {
    /// Parsed amount in whole currency units.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    pub currency: CurrencyCode,

    /// Human-readable rendering, e.g. `2 500 000 ₽`.
    pub formatted: String,

    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f64,

    /// Whether cost/price/total keywords were found near the amount.
    pub is_budget_context: bool,

    pub source: BudgetSource,

    /// Text surrounding the match.
    pub context: String,
}

/// A raw currency occurrence in the document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyMention {
    pub currency: CurrencyCode,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// Character offset of the match start.
    pub position: usize,
}

/// Informational summary over the accepted budget candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
    pub total_budgets: usize,

    pub currency_breakdown: BTreeMap<CurrencyCode, CurrencyBreakdown>,

    #[serde(with = "rust_decimal::serde::float_option")]
    pub largest_amount: Option<Decimal>,

    #[serde(with = "rust_decimal::serde::float_option")]
    pub smallest_amount: Option<Decimal>,

    /// At least one extracted table carries numeric data.
    pub has_structured_pricing: bool,
}

/// Per-currency statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyBreakdown {
    pub count: usize,

    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub min_amount: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub max_amount: Decimal,
}

/// Processing metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub page_count: u32,

    /// Upload size in bytes.
    pub file_size: usize,

    pub extraction_success: bool,

    /// Seconds.
    pub processing_time: f64,

    /// Set when nothing could be extracted.
    #[serde(default)]
    pub error: Option<String>,

    /// One entry per backend that failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
