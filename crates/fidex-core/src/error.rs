//! Error types for the fidex-core library.

use thiserror::Error;

use crate::document::DocumentKind;

/// Main error type for the fidex library.
#[derive(Error, Debug)]
pub enum FidexError {
    /// Result cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure of a single extraction backend.
///
/// Never crosses the orchestrator boundary: every variant is logged and the
/// backend is skipped.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend does not handle this kind of document.
    #[error("unsupported document kind: {0}")]
    Unsupported(DocumentKind),

    /// The PDF could not be parsed or read.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// The DOCX container or its XML could not be read.
    #[error("DOCX error: {0}")]
    Docx(String),

    /// OCR failed.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// A capability the backend needs is not present.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend panicked.
    #[error("backend panicked: {0}")]
    Panicked(String),
}

impl BackendError {
    /// Whether this failure is an expected skip rather than a real error.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Unsupported(_) | Self::Unavailable(_))
    }
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        Self::Pdf(err.to_string())
    }
}

impl From<zip::result::ZipError> for BackendError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Docx(err.to_string())
    }
}

impl From<quick_xml::Error> for BackendError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Docx(err.to_string())
    }
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text detection or recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors related to the on-disk result cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing a cache entry failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache entry could not be (de)serialized.
    #[error("cache entry is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Atomically moving a written entry into place failed.
    #[error("failed to persist cache entry: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Result type for the fidex library.
pub type Result<T> = std::result::Result<T, FidexError>;
