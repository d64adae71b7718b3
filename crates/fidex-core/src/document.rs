//! Uploaded document classification.

use std::borrow::Cow;
use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};

/// Broad format of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// PDF with or without a text layer.
    Pdf,
    /// Office Open XML word document.
    Docx,
    /// Plain text of any encoding.
    Text,
    /// Raster image (scan or photo).
    Image,
    /// Zero-length upload.
    Empty,
    /// Anything else: no backend reads it.
    Binary,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "text",
            Self::Image => "image",
            Self::Empty => "empty",
            Self::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// An uploaded document: raw bytes, original filename and sniffed kind.
#[derive(Debug, Clone)]
pub struct SourceDocument<'a> {
    /// Raw uploaded bytes.
    pub bytes: &'a [u8],
    /// Filename as given by the uploader.
    pub filename: &'a str,
    /// Detected format.
    pub kind: DocumentKind,
}

impl<'a> SourceDocument<'a> {
    /// Wrap raw bytes, detecting the document kind.
    pub fn new(bytes: &'a [u8], filename: &'a str) -> Self {
        Self {
            bytes,
            filename,
            kind: detect_kind(bytes, filename),
        }
    }

    /// Contents decoded as text (lossy for non-UTF-8 input).
    pub fn as_text(&self) -> Cow<'a, str> {
        let bytes = self.bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(self.bytes);
        String::from_utf8_lossy(bytes)
    }
}

/// Detect the kind of a document from magic bytes, falling back to the extension.
pub fn detect_kind(bytes: &[u8], filename: &str) -> DocumentKind {
    if bytes.is_empty() {
        return DocumentKind::Empty;
    }

    if is_pdf_magic(bytes) {
        return DocumentKind::Pdf;
    }

    let lower = filename.to_lowercase();

    if bytes.starts_with(b"PK\x03\x04") && (lower.ends_with(".docx") || zip_has_document_xml(bytes)) {
        return DocumentKind::Docx;
    }

    if image::guess_format(bytes).is_ok() {
        return DocumentKind::Image;
    }

    if lower.ends_with(".pdf") {
        // Broken header; let the PDF backends try and fail explicitly.
        return DocumentKind::Pdf;
    }

    if looks_like_text(bytes) {
        DocumentKind::Text
    } else {
        DocumentKind::Binary
    }
}

/// Control bytes tolerated in non-UTF-8 text, as a share of the sample.
const MAX_CONTROL_RATIO: f64 = 0.02;

/// Valid UTF-8, or a single-byte encoding without NULs and with almost no
/// control characters.
fn looks_like_text(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return !text.chars().any(|c| c == '\0');
    }

    let sample = &bytes[..bytes.len().min(8192)];
    if sample.contains(&0) {
        return false;
    }
    let control = sample
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C)) || b == 0x7F)
        .count();

    (control as f64) <= MAX_CONTROL_RATIO * sample.len() as f64
}

/// Check if bytes start with PDF magic number.
fn is_pdf_magic(bytes: &[u8]) -> bool {
    // %PDF may follow a BOM or leading whitespace
    let head: Vec<u8> = bytes
        .iter()
        .take(1024)
        .skip_while(|&&b| b == 0xEF || b == 0xBB || b == 0xBF || b.is_ascii_whitespace())
        .take(4)
        .copied()
        .collect();

    head.starts_with(b"%PDF")
}

fn zip_has_document_xml(bytes: &[u8]) -> bool {
    zip::ZipArchive::new(Cursor::new(bytes))
        .map(|archive| archive.file_names().any(|name| name == "word/document.xml"))
        .unwrap_or(false)
}
