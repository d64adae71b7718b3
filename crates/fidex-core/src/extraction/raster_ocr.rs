//! OCR of scanned pages and image uploads.

use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, info, warn};

use super::{BackendOutput, ExtractionBackend};
use crate::document::{DocumentKind, SourceDocument};
use crate::error::{BackendError, OcrError};
use crate::models::{BackendId, OcrConfig, PdfConfig};
use crate::ocr::{TextRecognizer, reading_order_text};
use crate::pdf::{LoadedPdf, page_images};

/// Upscaling beyond 2x stops once the longer side reaches this many pixels.
const MAX_SIDE: u32 = 8000;

/// Smallest upscale applied to every page, however large.
const MIN_SCALE: f32 = 2.0;

/// Rasterizes each page (the embedded scan for PDFs), upscales it and runs OCR.
pub struct RasterOcrBackend {
    recognizer: Option<Box<dyn TextRecognizer>>,
    scale: f32,
    max_pages: usize,
}

impl RasterOcrBackend {
    /// Backend without a recognizer; never available.
    pub fn disabled() -> Self {
        Self {
            recognizer: None,
            scale: MIN_SCALE,
            max_pages: 0,
        }
    }

    pub fn with_recognizer(recognizer: Box<dyn TextRecognizer>, ocr: &OcrConfig, pdf: &PdfConfig) -> Self {
        Self {
            recognizer: Some(recognizer),
            scale: ocr.effective_scale(),
            max_pages: pdf.max_pages,
        }
    }

    /// Load the OCR engine when OCR is enabled and its models are on disk.
    pub fn from_config(ocr: &OcrConfig, pdf: &PdfConfig) -> Self {
        if !ocr.enabled {
            debug!("OCR disabled in configuration");
            return Self::disabled();
        }
        if !ocr.models_present() {
            info!("OCR models not found in {}, OCR unavailable", ocr.model_dir.display());
            return Self::disabled();
        }

        match load_engine(ocr) {
            Some(recognizer) => Self::with_recognizer(recognizer, ocr, pdf),
            None => Self::disabled(),
        }
    }

    fn recognize_page(&self, recognizer: &dyn TextRecognizer, image: &DynamicImage) -> Result<String, OcrError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("{}x{}", width, height)));
        }

        let longer = width.max(height) as f32;
        let scale = self.scale.min((MAX_SIDE as f32 / longer).max(MIN_SCALE));
        let w = (width as f32 * scale).round() as u32;
        let h = (height as f32 * scale).round() as u32;
        let scaled = image.resize_exact(w, h, FilterType::Lanczos3);

        Ok(reading_order_text(recognizer.recognize(&scaled)?))
    }

    fn pdf_pages(&self, bytes: &[u8]) -> Result<(Vec<DynamicImage>, u32), BackendError> {
        let pdf = LoadedPdf::load(bytes)?;
        let mut pages = Vec::new();
        for (page_num, page_id) in pdf.pages(self.max_pages) {
            let images = page_images(&pdf.document, page_id);
            match largest(images) {
                Some(image) => pages.push(image),
                None => debug!("Page {} has no decodable image", page_num),
            }
        }
        Ok((pages, pdf.page_count()))
    }
}

#[cfg(feature = "ocr")]
fn load_engine(ocr: &OcrConfig) -> Option<Box<dyn TextRecognizer>> {
    match crate::ocr::OnnxOcrEngine::load(ocr) {
        Ok(engine) => Some(Box::new(engine)),
        Err(e) => {
            warn!("OCR unavailable: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn load_engine(_ocr: &OcrConfig) -> Option<Box<dyn TextRecognizer>> {
    warn!("OCR models present but fidex-core was built without the `ocr` feature");
    None
}

/// The scan of a page is its largest image.
fn largest(images: Vec<DynamicImage>) -> Option<DynamicImage> {
    images
        .into_iter()
        .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
}

impl ExtractionBackend for RasterOcrBackend {
    fn id(&self) -> BackendId {
        BackendId::RasterOcr
    }

    fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    fn try_extract(&self, doc: &SourceDocument<'_>) -> Result<BackendOutput, BackendError> {
        let recognizer = self
            .recognizer
            .as_deref()
            .ok_or_else(|| BackendError::Unavailable("no OCR engine loaded".to_string()))?;

        let (images, page_count) = match doc.kind {
            DocumentKind::Pdf => self.pdf_pages(doc.bytes)?,
            DocumentKind::Image => {
                let image = image::load_from_memory(doc.bytes)
                    .map_err(|e| OcrError::InvalidImage(e.to_string()))?;
                (vec![image], 1)
            }
            kind => return Err(BackendError::Unsupported(kind)),
        };

        let mut texts = Vec::with_capacity(images.len());
        for (idx, image) in images.iter().enumerate() {
            match self.recognize_page(recognizer, image) {
                Ok(text) if !text.is_empty() => texts.push(text),
                Ok(_) => {}
                Err(e) => warn!("OCR failed on page {}: {}", idx + 1, e),
            }
        }

        info!("OCR: {} of {} pages produced text", texts.len(), images.len());

        Ok(BackendOutput {
            text: texts.join("\n"),
            tables: Vec::new(),
            page_count,
        })
    }
}
