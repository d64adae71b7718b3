//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FidexError, Result};

/// Main configuration for the fidex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FidexConfig {
    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Budget scoring and deduplication configuration.
    pub budget: BudgetConfig,

    /// Result cache configuration.
    pub cache: CacheConfig,
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,

    /// Maximum vertical distance (PDF units) between fragments on the same row.
    pub row_tolerance: f32,

    /// Minimum horizontal gap (PDF units) that separates two table columns.
    pub min_column_gap: f32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_pages: 0,
            row_tolerance: 3.0,
            min_column_gap: 12.0,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Run OCR when no text layer could be found.
    pub enabled: bool,

    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name. The Cyrillic model also covers Latin.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Upscale factor applied to page images before recognition.
    pub render_scale: f32,

    /// Keep `[UNK]` tokens in recognised text instead of blanking them.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "cyrillic_rec.onnx".to_string(),
            dictionary: "cyrillic_dict.txt".to_string(),
            render_scale: 2.0,
            keep_unk: false,
        }
    }
}

impl OcrConfig {
    /// Full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir.join(model_name)
    }

    /// Upscale factor, never below 2x.
    pub fn effective_scale(&self) -> f32 {
        if self.render_scale.is_finite() {
            self.render_scale.max(2.0)
        } else {
            2.0
        }
    }

    /// Whether all model files are present on disk.
    pub fn models_present(&self) -> bool {
        [&self.detection_model, &self.recognition_model, &self.dictionary]
            .iter()
            .all(|name| self.model_path(name).exists())
    }
}

/// Budget scoring and deduplication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Amounts at or below this value are treated as noise.
    pub min_amount: u64,

    /// Relative tolerance under which two same-currency amounts are duplicates.
    pub dedup_tolerance: f64,

    /// Characters of context kept on each side of a text match.
    pub context_window: usize,

    /// Confidence of text mentions near budget keywords.
    pub budget_context_confidence: f64,

    /// Confidence of other text mentions.
    pub plain_confidence: f64,

    /// Confidence of numeric table cells.
    pub table_confidence: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            min_amount: 1000,
            dedup_tolerance: 0.05,
            context_window: 50,
            budget_context_confidence: 0.8,
            plain_confidence: 0.5,
            table_confidence: 0.7,
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cache entries.
    pub root_path: PathBuf,

    /// Disable to bypass the cache regardless of the per-call flag.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from(".fidex-cache"),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            enabled: true,
        }
    }
}

impl FidexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let budget = &self.budget;
        if !(0.0..1.0).contains(&budget.dedup_tolerance) {
            return Err(FidexError::Config(format!(
                "budget.dedup_tolerance must be in [0, 1), got {}",
                budget.dedup_tolerance
            )));
        }

        for (name, value) in [
            ("budget_context_confidence", budget.budget_context_confidence),
            ("plain_confidence", budget.plain_confidence),
            ("table_confidence", budget.table_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FidexError::Config(format!(
                    "budget.{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.pdf.row_tolerance < 0.0 || self.pdf.min_column_gap <= 0.0 {
            return Err(FidexError::Config(
                "pdf.row_tolerance must be >= 0 and pdf.min_column_gap > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: FidexConfig =
            serde_json::from_str(r#"{"budget": {"min_amount": 5000}}"#).unwrap();
        assert_eq!(config.budget.min_amount, 5000);
        assert_eq!(config.budget.context_window, 50);
        assert_eq!(config.ocr.render_scale, 2.0);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_render_scale_clamped() {
        let ocr = OcrConfig {
            render_scale: 1.0,
            ..OcrConfig::default()
        };
        assert_eq!(ocr.effective_scale(), 2.0);

        let ocr = OcrConfig {
            render_scale: 3.0,
            ..OcrConfig::default()
        };
        assert_eq!(ocr.effective_scale(), 3.0);
    }

    #[test]
    fn test_validate_rejects_bad_tolerance() {
        let mut config = FidexConfig::default();
        assert!(config.validate().is_ok());

        config.budget.dedup_tolerance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = FidexConfig::default();
        config.cache.root_path = dir.path().join("cache");
        config.save(&path).unwrap();

        let loaded = FidexConfig::from_file(&path).unwrap();
        assert_eq!(loaded.cache.root_path, config.cache.root_path);
    }
}
