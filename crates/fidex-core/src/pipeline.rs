//! The `extract` entry point: cache, orchestrator, budget aggregation.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::amounts::BudgetAggregator;
use crate::cache::ResultCache;
use crate::document::{DocumentKind, SourceDocument};
use crate::extraction::{ExtractionOrchestrator, OrchestratorOutput};
use crate::models::{ExtractionMetadata, ExtractionResult, FidexConfig};

/// Stateless extraction pipeline; safe to share across threads.
pub struct Pipeline {
    orchestrator: ExtractionOrchestrator,
    aggregator: BudgetAggregator,
    cache: Option<ResultCache>,
}

impl Pipeline {
    /// Pipeline with the built-in backends. Loads the OCR models if configured.
    pub fn new(config: FidexConfig) -> Self {
        let orchestrator = ExtractionOrchestrator::new(&config);
        Self::with_orchestrator(config, orchestrator)
    }

    /// Pipeline over a custom orchestrator.
    pub fn with_orchestrator(config: FidexConfig, orchestrator: ExtractionOrchestrator) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| ResultCache::new(config.cache.root_path.clone()));

        Self {
            aggregator: BudgetAggregator::new(config.budget),
            orchestrator,
            cache,
        }
    }

    /// The result cache, unless disabled in the configuration.
    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Extract text, tables and budget candidates from an uploaded document.
    ///
    /// Never fails: a document nothing can be read from yields a result with
    /// `extraction_success = false` and `metadata.error` set. Successful
    /// results are cached under the hash of `bytes` and `filename` when
    /// `use_cache` is set.
    pub fn extract(&self, bytes: &[u8], filename: &str, use_cache: bool) -> ExtractionResult {
        let start = Instant::now();
        let cache = self.cache.as_ref().filter(|_| use_cache);
        let key = cache.map(|_| ResultCache::key(bytes, filename));

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            if let Some(hit) = cache.lookup(key) {
                info!("Using cached result for {}", filename);
                return hit;
            }
        }

        let doc = SourceDocument::new(bytes, filename);
        let extracted = self.orchestrator.run(&doc);
        let result = self.assemble(&doc, extracted, start);

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            if result.success() {
                cache.store(key, &result);
            } else {
                debug!("Not caching unsuccessful result for {}", filename);
            }
        }

        result
    }

    fn assemble(&self, doc: &SourceDocument<'_>, extracted: OrchestratorOutput, start: Instant) -> ExtractionResult {
        let report = self.aggregator.aggregate(&extracted.text, &extracted.tables);

        let success =
            !extracted.text.is_empty() || !extracted.tables.is_empty() || !report.budgets.is_empty();

        let error = (!success).then(|| match doc.kind {
            DocumentKind::Empty => "empty document".to_string(),
            DocumentKind::Binary => "unrecognized binary document".to_string(),
            _ if !extracted.warnings.is_empty() => {
                format!("all extraction backends failed ({})", extracted.warnings.len())
            }
            _ => "no text or tables found".to_string(),
        });

        let processing_time = start.elapsed().as_secs_f64();
        info!(
            "{}: {} budgets, {} tables, success={} in {:.3}s",
            doc.filename,
            report.budgets.len(),
            extracted.tables.len(),
            success,
            processing_time
        );

        ExtractionResult {
            filename: doc.filename.to_string(),
            extraction_timestamp: Utc::now(),
            extraction_methods: extracted.methods_used,
            text: extracted.text,
            tables: extracted.tables,
            budgets: report.budgets,
            currencies: report.currencies,
            structured_data: report.structured_data,
            metadata: ExtractionMetadata {
                page_count: extracted.page_count,
                file_size: doc.bytes.len(),
                extraction_success: success,
                processing_time,
                error,
                warnings: extracted.warnings,
            },
        }
    }
}
