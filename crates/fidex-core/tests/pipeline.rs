use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fidex_core::models::CacheConfig;
use fidex_core::{
    BackendError, BackendId, BackendOutput, BudgetSource, CurrencyCode, ExtractionBackend,
    ExtractionOrchestrator, FidexConfig, Pipeline, SourceDocument,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

/// Mock backend counting its invocations.
struct Counting {
    id: BackendId,
    text: Option<&'static str>,
    calls: Arc<AtomicUsize>,
}

impl ExtractionBackend for Counting {
    fn id(&self) -> BackendId {
        self.id
    }

    fn try_extract(&self, doc: &SourceDocument<'_>) -> Result<BackendOutput, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.text {
            Some(text) => Ok(BackendOutput {
                text: text.to_string(),
                ..Default::default()
            }),
            None => Err(BackendError::Unsupported(doc.kind)),
        }
    }
}

struct Broken(BackendId);

impl ExtractionBackend for Broken {
    fn id(&self) -> BackendId {
        self.0
    }

    fn try_extract(&self, _doc: &SourceDocument<'_>) -> Result<BackendOutput, BackendError> {
        Err(BackendError::Pdf("unexpected end of content stream".to_string()))
    }
}

fn config(cache_root: &std::path::Path) -> FidexConfig {
    FidexConfig {
        cache: CacheConfig::new(cache_root),
        ..FidexConfig::default()
    }
}

fn counting_pipeline(config: FidexConfig, calls: &Arc<AtomicUsize>) -> Pipeline {
    let mut builder = ExtractionOrchestrator::builder(&config);
    for id in BackendId::ORDER {
        let text = (id == BackendId::TextLayer).then_some("Итого по смете: 4 200 000 руб.");
        builder = builder.with_backend(Box::new(Counting {
            id,
            text,
            calls: calls.clone(),
        }));
    }
    Pipeline::with_orchestrator(config, builder.build())
}

#[test]
fn test_cached_result_is_identical_and_skips_backends() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = counting_pipeline(config(dir.path()), &calls);

    let first = pipeline.extract(b"scan-0001", "smeta.pdf", true);
    let after_first = calls.load(Ordering::SeqCst);
    assert!(after_first > 0);

    let second = pipeline.extract(b"scan-0001", "smeta.pdf", true);

    assert_eq!(calls.load(Ordering::SeqCst), after_first);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(second.budgets[0].amount, Decimal::from(4_200_000));
}

#[test]
fn test_same_bytes_different_name_cached_separately() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = counting_pipeline(config(dir.path()), &calls);

    pipeline.extract(b"same", "a.pdf", true);
    let after_first = calls.load(Ordering::SeqCst);
    pipeline.extract(b"same", "b.pdf", true);

    assert_eq!(calls.load(Ordering::SeqCst), after_first * 2);
}

#[test]
fn test_use_cache_false_always_runs() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = counting_pipeline(config(dir.path()), &calls);

    pipeline.extract(b"doc", "a.pdf", false);
    let after_first = calls.load(Ordering::SeqCst);
    pipeline.extract(b"doc", "a.pdf", false);

    assert_eq!(calls.load(Ordering::SeqCst), after_first * 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_failing_layout_backend_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let orchestrator = ExtractionOrchestrator::builder(&config)
        .with_backend(Box::new(Broken(BackendId::LayoutTable)))
        .build();
    let pipeline = Pipeline::with_orchestrator(config, orchestrator);

    let result = pipeline.extract("Бюджет проекта 1 500 000 ₽".as_bytes(), "plan.txt", false);

    assert!(result.success());
    assert_eq!(result.text, "Бюджет проекта 1 500 000 ₽");
    assert!(!result.methods_used().contains(&BackendId::LayoutTable));
    assert_eq!(result.metadata.warnings.len(), 1);
    assert!(result.metadata.warnings[0].starts_with("layout-table"));
}

#[test]
fn test_russian_offer_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path()));

    let result = pipeline.extract(
        "Стоимость: 2 500 000 ₽, альтернатива $35,000".as_bytes(),
        "offer.txt",
        true,
    );

    let mentions: Vec<(CurrencyCode, Decimal)> = result
        .currencies
        .iter()
        .map(|m| (m.currency, m.amount))
        .collect();
    assert_eq!(
        mentions,
        vec![
            (CurrencyCode::Rub, Decimal::from(2_500_000)),
            (CurrencyCode::Usd, Decimal::from(35_000)),
        ]
    );

    let rub = &result.budgets[0];
    assert_eq!(rub.currency, CurrencyCode::Rub);
    assert_eq!(rub.confidence, 0.8);
    assert!(rub.is_budget_context);
    assert_eq!(rub.source, BudgetSource::Text { position: 11 });
    assert_eq!(rub.formatted, "2 500 000 ₽");

    let summary = &result.structured_data;
    assert_eq!(summary.total_budgets, 2);
    assert_eq!(summary.largest_amount, Some(Decimal::from(2_500_000)));
    assert!(!summary.has_structured_pricing);
}

#[test]
fn test_empty_and_garbage_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path()));

    let empty = pipeline.extract(b"", "upload.pdf", true);
    assert!(!empty.success());
    assert_eq!(empty.text, "");
    assert!(empty.tables.is_empty());
    assert!(empty.budgets.is_empty());
    assert!(empty.metadata.error.is_some());

    let garbage = pipeline.extract(b"%PDF-1.4\n\x00\x01\x02 not really a pdf", "upload.pdf", true);
    assert!(!garbage.success());
    assert!(garbage.metadata.error.is_some());
    assert!(!garbage.metadata.warnings.is_empty());
}

#[test]
fn test_binary_upload_is_not_text() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path()));
    let scrambled: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(7919) % 256) as u8 ^ 0x3C).collect();

    let result = pipeline.extract(&scrambled, "upload.bin", true);

    assert!(!result.success());
    assert_eq!(result.text, "");
    assert!(result.methods_used().is_empty());
    assert_eq!(result.metadata.error.as_deref(), Some("unrecognized binary document"));
}

#[test]
fn test_huge_amounts_do_not_panic() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path()));

    let result = pipeline.extract(
        "Итого 70000000000000000000000000000 ₽ и 79000000000000000000000000000 ₽".as_bytes(),
        "big.txt",
        false,
    );

    assert!(result.success());
    assert_eq!(result.budgets.len(), 2);
    let rub = &result.structured_data.currency_breakdown[&CurrencyCode::Rub];
    assert_eq!(rub.count, 2);
    assert_eq!(rub.total_amount, Decimal::MAX);
}

#[test]
fn test_concurrent_extractions() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(Pipeline::new(config(dir.path())));

    let handles: Vec<_> = (1..=8u64)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                let text = format!("Бюджет этапа {}: {} 000 000 тенге", i, i);
                let result = pipeline.extract(text.as_bytes(), &format!("stage-{}.txt", i), true);
                (i, result)
            })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.join().unwrap();
        assert_eq!(result.budgets.len(), 1);
        assert_eq!(result.budgets[0].amount, Decimal::from(i * 1_000_000));
        assert_eq!(result.budgets[0].currency, CurrencyCode::Kzt);
    }

    let cached = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(cached, 8);
}
