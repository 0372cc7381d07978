use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use disclosure_quality::app::export_use_case::ExportBatchUseCase;
use disclosure_quality::config::{Config, PipelineConfig};
use disclosure_quality::domain::{RawTradeRecord, SectorStatus};
use disclosure_quality::error::{IngestError, Result};
use disclosure_quality::infra::file_output_adapter::{QUALITY_REPORT_FILE, RESOLVED_TRADES_FILE, REVIEW_ROWS_FILE};
use disclosure_quality::infra::FileBatchOutputAdapter;
use disclosure_quality::pipeline::storage::{InMemoryStore, TradeRepository, TradeRow};
use disclosure_quality::pipeline::{Pipeline, RecordProcessor};
use disclosure_quality::reference::ReferenceData;

fn create_test_records() -> Vec<RawTradeRecord> {
    vec![
        RawTradeRecord::new("ptr-1", 1, "Apple Inc. (AAPL) [ST]")
            .with_amount("$1,001 - $15,000")
            .with_owner("SP")
            .with_transaction("P", "01/15/2024"),
        RawTradeRecord::new("ptr-1", 2, "Exxon Mobil Corporation (XOM)")
            .with_amount("$15,001 - $50,000 gfedc")
            .with_owner("JOINT"),
        RawTradeRecord::new("ptr-1", 3, "EXXON MOBIL CORP").with_amount("gfedc"),
        RawTradeRecord::new("ptr-1", 4, "Mystery holding").with_amount("$1,001 - $15,000"),
        RawTradeRecord::new("ptr-1", 5, "Tesla Inc (TSLA)")
            .with_amount("$50,000,001+")
            .with_owner("Apple Inc"),
        RawTradeRecord::new("ptr-1", 6, "U.S. Treasury Bill [GS]")
            .with_ticker("")
            .with_amount("$100,001 - $250,000"),
        RawTradeRecord::new("ptr-1", 7, "Microsoft Corp - Common Stock")
            .with_ticker("MSFT")
            .with_amount("$250,001 - $500,000")
            .with_owner("self"),
    ]
}

fn create_test_pipeline(
    trades: Arc<dyn TradeRepository>,
    store: Arc<InMemoryStore>,
    batch_size: usize,
) -> Pipeline {
    let processor = Arc::new(RecordProcessor::with_defaults(Arc::new(ReferenceData::builtin())));
    let config = PipelineConfig {
        commit_batch_size: batch_size,
        workers: 3,
        ..PipelineConfig::default()
    };
    Pipeline::new(processor, store, trades, config)
}

/// Delegates to the in-memory store and raises the cancel flag after the first commit.
struct CancelAfterFirstCommit {
    inner: Arc<InMemoryStore>,
    flag: Arc<AtomicBool>,
}

#[async_trait]
impl TradeRepository for CancelAfterFirstCommit {
    async fn commit_sub_batch(&self, trades: &[TradeRow]) -> Result<usize> {
        let created = self.inner.commit_sub_batch(trades).await?;
        self.flag.store(true, Ordering::SeqCst);
        Ok(created)
    }

    async fn get_trade(&self, trade_id: Uuid) -> Result<Option<TradeRow>> {
        self.inner.get_trade(trade_id).await
    }

    async fn unlinked_trades(&self) -> Result<Vec<TradeRow>> {
        self.inner.unlinked_trades().await
    }

    async fn link_security(&self, trade_id: Uuid, security_id: Uuid) -> Result<bool> {
        self.inner.link_security(trade_id, security_id).await
    }

    async fn count_trades(&self) -> Result<usize> {
        self.inner.count_trades().await
    }
}

/// Fails every commit after the first.
struct FailAfterFirstCommit {
    inner: Arc<InMemoryStore>,
    commits: AtomicUsize,
}

#[async_trait]
impl TradeRepository for FailAfterFirstCommit {
    async fn commit_sub_batch(&self, trades: &[TradeRow]) -> Result<usize> {
        if self.commits.fetch_add(1, Ordering::SeqCst) >= 1 {
            return Err(IngestError::storage("connection reset"));
        }
        self.inner.commit_sub_batch(trades).await
    }

    async fn get_trade(&self, trade_id: Uuid) -> Result<Option<TradeRow>> {
        self.inner.get_trade(trade_id).await
    }

    async fn unlinked_trades(&self) -> Result<Vec<TradeRow>> {
        self.inner.unlinked_trades().await
    }

    async fn link_security(&self, trade_id: Uuid, security_id: Uuid) -> Result<bool> {
        self.inner.link_security(trade_id, security_id).await
    }

    async fn count_trades(&self) -> Result<usize> {
        self.inner.count_trades().await
    }
}

#[tokio::test]
async fn test_every_record_is_resolved_or_reviewed() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = create_test_pipeline(store.clone(), store.clone(), 3);
    let records = create_test_records();

    let report = pipeline.run_batch(records.clone()).await.unwrap();

    assert_eq!(report.resolved.len() + report.review_items.len(), records.len());
    assert_eq!(report.records_processed, records.len());
    assert_eq!(report.committed_sub_batches, 3);
    assert_eq!(store.count_trades().await.unwrap(), records.len());

    let quality = &report.quality;
    assert_eq!(quality.total_records, records.len() as u64);
    assert_eq!(quality.resolved_records as usize, report.resolved.len());
    assert_eq!(quality.needs_review_records as usize, report.review_items.len());

    // Rates recount from the persisted rows
    let rows = store.all_trades().unwrap();
    let total = rows.len() as f64;
    let tickers = rows.iter().filter(|r| r.ticker.is_some()).count() as f64;
    let amounts = rows.iter().filter(|r| r.amount_min.is_some()).count() as f64;
    let owners = rows.iter().filter(|r| !r.misaligned).count() as f64;
    assert_eq!(quality.ticker_extraction_rate, tickers / total);
    assert_eq!(quality.amount_parsing_rate, amounts / total);
    assert_eq!(quality.owner_normalization_rate, owners / total);

    for item in &report.review_items {
        assert_eq!(item.confidence, 0.0);
        assert!(item.frequency >= 1);
    }
    for window in report.review_items.windows(2) {
        assert!(window[0].frequency >= window[1].frequency);
    }
}

#[tokio::test]
async fn test_resolved_values_and_sector_status() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = create_test_pipeline(store.clone(), store.clone(), 500);
    let report = pipeline.run_batch(create_test_records()).await.unwrap();

    let apple = report.resolved.iter().find(|t| t.ticker == "AAPL").unwrap();
    assert_eq!((apple.amount_min, apple.amount_max), (100_100, Some(1_500_000)));
    assert_eq!(apple.sector_status, SectorStatus::Known);

    let exxon = report.resolved.iter().find(|t| t.ticker == "XOM").unwrap();
    assert_eq!((exxon.amount_min, exxon.amount_max), (1_500_100, Some(5_000_000)));

    let msft = report.resolved.iter().find(|t| t.ticker == "MSFT").unwrap();
    assert_eq!(msft.owner_code.as_code(), "C");

    // Open-ended amounts meet the threshold; the misaligned owner alone holds this row
    assert!(report.resolved.iter().all(|t| t.ticker != "TSLA"));
}

#[tokio::test]
async fn test_backfill_links_then_converges() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = create_test_pipeline(store.clone(), store.clone(), 4);
    pipeline.run_batch(create_test_records()).await.unwrap();
    let reference = Arc::new(ReferenceData::builtin());

    let unlinked_before = store.unlinked_trades().await.unwrap().len();
    let first = pipeline.backfill(Arc::clone(&reference)).await.unwrap();
    assert!(first.trades_linked >= 1);
    assert_eq!(first.trades_linked + first.trades_unresolved, unlinked_before);

    // Held for its amount, but its ticker matches the security a resolved row created
    let exxon_row = create_test_records()[2].trade_id();
    let linked = store.get_trade(exxon_row).await.unwrap().unwrap();
    assert!(linked.security_id.is_some());

    let second = pipeline.backfill(reference).await.unwrap();
    assert_eq!(second.trades_linked, 0);
    assert_eq!(second.trades_unresolved, first.trades_unresolved);
}

#[tokio::test]
async fn test_cancellation_keeps_committed_sub_batches() {
    let store = Arc::new(InMemoryStore::new());
    let flag = Arc::new(AtomicBool::new(false));
    let trades = Arc::new(CancelAfterFirstCommit {
        inner: store.clone(),
        flag: flag.clone(),
    });
    let pipeline = create_test_pipeline(trades, store.clone(), 2).with_cancellation_flag(flag);

    let report = pipeline.run_batch(create_test_records()).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.committed_sub_batches, 1);
    assert_eq!(report.records_processed, 2);
    assert_eq!(report.resolved.len() + report.review_items.len(), 2);
    assert_eq!(store.count_trades().await.unwrap(), 2);

    // Re-running the whole batch fills in the rest without duplicating
    let rerun = create_test_pipeline(store.clone(), store.clone(), 2);
    let report = rerun.run_batch(create_test_records()).await.unwrap();
    assert!(!report.cancelled);
    assert_eq!(store.count_trades().await.unwrap(), 7);
}

#[tokio::test]
async fn test_commit_failure_reports_committed_sub_batches() {
    let store = Arc::new(InMemoryStore::new());
    let trades = Arc::new(FailAfterFirstCommit {
        inner: store.clone(),
        commits: AtomicUsize::new(0),
    });
    let pipeline = create_test_pipeline(trades, store.clone(), 3);

    let err = pipeline.run_batch(create_test_records()).await.unwrap_err();
    match err {
        IngestError::Commit { committed_sub_batches, .. } => assert_eq!(committed_sub_batches, 1),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.count_trades().await.unwrap(), 3);
}

#[tokio::test]
async fn test_reference_file_extends_company_table() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
company_tickers = [{{ name = "Qxyzzy Widgets", ticker = "QXYZ" }}]
ticker_sectors = {{ QXYZ = "Industrials" }}
"#
    )
    .unwrap();

    let mut config = Config::default();
    config.reference.path = Some(file.path().to_path_buf());
    let reference = Arc::new(ReferenceData::load(file.path()).unwrap());
    let processor = Arc::new(RecordProcessor::new(reference, &config));
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(processor, store.clone(), store.clone(), config.pipeline.clone());

    let raw = RawTradeRecord::new("ptr-2", 1, "Qxyzzy Widgets Inc common stock").with_amount("$1,001 - $15,000");
    let report = pipeline.run_batch(vec![raw]).await.unwrap();
    assert_eq!(report.resolved.len(), 1);
    assert_eq!(report.resolved[0].ticker, "QXYZ");
    assert_eq!(report.resolved[0].security.sector.as_deref(), Some("Industrials"));
}

#[tokio::test]
async fn test_export_writes_review_rows_and_report() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = create_test_pipeline(store.clone(), store.clone(), 500);
    let report = pipeline.run_batch(create_test_records()).await.unwrap();
    let backfill = pipeline.backfill(Arc::new(ReferenceData::builtin())).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let export = ExportBatchUseCase::new(Box::new(FileBatchOutputAdapter::new(dir.path()).unwrap()));
    let summary = export.export(&report, Some(&backfill)).await.unwrap();

    assert_eq!(summary.resolved_trades, report.resolved.len());
    assert!(summary.review_rows >= report.review_items.len());

    let resolved = std::fs::read_to_string(dir.path().join(RESOLVED_TRADES_FILE)).unwrap();
    assert_eq!(resolved.lines().count(), report.resolved.len());
    let review = std::fs::read_to_string(dir.path().join(REVIEW_ROWS_FILE)).unwrap();
    assert_eq!(review.lines().count(), summary.review_rows);
    assert!(dir.path().join(QUALITY_REPORT_FILE).exists());
}
