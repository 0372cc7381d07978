//! Record processing and batch orchestration.
//!
//! [`RecordProcessor`] walks one record through the stage machine; it owns only
//! immutable stages and can be shared by any number of workers. [`Pipeline`] splits
//! a batch into committed sub-batches, fans each out to blocking workers, merges the
//! per-worker quality trackers and persists the results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, PipelineConfig};
use crate::domain::{RawTradeRecord, Security};
use crate::error::{FieldFailure, IngestError, Result};
use crate::observability::metrics;
use crate::pipeline::backfill::{BackfillOutcome, TradeBackfiller};
use crate::pipeline::processing::amount::AmountRangeParser;
use crate::pipeline::processing::enrich::{asset_type_from_label, Enricher, SecurityEnricher};
use crate::pipeline::processing::owner::OwnerNormalizer;
use crate::pipeline::processing::quality_gate::{DefaultQualityGate, QualityDecision, QualityGate};
use crate::pipeline::processing::text::clean_text;
use crate::pipeline::processing::ticker::TickerExtractor;
use crate::pipeline::processing::transaction::TransactionNormalizer;
use crate::pipeline::quality_metrics::{QualityMetricsTracker, QualityReport};
use crate::pipeline::record::{ProcessedRecord, RecordOutcome, ResolvedTrade};
use crate::pipeline::review::{ManualReviewGenerator, ManualReviewItem};
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::storage::{SecurityStore, TradeRepository};
use crate::reference::ReferenceData;

/// The per-record stage machine.
pub struct RecordProcessor {
    transactions: TransactionNormalizer,
    tickers: TickerExtractor,
    amounts: AmountRangeParser,
    owners: OwnerNormalizer,
    enricher: SecurityEnricher,
    gate: Box<dyn QualityGate + Send + Sync>,
}

impl RecordProcessor {
    pub fn new(reference: Arc<ReferenceData>, config: &Config) -> Self {
        Self {
            transactions: TransactionNormalizer::new(),
            tickers: TickerExtractor::new(Arc::clone(&reference)),
            amounts: AmountRangeParser::new(config.amount.snap_tolerance_ratio),
            owners: OwnerNormalizer::new(Arc::clone(&reference)),
            enricher: SecurityEnricher::new(reference),
            gate: Box::new(DefaultQualityGate::with_config(config.pipeline.quality_gate())),
        }
    }

    pub fn with_defaults(reference: Arc<ReferenceData>) -> Self {
        Self::new(reference, &Config::default())
    }

    /// Replace the VALIDATE stage's gate.
    pub fn with_gate(mut self, gate: Box<dyn QualityGate + Send + Sync>) -> Self {
        self.gate = gate;
        self
    }

    pub fn ticker_extractor(&self) -> &TickerExtractor {
        &self.tickers
    }

    pub fn enricher(&self) -> &SecurityEnricher {
        &self.enricher
    }

    /// Run one record to a terminal stage. Field stages are independent: a failure in
    /// one is recorded and the next stage still runs.
    pub fn process(&self, raw: &RawTradeRecord) -> RecordOutcome {
        let mut stage = PipelineStage::Init;

        stage = stage.next(true);
        let description = clean_text(&raw.asset_description);
        let transaction = self.transactions.normalize(
            raw.transaction_type.as_deref(),
            raw.transaction_date.as_deref(),
            raw.notification_date.as_deref(),
        );

        stage = stage.next(true);
        let ticker = self.tickers.extract(raw.ticker.as_deref(), &raw.asset_description);
        match ticker.source() {
            Some(source) => metrics::ticker::extracted(source.as_str(), ticker.confidence()),
            None => metrics::ticker::unresolved(),
        }

        stage = stage.next(true);
        let amount = self.amounts.parse(raw.amount.as_deref().unwrap_or_default());
        match amount.source() {
            Some(kind) => metrics::amount::parsed(kind.as_str(), amount.confidence()),
            None => metrics::amount::failed(),
        }

        stage = stage.next(true);
        let owner = self.owners.normalize(raw.owner.as_deref());
        metrics::owner::normalized(owner.source.as_str());
        if owner.misaligned {
            metrics::owner::misaligned();
        }

        stage = stage.next(true);
        let mut stub = Security::stub(ticker.value().map(String::as_str), &description);
        stub.asset_type = raw.asset_type.as_deref().and_then(asset_type_from_label);
        let security = self.enricher.enrich(&stub);
        for gap in &security.gaps {
            if let FieldFailure::EnrichmentGap { field } = gap {
                metrics::security::enrichment_gap(field);
            }
        }

        stage = stage.next(true);
        debug_assert_eq!(stage, PipelineStage::Validate);
        let mut record = ProcessedRecord {
            trade_id: raw.trade_id(),
            raw: raw.clone(),
            description,
            transaction,
            ticker,
            amount,
            owner,
            security,
            stage,
        };

        let assessment = self.gate.assess(&record);
        let passed = assessment.decision == QualityDecision::Resolved;
        record.stage = record.stage.next(passed);

        let trade = if passed { ResolvedTrade::from_processed(&record) } else { None };
        match trade {
            Some(trade) => {
                metrics::records::resolved();
                RecordOutcome::Resolved { trade, record }
            }
            None => {
                metrics::records::needs_review();
                record.stage = PipelineStage::NeedsReview;
                debug!(
                    "Record {}#{} held for review: {} blocking issue(s)",
                    record.raw.source_id,
                    record.raw.row_number,
                    assessment.blocking_issues().count()
                );
                RecordOutcome::NeedsReview { record, assessment }
            }
        }
    }
}

/// Result of one batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub resolved: Vec<ResolvedTrade>,
    pub review_items: Vec<ManualReviewItem>,
    pub quality: QualityReport,
    pub committed_sub_batches: usize,
    pub records_processed: usize,
    /// Set when the run stopped early; everything counted above was committed
    pub cancelled: bool,
}

pub struct Pipeline {
    processor: Arc<RecordProcessor>,
    securities: Arc<dyn SecurityStore>,
    trades: Arc<dyn TradeRepository>,
    config: PipelineConfig,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        processor: Arc<RecordProcessor>,
        securities: Arc<dyn SecurityStore>,
        trades: Arc<dyn TradeRepository>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            processor,
            securities,
            trades,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancellation_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Stop before the next sub-batch. The sub-batch in flight still commits.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn run_batch(&self, records: Vec<RawTradeRecord>) -> Result<BatchReport> {
        let inserted = self
            .processor
            .enricher()
            .register_reference_rows(self.securities.as_ref())
            .await?;
        metrics::security::reference_rows_inserted(inserted.total() as u64);

        let sub_batch_size = self.config.commit_batch_size.max(1);
        let mut tracker = QualityMetricsTracker::new();
        let mut resolved = Vec::new();
        let mut held = Vec::new();
        let mut committed_sub_batches = 0;
        let mut records_processed = 0;
        let mut cancelled = false;

        for sub_batch in records.chunks(sub_batch_size) {
            if self.cancelled.load(Ordering::SeqCst) {
                warn!(
                    "Batch cancelled after {} committed sub-batches ({} records)",
                    committed_sub_batches, records_processed
                );
                metrics::batch::cancelled();
                cancelled = true;
                break;
            }

            let started = Instant::now();
            let (outcomes, sub_tracker) = self.process_sub_batch(sub_batch).await?;
            let outcomes = self.persist_sub_batch(outcomes, committed_sub_batches).await?;

            committed_sub_batches += 1;
            records_processed += outcomes.len();
            tracker.merge(sub_tracker);
            metrics::batch::sub_batch_committed(outcomes.len(), started.elapsed().as_secs_f64());
            debug!("Committed sub-batch {} ({} records)", committed_sub_batches, outcomes.len());

            for outcome in outcomes {
                match outcome {
                    RecordOutcome::Resolved { trade, .. } => resolved.push(trade),
                    other => held.push(other),
                }
            }
        }

        let quality = tracker.finalize(self.config.review_top_n);
        let review_items = ManualReviewGenerator::new().generate(&held, &quality);
        for item in &review_items {
            metrics::review::items_generated(item.category.as_str(), 1);
        }
        metrics::records::processed(records_processed as u64);

        info!(
            "Batch finished: {} processed, {} resolved, {} for review, {} sub-batches committed",
            records_processed,
            resolved.len(),
            review_items.len(),
            committed_sub_batches
        );

        Ok(BatchReport {
            resolved,
            review_items,
            quality,
            committed_sub_batches,
            records_processed,
            cancelled,
        })
    }

    /// Link stored trades that have no security yet.
    pub async fn backfill(&self, reference: Arc<ReferenceData>) -> Result<BackfillOutcome> {
        TradeBackfiller::new(reference, self.config.name_similarity_threshold)
            .backfill(self.trades.as_ref(), self.securities.as_ref())
            .await
    }

    /// Fan one sub-batch out to blocking workers, each with its own tracker.
    /// Outcomes come back in input order.
    async fn process_sub_batch(
        &self,
        sub_batch: &[RawTradeRecord],
    ) -> Result<(Vec<RecordOutcome>, QualityMetricsTracker)> {
        let workers = self.config.workers.max(1);
        let chunk_size = sub_batch.len().div_ceil(workers).max(1);

        let handles: Vec<_> = sub_batch
            .chunks(chunk_size)
            .map(|chunk| {
                let processor = Arc::clone(&self.processor);
                let chunk = chunk.to_vec();
                tokio::task::spawn_blocking(move || {
                    let mut tracker = QualityMetricsTracker::new();
                    let outcomes: Vec<RecordOutcome> = chunk
                        .iter()
                        .map(|raw| {
                            let outcome = processor.process(raw);
                            tracker.record(&outcome);
                            outcome
                        })
                        .collect();
                    (outcomes, tracker)
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(sub_batch.len());
        let mut tracker = QualityMetricsTracker::new();
        for handle in handles {
            let (chunk_outcomes, chunk_tracker) = handle
                .await
                .map_err(|e| IngestError::Worker(e.to_string()))?;
            outcomes.extend(chunk_outcomes);
            tracker.merge(chunk_tracker);
        }
        Ok((outcomes, tracker))
    }

    /// Upsert securities for resolved trades, then commit every trade row in one call.
    async fn persist_sub_batch(
        &self,
        mut outcomes: Vec<RecordOutcome>,
        committed_sub_batches: usize,
    ) -> Result<Vec<RecordOutcome>> {
        let commit_error = |e: IngestError| IngestError::Commit {
            committed_sub_batches,
            message: e.to_string(),
        };

        let mut rows = Vec::with_capacity(outcomes.len());
        for outcome in outcomes.iter_mut() {
            let mut row = outcome.to_trade_row();
            if let RecordOutcome::Resolved { trade, .. } = outcome {
                let stored = self
                    .securities
                    .upsert_security(&trade.security)
                    .await
                    .map_err(commit_error)?;
                trade.security = stored;
                row.security_id = trade.security.id;
            }
            rows.push(row);
        }

        self.trades.commit_sub_batch(&rows).await.map_err(commit_error)?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetType, Exchange, OwnerCode, SectorStatus};
    use crate::pipeline::processing::amount::AmountMatch;
    use crate::pipeline::processing::ticker::TickerSource;
    use crate::pipeline::storage::InMemoryStore;

    fn create_test_processor() -> RecordProcessor {
        RecordProcessor::with_defaults(Arc::new(ReferenceData::builtin()))
    }

    fn create_test_pipeline(batch_size: usize) -> (Pipeline, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let config = PipelineConfig {
            commit_batch_size: batch_size,
            workers: 2,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(
            Arc::new(create_test_processor()),
            store.clone(),
            store.clone(),
            config,
        );
        (pipeline, store)
    }

    fn create_test_records() -> Vec<RawTradeRecord> {
        vec![
            RawTradeRecord::new("f", 1, "Apple Inc. (AAPL) [ST]")
                .with_amount("$1,001 - $15,000")
                .with_owner("SP")
                .with_transaction("P", "01/15/2024"),
            RawTradeRecord::new("f", 2, "Microsoft Corporation - Common Stock").with_amount("$15,001 - $50,000"),
            RawTradeRecord::new("f", 3, "Mystery holding").with_amount("$1,001 - $15,000"),
            RawTradeRecord::new("f", 4, "Tesla Inc (TSLA)").with_amount("gfedc"),
            RawTradeRecord::new("f", 5, "Apple Inc. (AAPL)")
                .with_amount("$1,001 - $15,000")
                .with_owner("Apple Inc"),
        ]
    }

    #[test]
    fn test_process_resolves_clean_record() {
        let outcome = create_test_processor().process(&create_test_records()[0]);
        let RecordOutcome::Resolved { trade, record } = outcome else {
            panic!("expected a resolved record");
        };
        assert_eq!(record.stage, PipelineStage::Resolved);
        assert_eq!(trade.ticker, "AAPL");
        assert_eq!(trade.amount_min, 100_100);
        assert_eq!(trade.amount_max, Some(1_500_000));
        assert_eq!(trade.owner_code, OwnerCode::Spouse);
        assert_eq!(trade.security.asset_type, Some(AssetType::Stock));
        assert_eq!(trade.security.exchange, Some(Exchange::Nasdaq));
        assert_eq!(trade.sector_status, SectorStatus::Known);
        assert!(trade.transaction_date.is_some());
    }

    #[test]
    fn test_failed_ticker_does_not_block_amount() {
        let outcome = create_test_processor().process(&create_test_records()[2]);
        let record = outcome.record();
        assert!(!outcome.is_resolved());
        assert_eq!(record.stage, PipelineStage::NeedsReview);
        assert!(!record.ticker.is_resolved());
        assert_eq!(record.amount.confidence(), 1.0);
    }

    #[test]
    fn test_misaligned_owner_holds_record_with_partial_results() {
        let outcome = create_test_processor().process(&create_test_records()[4]);
        let record = outcome.record();
        assert!(!outcome.is_resolved());
        assert_eq!(record.ticker_value(), Some("AAPL"));
        assert!(record.amount.is_resolved());
        assert!(record.owner.misaligned);
    }

    #[test]
    fn test_open_ended_amount_passes_gate() {
        let raw = RawTradeRecord::new("f", 6, "Tesla Inc (TSLA)").with_amount("$50,000,001+");
        let RecordOutcome::Resolved { trade, record } = create_test_processor().process(&raw) else {
            panic!("expected a resolved record");
        };
        assert_eq!(record.amount.source(), Some(AmountMatch::OpenEnded));
        assert_eq!(trade.ticker, "TSLA");
        assert_eq!(trade.amount_min, 5_000_000_100);
        assert_eq!(trade.amount_max, None);
    }

    #[test]
    fn test_foreign_legal_form_is_not_resolved_as_ticker() {
        let raw = RawTradeRecord::new("f", 7, "Nestle SA").with_amount("$1,001 - $15,000");
        let outcome = create_test_processor().process(&raw);
        assert_eq!(outcome.record().ticker_value(), Some("NSRGY"));
        assert_eq!(outcome.record().ticker.source(), Some(TickerSource::CompanyName));
    }

    #[tokio::test]
    async fn test_run_batch_accounts_for_every_record() {
        let (pipeline, store) = create_test_pipeline(2);
        let records = create_test_records();
        let report = pipeline.run_batch(records.clone()).await.unwrap();

        assert_eq!(report.records_processed, records.len());
        assert_eq!(report.resolved.len() + report.review_items.len(), records.len());
        assert_eq!(report.committed_sub_batches, 3);
        assert!(!report.cancelled);
        assert_eq!(report.quality.total_records, records.len() as u64);
        assert_eq!(store.count_trades().await.unwrap(), records.len());

        for trade in &report.resolved {
            let row = store.get_trade(trade.trade_id).await.unwrap().unwrap();
            assert!(row.security_id.is_some());
            assert_eq!(row.security_id, trade.security.id);
        }
    }

    #[tokio::test]
    async fn test_rerun_upserts_without_duplicates() {
        let (pipeline, store) = create_test_pipeline(10);
        pipeline.run_batch(create_test_records()).await.unwrap();
        let securities = store.security_count().unwrap();

        pipeline.run_batch(create_test_records()).await.unwrap();
        assert_eq!(store.count_trades().await.unwrap(), 5);
        assert_eq!(store.security_count().unwrap(), securities);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_commits_nothing() {
        let (pipeline, store) = create_test_pipeline(2);
        pipeline.cancel();
        let report = pipeline.run_batch(create_test_records()).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.committed_sub_batches, 0);
        assert_eq!(report.records_processed, 0);
        assert_eq!(store.count_trades().await.unwrap(), 0);
    }
}
