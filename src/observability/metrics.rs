//! Metric catalog and recording functions for the data-quality pipeline.
//!
//! Recording goes through the `metrics` facade; until a recorder is installed
//! with [`init`] every call is a no-op, which is what library users and tests get.

use std::fmt;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::{IngestError, Result};

/// Every metric the crate emits. Names carry the `dq_` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Records
    RecordsProcessed,
    RecordsResolved,
    RecordsNeedsReview,

    // Ticker extraction
    TickerExtracted,
    TickerUnresolved,
    TickerConfidence,

    // Amount parsing
    AmountParsed,
    AmountFailed,
    AmountConfidence,

    // Owner normalization
    OwnerNormalized,
    OwnerMisaligned,

    // Security enrichment
    SecurityEnrichmentGaps,
    ReferenceRowsInserted,

    // Batches
    SubBatchesCommitted,
    SubBatchDuration,
    SubBatchSize,
    BatchesCancelled,

    // Backfill and review
    BackfillLinked,
    BackfillUnresolved,
    ReviewItemsGenerated,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RecordsProcessed => "dq_records_processed_total",
            MetricName::RecordsResolved => "dq_records_resolved_total",
            MetricName::RecordsNeedsReview => "dq_records_needs_review_total",

            MetricName::TickerExtracted => "dq_ticker_extracted_total",
            MetricName::TickerUnresolved => "dq_ticker_unresolved_total",
            MetricName::TickerConfidence => "dq_ticker_confidence",

            MetricName::AmountParsed => "dq_amount_parsed_total",
            MetricName::AmountFailed => "dq_amount_failed_total",
            MetricName::AmountConfidence => "dq_amount_confidence",

            MetricName::OwnerNormalized => "dq_owner_normalized_total",
            MetricName::OwnerMisaligned => "dq_owner_misaligned_total",

            MetricName::SecurityEnrichmentGaps => "dq_security_enrichment_gaps_total",
            MetricName::ReferenceRowsInserted => "dq_reference_rows_inserted_total",

            MetricName::SubBatchesCommitted => "dq_sub_batches_committed_total",
            MetricName::SubBatchDuration => "dq_sub_batch_duration_seconds",
            MetricName::SubBatchSize => "dq_sub_batch_size",
            MetricName::BatchesCancelled => "dq_batches_cancelled_total",

            MetricName::BackfillLinked => "dq_backfill_linked_total",
            MetricName::BackfillUnresolved => "dq_backfill_unresolved_total",
            MetricName::ReviewItemsGenerated => "dq_review_items_generated_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            RecordsProcessed,
            RecordsResolved,
            RecordsNeedsReview,
            TickerExtracted,
            TickerUnresolved,
            TickerConfidence,
            AmountParsed,
            AmountFailed,
            AmountConfidence,
            OwnerNormalized,
            OwnerMisaligned,
            SecurityEnrichmentGaps,
            ReferenceRowsInserted,
            SubBatchesCommitted,
            SubBatchDuration,
            SubBatchSize,
            BatchesCancelled,
            BackfillLinked,
            BackfillUnresolved,
            ReviewItemsGenerated,
        ]
        .into_iter()
    }

    /// (phase, description)
    pub fn metadata(&self) -> (&'static str, &'static str) {
        match self {
            MetricName::RecordsProcessed => ("records", "Raw records processed"),
            MetricName::RecordsResolved => ("records", "Records resolved into trades"),
            MetricName::RecordsNeedsReview => ("records", "Records routed to manual review"),
            MetricName::TickerExtracted => ("ticker", "Tickers extracted, by strategy"),
            MetricName::TickerUnresolved => ("ticker", "Records with no resolvable ticker"),
            MetricName::TickerConfidence => ("ticker", "Ticker confidence distribution"),
            MetricName::AmountParsed => ("amount", "Amounts parsed, by match kind"),
            MetricName::AmountFailed => ("amount", "Amounts with no recoverable value"),
            MetricName::AmountConfidence => ("amount", "Amount confidence distribution"),
            MetricName::OwnerNormalized => ("owner", "Owner values normalized, by match kind"),
            MetricName::OwnerMisaligned => ("owner", "Owner values flagged as column shifts"),
            MetricName::SecurityEnrichmentGaps => ("security", "Unresolved security fields, by field"),
            MetricName::ReferenceRowsInserted => ("security", "Reference rows created"),
            MetricName::SubBatchesCommitted => ("batch", "Sub-batches committed"),
            MetricName::SubBatchDuration => ("batch", "Sub-batch processing duration"),
            MetricName::SubBatchSize => ("batch", "Sub-batch size"),
            MetricName::BatchesCancelled => ("batch", "Batches stopped by cancellation"),
            MetricName::BackfillLinked => ("backfill", "Trades linked to a security"),
            MetricName::BackfillUnresolved => ("backfill", "Trades left without a security"),
            MetricName::ReviewItemsGenerated => ("review", "Manual review items generated"),
        }
    }
}

/// Install the Prometheus recorder. The handle renders the exposition text.
pub fn init() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| IngestError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

pub mod records {
    use super::MetricName;

    pub fn processed(count: u64) {
        ::metrics::counter!(MetricName::RecordsProcessed.as_str()).increment(count);
    }

    pub fn resolved() {
        ::metrics::counter!(MetricName::RecordsResolved.as_str()).increment(1);
    }

    pub fn needs_review() {
        ::metrics::counter!(MetricName::RecordsNeedsReview.as_str()).increment(1);
    }
}

pub mod ticker {
    use super::MetricName;

    pub fn extracted(strategy: &'static str, confidence: f64) {
        ::metrics::counter!(MetricName::TickerExtracted.as_str(), "strategy" => strategy).increment(1);
        ::metrics::histogram!(MetricName::TickerConfidence.as_str()).record(confidence);
    }

    pub fn unresolved() {
        ::metrics::counter!(MetricName::TickerUnresolved.as_str()).increment(1);
        ::metrics::histogram!(MetricName::TickerConfidence.as_str()).record(0.0);
    }
}

pub mod amount {
    use super::MetricName;

    pub fn parsed(kind: &'static str, confidence: f64) {
        ::metrics::counter!(MetricName::AmountParsed.as_str(), "match" => kind).increment(1);
        ::metrics::histogram!(MetricName::AmountConfidence.as_str()).record(confidence);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::AmountFailed.as_str()).increment(1);
        ::metrics::histogram!(MetricName::AmountConfidence.as_str()).record(0.0);
    }
}

pub mod owner {
    use super::MetricName;

    pub fn normalized(kind: &'static str) {
        ::metrics::counter!(MetricName::OwnerNormalized.as_str(), "match" => kind).increment(1);
    }

    pub fn misaligned() {
        ::metrics::counter!(MetricName::OwnerMisaligned.as_str()).increment(1);
    }
}

pub mod security {
    use super::MetricName;

    pub fn enrichment_gap(field: &str) {
        ::metrics::counter!(MetricName::SecurityEnrichmentGaps.as_str(), "field" => field.to_string()).increment(1);
    }

    pub fn reference_rows_inserted(count: u64) {
        ::metrics::counter!(MetricName::ReferenceRowsInserted.as_str()).increment(count);
    }
}

pub mod batch {
    use super::MetricName;

    pub fn sub_batch_committed(size: usize, secs: f64) {
        ::metrics::counter!(MetricName::SubBatchesCommitted.as_str()).increment(1);
        ::metrics::histogram!(MetricName::SubBatchDuration.as_str()).record(secs);
        ::metrics::histogram!(MetricName::SubBatchSize.as_str()).record(size as f64);
    }

    pub fn cancelled() {
        ::metrics::counter!(MetricName::BatchesCancelled.as_str()).increment(1);
    }
}

pub mod backfill {
    use super::MetricName;

    pub fn linked(strategy: &'static str) {
        ::metrics::counter!(MetricName::BackfillLinked.as_str(), "strategy" => strategy).increment(1);
    }

    pub fn unresolved(count: u64) {
        ::metrics::counter!(MetricName::BackfillUnresolved.as_str()).increment(count);
    }
}

pub mod review {
    use super::MetricName;

    pub fn items_generated(category: &'static str, count: u64) {
        ::metrics::counter!(MetricName::ReviewItemsGenerated.as_str(), "category" => category).increment(count);
    }
}
