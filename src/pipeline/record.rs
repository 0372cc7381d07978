//! Per-record results carried between the stages and out of the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{OwnerCode, RawTradeRecord, SectorStatus, Security, TransactionType};
use crate::pipeline::processing::amount::{AmountBucket, AmountParse};
use crate::pipeline::processing::enrich::EnrichedSecurity;
use crate::pipeline::processing::owner::OwnerNormalization;
use crate::pipeline::processing::quality_gate::QualityAssessment;
use crate::pipeline::processing::ticker::TickerExtraction;
use crate::pipeline::processing::transaction::TransactionDetails;
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::storage::{TradeRow, TradeStatus};

/// Every stage result for one raw record. Stages attach results; none is overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub trade_id: Uuid,
    pub raw: RawTradeRecord,
    /// Description after cleanup; the text the stages worked on
    pub description: String,
    pub transaction: TransactionDetails,
    pub ticker: TickerExtraction,
    pub amount: AmountParse,
    pub owner: OwnerNormalization,
    pub security: EnrichedSecurity,
    pub stage: PipelineStage,
}

impl ProcessedRecord {
    pub fn ticker_value(&self) -> Option<&str> {
        self.ticker.value().map(String::as_str)
    }

    /// Persisted form, whatever the outcome.
    pub fn to_trade_row(&self, status: TradeStatus) -> TradeRow {
        let amount = self.amount.value();
        TradeRow {
            trade_id: self.trade_id,
            source_id: self.raw.source_id.clone(),
            row_number: self.raw.row_number,
            status,
            asset_description: self.description.clone(),
            ticker: self.ticker.value().cloned(),
            ticker_confidence: self.ticker.confidence(),
            amount_min: amount.map(|a| a.amount_min),
            amount_max: amount.and_then(|a| a.amount_max),
            amount_exact: amount.and_then(|a| a.amount_exact),
            amount_confidence: self.amount.confidence(),
            owner_code: self.owner.owner_code,
            owner_confidence: self.owner.confidence,
            misaligned: self.owner.misaligned,
            transaction_type: self.transaction.transaction_type,
            transaction_date: self.transaction.transaction_date,
            security_id: None,
        }
    }
}

/// A record that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrade {
    pub trade_id: Uuid,
    pub source_id: String,
    pub row_number: u64,
    pub ticker: String,
    pub ticker_confidence: f64,
    /// Integer cents
    pub amount_min: i64,
    pub amount_max: Option<i64>,
    pub amount_exact: Option<i64>,
    pub bucket: Option<AmountBucket>,
    pub amount_confidence: f64,
    pub owner_code: OwnerCode,
    pub owner_confidence: f64,
    pub transaction_type: Option<TransactionType>,
    pub transaction_date: Option<NaiveDate>,
    pub notification_date: Option<NaiveDate>,
    pub security: Security,
    pub sector_status: SectorStatus,
}

impl ResolvedTrade {
    /// `None` when the record does not carry both a ticker and an amount.
    pub fn from_processed(record: &ProcessedRecord) -> Option<Self> {
        let ticker = record.ticker.value()?.clone();
        let amount = record.amount.value()?;
        Some(Self {
            trade_id: record.trade_id,
            source_id: record.raw.source_id.clone(),
            row_number: record.raw.row_number,
            ticker,
            ticker_confidence: record.ticker.confidence(),
            amount_min: amount.amount_min,
            amount_max: amount.amount_max,
            amount_exact: amount.amount_exact,
            bucket: amount.bucket,
            amount_confidence: record.amount.confidence(),
            owner_code: record.owner.owner_code,
            owner_confidence: record.owner.confidence,
            transaction_type: record.transaction.transaction_type,
            transaction_date: record.transaction.transaction_date,
            notification_date: record.transaction.notification_date,
            security: record.security.security.clone(),
            sector_status: record.security.sector_status,
        })
    }
}

/// Terminal result for one raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Resolved {
        trade: ResolvedTrade,
        record: ProcessedRecord,
    },
    NeedsReview {
        record: ProcessedRecord,
        assessment: QualityAssessment,
    },
}

impl RecordOutcome {
    pub fn record(&self) -> &ProcessedRecord {
        match self {
            RecordOutcome::Resolved { record, .. } => record,
            RecordOutcome::NeedsReview { record, .. } => record,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, RecordOutcome::Resolved { .. })
    }

    pub fn to_trade_row(&self) -> TradeRow {
        match self {
            RecordOutcome::Resolved { record, .. } => record.to_trade_row(TradeStatus::Resolved),
            RecordOutcome::NeedsReview { record, .. } => record.to_trade_row(TradeStatus::NeedsReview),
        }
    }
}
