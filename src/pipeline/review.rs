//! Manual review items: one per record held at VALIDATE, plus one per trade the
//! backfill could not link, prioritized for a human reviewer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::pipeline::processing::quality_gate::QualityField;
use crate::pipeline::processing::text::clean_text;
use crate::pipeline::quality_metrics::QualityReport;
use crate::pipeline::record::RecordOutcome;
use crate::pipeline::storage::TradeRow;

/// Review category; declaration order is the priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewCategory {
    Ticker,
    Amount,
    Owner,
    Security,
}

impl ReviewCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewCategory::Ticker => "ticker",
            ReviewCategory::Amount => "amount",
            ReviewCategory::Owner => "owner",
            ReviewCategory::Security => "security",
        }
    }

    fn from_field(field: QualityField) -> Option<Self> {
        match field {
            QualityField::Ticker => Some(ReviewCategory::Ticker),
            QualityField::Amount => Some(ReviewCategory::Amount),
            QualityField::Owner => Some(ReviewCategory::Owner),
            QualityField::Security => Some(ReviewCategory::Security),
            QualityField::Transaction => None,
        }
    }

    fn field(&self) -> QualityField {
        match self {
            ReviewCategory::Ticker => QualityField::Ticker,
            ReviewCategory::Amount => QualityField::Amount,
            ReviewCategory::Owner => QualityField::Owner,
            ReviewCategory::Security => QualityField::Security,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewItem {
    /// SHA-256 of category and grouping key; equal across batches for the same problem
    pub fingerprint: String,
    pub category: ReviewCategory,
    pub description: String,
    /// The raw input, for reproducing the case
    pub raw_data: serde_json::Value,
    pub suggested_fix: String,
    /// Always zero; the item exists because nothing was trusted
    pub confidence: f64,
    /// Occurrences of the same grouping key in the batch
    pub frequency: u64,
    pub source_id: String,
    pub row_number: u64,
    pub trade_id: Uuid,
    /// Lower-priority categories that also blocked the record
    pub other_issues: Vec<ReviewCategory>,
    #[serde(skip)]
    group_key: String,
}

impl ManualReviewItem {
    pub fn group_key(&self) -> &str {
        &self.group_key
    }
}

/// Flat export row for review tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRow {
    pub fingerprint: String,
    pub category: String,
    pub description: String,
    pub suggested_fix: String,
    pub confidence: f64,
    pub frequency: u64,
    pub source_id: String,
    pub row_number: u64,
    pub trade_id: String,
    pub other_issues: String,
    /// JSON text of the raw record
    pub raw_data: String,
}

impl From<&ManualReviewItem> for ReviewRow {
    fn from(item: &ManualReviewItem) -> Self {
        ReviewRow {
            fingerprint: item.fingerprint.clone(),
            category: item.category.as_str().to_string(),
            description: item.description.clone(),
            suggested_fix: item.suggested_fix.clone(),
            confidence: item.confidence,
            frequency: item.frequency,
            source_id: item.source_id.clone(),
            row_number: item.row_number,
            trade_id: item.trade_id.to_string(),
            other_issues: item
                .other_issues
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(";"),
            raw_data: item.raw_data.to_string(),
        }
    }
}

pub fn to_rows(items: &[ManualReviewItem]) -> Vec<ReviewRow> {
    items.iter().map(ReviewRow::from).collect()
}

pub fn fingerprint(category: ReviewCategory, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Highest frequency first, then category priority, then input order.
pub fn sort_items(items: &mut [ManualReviewItem]) {
    items.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then(a.category.cmp(&b.category))
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then(a.row_number.cmp(&b.row_number))
    });
}

#[derive(Debug, Clone, Default)]
pub struct ManualReviewGenerator;

impl ManualReviewGenerator {
    pub fn new() -> Self {
        Self
    }

    /// One item per record held for review, ordered for reviewers.
    pub fn generate(&self, outcomes: &[RecordOutcome], report: &QualityReport) -> Vec<ManualReviewItem> {
        let mut items: Vec<ManualReviewItem> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                RecordOutcome::NeedsReview { assessment, .. } => {
                    let mut categories: Vec<ReviewCategory> = assessment
                        .blocking_issues()
                        .filter_map(|issue| ReviewCategory::from_field(issue.field))
                        .collect();
                    categories.sort();
                    categories.dedup();
                    let category = categories.first().copied().unwrap_or(ReviewCategory::Security);
                    let others = categories.into_iter().skip(1).collect();
                    Some(self.item_for_record(outcome, category, others))
                }
                RecordOutcome::Resolved { .. } => None,
            })
            .collect();

        apply_frequencies(&mut items, |item| {
            report.group_frequency(item.category.field(), &item.group_key)
        });
        sort_items(&mut items);
        items
    }

    /// Items for trades that backfill left without a security.
    pub fn for_unlinked_trades(&self, trades: &[TradeRow]) -> Vec<ManualReviewItem> {
        let mut items: Vec<ManualReviewItem> = trades
            .iter()
            .map(|trade| {
                let key = trade
                    .ticker
                    .clone()
                    .unwrap_or_else(|| trade.asset_description.clone());
                let description = match &trade.ticker {
                    Some(ticker) => format!("No stored security matches ticker '{}'", ticker),
                    None => format!("No stored security matches '{}'", trade.asset_description),
                };
                ManualReviewItem {
                    fingerprint: fingerprint(ReviewCategory::Security, &key),
                    category: ReviewCategory::Security,
                    description,
                    raw_data: serde_json::to_value(trade).unwrap_or(serde_json::Value::Null),
                    suggested_fix: format!(
                        "Create the security for '{}' or correct the trade's ticker, then re-run backfill",
                        key
                    ),
                    confidence: 0.0,
                    frequency: 1,
                    source_id: trade.source_id.clone(),
                    row_number: trade.row_number,
                    trade_id: trade.trade_id,
                    other_issues: Vec::new(),
                    group_key: key,
                }
            })
            .collect();

        apply_frequencies(&mut items, |_| 0);
        sort_items(&mut items);
        items
    }

    fn item_for_record(
        &self,
        outcome: &RecordOutcome,
        category: ReviewCategory,
        other_issues: Vec<ReviewCategory>,
    ) -> ManualReviewItem {
        let record = outcome.record();
        let raw_amount = record.raw.amount.as_deref().map(clean_text).unwrap_or_default();

        let (key, description, suggested_fix) = match category {
            ReviewCategory::Ticker => {
                let key = record.description.clone();
                let description = match record.ticker.value() {
                    Some(ticker) => format!(
                        "Ticker '{}' extracted from '{}' with low confidence {:.2}",
                        ticker,
                        record.description,
                        record.ticker.confidence()
                    ),
                    None => format!("No ticker could be extracted from '{}'", record.description),
                };
                let fix = format!(
                    "Add '{}' to the company ticker table or fill the ticker column",
                    record.description
                );
                (key, description, fix)
            }
            ReviewCategory::Amount => {
                let description = match record.amount.failure() {
                    Some(failure) => failure.to_string(),
                    None => format!(
                        "Amount '{}' is not within tolerance of an official range (confidence {:.2})",
                        raw_amount,
                        record.amount.confidence()
                    ),
                };
                let fix = format!(
                    "Map '{}' to an official disclosure range such as '$1,001 - $15,000'",
                    raw_amount
                );
                (raw_amount.clone(), description, fix)
            }
            ReviewCategory::Owner => {
                let key = record.owner.input.clone();
                let description = format!(
                    "Owner value '{}' looks like a shifted column (row {} of {})",
                    record.owner.input, record.raw.row_number, record.raw.source_id
                );
                let fix = format!(
                    "Check column alignment for row {}; owner must be one of C, SP, JT, DC",
                    record.raw.row_number
                );
                (key, description, fix)
            }
            ReviewCategory::Security => {
                let key = record.ticker_value().unwrap_or(&record.description).to_string();
                let description = format!("Security for '{}' could not be resolved", key);
                let fix = format!("Create or correct the security for '{}'", key);
                (key, description, fix)
            }
        };

        ManualReviewItem {
            fingerprint: fingerprint(category, &key),
            category,
            description,
            raw_data: serde_json::to_value(&record.raw).unwrap_or(serde_json::Value::Null),
            suggested_fix,
            confidence: 0.0,
            frequency: 1,
            source_id: record.raw.source_id.clone(),
            row_number: record.raw.row_number,
            trade_id: record.trade_id,
            other_issues,
            group_key: key,
        }
    }
}

/// Frequency is the larger of the snapshot count and the count among the items themselves.
fn apply_frequencies<F>(items: &mut [ManualReviewItem], snapshot: F)
where
    F: Fn(&ManualReviewItem) -> u64,
{
    let mut local: HashMap<(ReviewCategory, String), u64> = HashMap::new();
    for item in items.iter() {
        *local.entry((item.category, item.group_key.clone())).or_insert(0) += 1;
    }
    for item in items.iter_mut() {
        let count = local
            .get(&(item.category, item.group_key.clone()))
            .copied()
            .unwrap_or(1);
        item.frequency = count.max(snapshot(item)).max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::RawTradeRecord;
    use crate::pipeline::orchestrator::RecordProcessor;
    use crate::pipeline::quality_metrics::QualityMetricsTracker;
    use crate::reference::ReferenceData;

    fn create_test_batch() -> (Vec<RecordOutcome>, QualityReport) {
        let processor = RecordProcessor::with_defaults(Arc::new(ReferenceData::builtin()));
        let raws = vec![
            RawTradeRecord::new("f", 1, "Apple Inc. (AAPL)").with_amount("$1,001 - $15,000"),
            // owner only
            RawTradeRecord::new("f", 2, "Apple Inc. (AAPL)")
                .with_amount("$1,001 - $15,000")
                .with_owner("Apple Inc"),
            // amount only
            RawTradeRecord::new("f", 3, "Tesla Inc (TSLA)").with_amount("gfedc"),
            // ticker and amount; ticker wins
            RawTradeRecord::new("f", 4, "Unlisted Partnership").with_amount("gfedc"),
            RawTradeRecord::new("f", 5, "Unlisted Partnership").with_amount("$15,001 - $50,000"),
        ];
        let outcomes: Vec<RecordOutcome> = raws.iter().map(|r| processor.process(r)).collect();
        let mut tracker = QualityMetricsTracker::new();
        outcomes.iter().for_each(|o| tracker.record(o));
        (outcomes, tracker.finalize(10))
    }

    #[test]
    fn test_one_item_per_unresolved_record() {
        let (outcomes, report) = create_test_batch();
        let items = ManualReviewGenerator::new().generate(&outcomes, &report);
        let unresolved = outcomes.iter().filter(|o| !o.is_resolved()).count();
        assert_eq!(items.len(), unresolved);
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|i| i.confidence == 0.0));
    }

    #[test]
    fn test_ordering_by_frequency_then_category() {
        let (outcomes, report) = create_test_batch();
        let items = ManualReviewGenerator::new().generate(&outcomes, &report);

        // The two partnership rows share a key, so they lead
        assert_eq!(items[0].category, ReviewCategory::Ticker);
        assert_eq!(items[0].frequency, 2);
        assert_eq!(items[1].category, ReviewCategory::Ticker);
        assert_eq!(items[0].row_number, 4);
        assert_eq!(items[0].other_issues, vec![ReviewCategory::Amount]);
        // gfedc occurs twice in the batch as an amount key
        assert_eq!(items[2].category, ReviewCategory::Amount);
        assert_eq!(items[3].category, ReviewCategory::Owner);
    }

    #[test]
    fn test_fingerprint_groups_same_problem() {
        let (outcomes, report) = create_test_batch();
        let items = ManualReviewGenerator::new().generate(&outcomes, &report);
        assert_eq!(items[0].fingerprint, items[1].fingerprint);
        assert_ne!(items[0].fingerprint, items[2].fingerprint);
        assert_eq!(items[0].fingerprint.len(), 64);
    }

    #[test]
    fn test_flat_rows_carry_raw_data() {
        let (outcomes, report) = create_test_batch();
        let items = ManualReviewGenerator::new().generate(&outcomes, &report);
        let rows = to_rows(&items);
        assert_eq!(rows.len(), items.len());
        assert_eq!(rows[0].category, "ticker");
        assert!(rows[0].raw_data.contains("Unlisted Partnership"));
        assert_eq!(rows[0].other_issues, "amount");
    }
}
