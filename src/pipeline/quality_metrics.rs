//! Per-batch quality accounting.
//!
//! Each worker owns a [`QualityMetricsTracker`]; trackers are merged at the end of a
//! sub-batch and the merged tracker is frozen into an immutable [`QualityReport`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::SectorStatus;
use crate::error::FieldFailure;
use crate::pipeline::processing::amount::AmountMatch;
use crate::pipeline::processing::quality_gate::QualityField;
use crate::pipeline::processing::text::clean_text;
use crate::pipeline::record::RecordOutcome;

pub const HISTOGRAM_BINS: usize = 10;

/// Fixed-width confidence histogram over [0, 1]; 1.0 lands in the last bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceHistogram {
    pub bins: [u64; HISTOGRAM_BINS],
}

impl ConfidenceHistogram {
    pub fn record(&mut self, confidence: f64) {
        let clamped = crate::constants::clamp_confidence(confidence);
        let index = ((clamped * HISTOGRAM_BINS as f64) as usize).min(HISTOGRAM_BINS - 1);
        self.bins[index] += 1;
    }

    pub fn merge(&mut self, other: &ConfidenceHistogram) {
        for (mine, theirs) in self.bins.iter_mut().zip(other.bins.iter()) {
            *mine += theirs;
        }
    }

    pub fn count(&self) -> u64 {
        self.bins.iter().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FieldCounts {
    success: u64,
    failure: u64,
    /// Summed in millionths so merge order cannot change the result
    confidence_micros: u64,
    histogram: ConfidenceHistogram,
}

impl FieldCounts {
    fn record(&mut self, resolved: bool, confidence: f64) {
        if resolved {
            self.success += 1;
        } else {
            self.failure += 1;
        }
        self.confidence_micros += (crate::constants::clamp_confidence(confidence) * 1_000_000.0).round() as u64;
        self.histogram.record(confidence);
    }

    fn merge(&mut self, other: &FieldCounts) {
        self.success += other.success;
        self.failure += other.failure;
        self.confidence_micros += other.confidence_micros;
        self.histogram.merge(&other.histogram);
    }

    fn report(&self) -> FieldReport {
        let total = self.success + self.failure;
        FieldReport {
            success: self.success,
            failure: self.failure,
            rate: ratio(self.success, total),
            mean_confidence: if total == 0 {
                0.0
            } else {
                self.confidence_micros as f64 / 1_000_000.0 / total as f64
            },
            histogram: self.histogram,
        }
    }
}

/// Mutable accumulator for one worker or one batch.
#[derive(Debug, Clone, Default)]
pub struct QualityMetricsTracker {
    total: u64,
    resolved: u64,
    needs_review: u64,
    ticker: FieldCounts,
    amount: FieldCounts,
    owner: FieldCounts,
    security: FieldCounts,
    ticker_strategies: BTreeMap<String, u64>,
    amount_matches: BTreeMap<String, u64>,
    owner_matches: BTreeMap<String, u64>,
    sector_status: BTreeMap<String, u64>,
    misaligned: u64,
    unmatched_tickers: HashMap<String, u64>,
    unmatched_assets: HashMap<String, u64>,
    unparsed_amounts: HashMap<String, u64>,
    misaligned_owners: HashMap<String, u64>,
    parse_errors: HashMap<String, u64>,
}

impl QualityMetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one record's terminal outcome.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        let record = outcome.record();
        self.total += 1;
        if outcome.is_resolved() {
            self.resolved += 1;
        } else {
            self.needs_review += 1;
        }

        self.ticker.record(record.ticker.is_resolved(), record.ticker.confidence());
        match record.ticker.source() {
            Some(source) => bump(&mut self.ticker_strategies, source.as_str()),
            None => {
                if let Some(raw) = record.raw.ticker.as_deref().map(clean_text).filter(|t| !t.is_empty()) {
                    bump_owned(&mut self.unmatched_tickers, raw);
                }
                bump_owned(&mut self.unmatched_assets, record.description.clone());
            }
        }

        self.amount.record(record.amount.is_resolved(), record.amount.confidence());
        let raw_amount = record.raw.amount.as_deref().map(clean_text).unwrap_or_default();
        match record.amount.source() {
            Some(kind) => {
                bump(&mut self.amount_matches, kind.as_str());
                if kind == AmountMatch::OutOfTolerance {
                    bump_owned(&mut self.unparsed_amounts, raw_amount);
                }
            }
            None => {
                if let Some(FieldFailure::ParseFailure { message, .. }) = record.amount.failure() {
                    bump_owned(&mut self.parse_errors, message.clone());
                }
                bump_owned(&mut self.unparsed_amounts, raw_amount);
            }
        }

        self.owner.record(record.owner.is_resolved(), record.owner.confidence);
        bump(&mut self.owner_matches, record.owner.source.as_str());
        if record.owner.misaligned {
            self.misaligned += 1;
            bump_owned(&mut self.misaligned_owners, record.owner.input.clone());
        }

        let enriched = record.security.gaps.is_empty();
        self.security.record(enriched, if enriched { 1.0 } else { 0.0 });
        let status = match record.security.sector_status {
            SectorStatus::Known => "known",
            SectorStatus::NotApplicable => "not_applicable",
            SectorStatus::Unknown => "unknown",
        };
        bump(&mut self.sector_status, status);
    }

    /// Fold another worker's counts into this one.
    pub fn merge(&mut self, other: QualityMetricsTracker) {
        self.total += other.total;
        self.resolved += other.resolved;
        self.needs_review += other.needs_review;
        self.ticker.merge(&other.ticker);
        self.amount.merge(&other.amount);
        self.owner.merge(&other.owner);
        self.security.merge(&other.security);
        self.misaligned += other.misaligned;
        merge_ordered(&mut self.ticker_strategies, other.ticker_strategies);
        merge_ordered(&mut self.amount_matches, other.amount_matches);
        merge_ordered(&mut self.owner_matches, other.owner_matches);
        merge_ordered(&mut self.sector_status, other.sector_status);
        merge_counts(&mut self.unmatched_tickers, other.unmatched_tickers);
        merge_counts(&mut self.unmatched_assets, other.unmatched_assets);
        merge_counts(&mut self.unparsed_amounts, other.unparsed_amounts);
        merge_counts(&mut self.misaligned_owners, other.misaligned_owners);
        merge_counts(&mut self.parse_errors, other.parse_errors);
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Freeze into a report. Consumes the tracker so nothing can be added afterwards.
    pub fn finalize(self, top_n: usize) -> QualityReport {
        let ticker = self.ticker.report();
        let amount = self.amount.report();
        let owner = self.owner.report();
        let security = self.security.report();

        QualityReport {
            total_records: self.total,
            resolved_records: self.resolved,
            needs_review_records: self.needs_review,
            ticker_extraction_rate: ticker.rate,
            amount_parsing_rate: amount.rate,
            owner_normalization_rate: owner.rate,
            security_enrichment_rate: security.rate,
            ticker,
            amount,
            owner,
            security,
            misaligned_owners: self.misaligned,
            ticker_strategies: self.ticker_strategies,
            amount_matches: self.amount_matches,
            owner_matches: self.owner_matches,
            sector_status: self.sector_status,
            top_unmatched_tickers: top_entries(&self.unmatched_tickers, top_n),
            top_unmatched_assets: top_entries(&self.unmatched_assets, top_n),
            parse_errors: top_entries(&self.parse_errors, usize::MAX),
            group_counts: GroupCounts {
                unmatched_assets: self.unmatched_assets,
                unparsed_amounts: self.unparsed_amounts,
                misaligned_owners: self.misaligned_owners,
            },
        }
    }
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

fn bump_owned(map: &mut HashMap<String, u64>, key: String) {
    *map.entry(key).or_insert(0) += 1;
}

fn merge_ordered(into: &mut BTreeMap<String, u64>, from: BTreeMap<String, u64>) {
    for (key, count) in from {
        *into.entry(key).or_insert(0) += count;
    }
}

fn merge_counts(into: &mut HashMap<String, u64>, from: HashMap<String, u64>) {
    for (key, count) in from {
        *into.entry(key).or_insert(0) += count;
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Frequency-ranked, ties broken alphabetically.
fn top_entries(counts: &HashMap<String, u64>, n: usize) -> Vec<FrequencyEntry> {
    let mut entries: Vec<FrequencyEntry> = counts
        .iter()
        .map(|(value, count)| FrequencyEntry {
            value: value.clone(),
            count: *count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    entries.truncate(n);
    entries
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub success: u64,
    pub failure: u64,
    /// `success / (success + failure)`
    pub rate: f64,
    pub mean_confidence: f64,
    pub histogram: ConfidenceHistogram,
}

/// Full frequency tables behind review prioritization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupCounts {
    unmatched_assets: HashMap<String, u64>,
    unparsed_amounts: HashMap<String, u64>,
    misaligned_owners: HashMap<String, u64>,
}

/// Frozen per-batch snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_records: u64,
    pub resolved_records: u64,
    pub needs_review_records: u64,
    pub ticker_extraction_rate: f64,
    pub amount_parsing_rate: f64,
    pub owner_normalization_rate: f64,
    pub security_enrichment_rate: f64,
    pub ticker: FieldReport,
    pub amount: FieldReport,
    pub owner: FieldReport,
    pub security: FieldReport,
    pub misaligned_owners: u64,
    pub ticker_strategies: BTreeMap<String, u64>,
    pub amount_matches: BTreeMap<String, u64>,
    pub owner_matches: BTreeMap<String, u64>,
    pub sector_status: BTreeMap<String, u64>,
    pub top_unmatched_tickers: Vec<FrequencyEntry>,
    pub top_unmatched_assets: Vec<FrequencyEntry>,
    pub parse_errors: Vec<FrequencyEntry>,
    #[serde(skip)]
    group_counts: GroupCounts,
}

impl QualityReport {
    /// How often the grouping key of a review category occurred in the batch.
    pub fn group_frequency(&self, field: QualityField, key: &str) -> u64 {
        let table = match field {
            QualityField::Ticker => &self.group_counts.unmatched_assets,
            QualityField::Amount => &self.group_counts.unparsed_amounts,
            QualityField::Owner => &self.group_counts.misaligned_owners,
            QualityField::Security | QualityField::Transaction => return 0,
        };
        table.get(key).copied().unwrap_or(0)
    }

    pub fn empty() -> Self {
        QualityMetricsTracker::new().finalize(0)
    }
}
