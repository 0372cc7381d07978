use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MIN_AMOUNT_CONFIDENCE, DEFAULT_MIN_TICKER_CONFIDENCE};
use crate::error::FieldFailure;
use crate::pipeline::record::ProcessedRecord;

/// Quality assessment of one processed record at the VALIDATE stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// The quality gate decision
    pub decision: QualityDecision,
    /// Specific quality issues found, blocking and informational
    pub issues: Vec<QualityIssue>,
}

impl QualityAssessment {
    /// Issues that forced the record into review.
    pub fn blocking_issues(&self) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(|i| i.is_blocking())
    }
}

/// Quality Gate decision for a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QualityDecision {
    /// Ticker and amount trusted, owner aligned
    Resolved,
    /// Held for manual review with every partial result kept
    NeedsReview,
}

/// Record field an issue is about; also the review category order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QualityField {
    Ticker,
    Amount,
    Owner,
    Security,
    Transaction,
}

impl QualityField {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityField::Ticker => "ticker",
            QualityField::Amount => "amount",
            QualityField::Owner => "owner",
            QualityField::Security => "security",
            QualityField::Transaction => "transaction",
        }
    }
}

/// Individual quality issue found during assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub issue_type: QualityIssueType,
    pub severity: QualitySeverity,
    /// Human-readable description of the issue
    pub description: String,
    pub field: QualityField,
    /// Field-level failure behind the issue, when there is one
    pub failure: Option<FieldFailure>,
}

impl QualityIssue {
    pub fn is_blocking(&self) -> bool {
        self.severity >= QualitySeverity::Error
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssueType {
    /// Nothing could be resolved for the field
    MissingData,
    /// Resolved, but below the acceptance threshold
    LowConfidence,
    /// Owner column holds a value from another column
    Misalignment,
    /// Security metadata left unresolved
    EnrichmentGap,
    /// Date/time inconsistencies
    TemporalInconsistency,
    InvalidFormat,
}

/// Severity levels for quality issues
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QualitySeverity {
    Info,
    Warning,
    /// Blocks resolution
    Error,
}

/// Trait for implementing Quality Gate assessment logic
pub trait QualityGate {
    fn assess(&self, record: &ProcessedRecord) -> QualityAssessment;
}

/// Thresholds for the VALIDATE stage
#[derive(Debug, Clone)]
pub struct QualityGateConfig {
    pub min_ticker_confidence: f64,
    pub min_amount_confidence: f64,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_ticker_confidence: DEFAULT_MIN_TICKER_CONFIDENCE,
            min_amount_confidence: DEFAULT_MIN_AMOUNT_CONFIDENCE,
        }
    }
}

/// Default Quality Gate: ticker and amount confidence at or above threshold, owner aligned.
pub struct DefaultQualityGate {
    pub config: QualityGateConfig,
}

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self {
            config: QualityGateConfig::default(),
        }
    }

    pub fn with_config(config: QualityGateConfig) -> Self {
        Self { config }
    }

    fn assess_ticker(&self, record: &ProcessedRecord, issues: &mut Vec<QualityIssue>) {
        let confidence = record.ticker.confidence();
        if let Some(failure) = record.ticker.failure() {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::MissingData,
                severity: QualitySeverity::Error,
                description: "No ticker could be extracted".to_string(),
                field: QualityField::Ticker,
                failure: Some(failure.clone()),
            });
        } else if confidence < self.config.min_ticker_confidence {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::LowConfidence,
                severity: QualitySeverity::Error,
                description: format!(
                    "Ticker confidence {:.2} below threshold {:.2}",
                    confidence, self.config.min_ticker_confidence
                ),
                field: QualityField::Ticker,
                failure: None,
            });
        }
    }

    fn assess_amount(&self, record: &ProcessedRecord, issues: &mut Vec<QualityIssue>) {
        let confidence = record.amount.confidence();
        if let Some(failure) = record.amount.failure() {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::MissingData,
                severity: QualitySeverity::Error,
                description: "No amount could be parsed".to_string(),
                field: QualityField::Amount,
                failure: Some(failure.clone()),
            });
        } else if confidence < self.config.min_amount_confidence {
            let shape = record.amount.source().map(|s| s.as_str()).unwrap_or("unknown");
            issues.push(QualityIssue {
                issue_type: QualityIssueType::LowConfidence,
                severity: QualitySeverity::Error,
                description: format!(
                    "Amount confidence {:.2} ({}) below threshold {:.2}",
                    confidence, shape, self.config.min_amount_confidence
                ),
                field: QualityField::Amount,
                failure: None,
            });
        }
    }

    fn assess_owner(&self, record: &ProcessedRecord, issues: &mut Vec<QualityIssue>) {
        if record.owner.misaligned {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::Misalignment,
                severity: QualitySeverity::Error,
                description: format!(
                    "Owner value '{}' does not look like an owner; columns may be shifted",
                    record.owner.input
                ),
                field: QualityField::Owner,
                failure: record.owner.failure(),
            });
        }
    }

    fn assess_security(&self, record: &ProcessedRecord, issues: &mut Vec<QualityIssue>) {
        for gap in &record.security.gaps {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::EnrichmentGap,
                severity: QualitySeverity::Info,
                description: gap.to_string(),
                field: QualityField::Security,
                failure: Some(gap.clone()),
            });
        }
    }

    fn assess_transaction(&self, record: &ProcessedRecord, issues: &mut Vec<QualityIssue>) {
        for warning in &record.transaction.warnings {
            let issue_type = if warning.contains("precedes") {
                QualityIssueType::TemporalInconsistency
            } else {
                QualityIssueType::InvalidFormat
            };
            issues.push(QualityIssue {
                issue_type,
                severity: QualitySeverity::Warning,
                description: warning.clone(),
                field: QualityField::Transaction,
                failure: None,
            });
        }
    }
}

impl QualityGate for DefaultQualityGate {
    fn assess(&self, record: &ProcessedRecord) -> QualityAssessment {
        let mut issues = Vec::new();
        self.assess_ticker(record, &mut issues);
        self.assess_amount(record, &mut issues);
        self.assess_owner(record, &mut issues);
        self.assess_security(record, &mut issues);
        self.assess_transaction(record, &mut issues);

        let decision = if issues.iter().any(QualityIssue::is_blocking) {
            QualityDecision::NeedsReview
        } else {
            QualityDecision::Resolved
        };

        QualityAssessment { decision, issues }
    }
}

impl Default for DefaultQualityGate {
    fn default() -> Self {
        Self::new()
    }
}
