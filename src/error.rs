use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal and infrastructure errors. Record-level problems never surface here;
/// they travel as [`FieldFailure`] values inside stage results.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Reference data error: {0}")]
    ReferenceData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Unique constraint violated for security ({ticker}, {exchange})")]
    DuplicateSecurity { ticker: String, exchange: String },

    #[error("Sub-batch commit failed after {committed_sub_batches} committed sub-batches: {message}")]
    Commit {
        committed_sub_batches: usize,
        message: String,
    },

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl IngestError {
    pub fn storage(message: impl Into<String>) -> Self {
        IngestError::Storage {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Non-fatal, field-level failure taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldFailure {
    #[error("no resolvable ticker in '{input}'")]
    ExtractionFailure { input: String },

    #[error("no recoverable amount in '{input}': {message}")]
    ParseFailure { input: String, message: String },

    #[error("owner value '{input}' looks like a shifted column")]
    MisalignmentDetected { input: String },

    #[error("security field '{field}' could not be resolved")]
    EnrichmentGap { field: String },
}

impl FieldFailure {
    /// Short stable label used for metrics and review grouping.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldFailure::ExtractionFailure { .. } => "extraction_failure",
            FieldFailure::ParseFailure { .. } => "parse_failure",
            FieldFailure::MisalignmentDetected { .. } => "misalignment_detected",
            FieldFailure::EnrichmentGap { .. } => "enrichment_gap",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_failure_display_and_kind() {
        let failure = FieldFailure::ParseFailure {
            input: "gfedc".to_string(),
            message: "no digits".to_string(),
        };
        assert_eq!(failure.kind(), "parse_failure");
        assert_eq!(failure.to_string(), "no recoverable amount in 'gfedc': no digits");
    }

    #[test]
    fn test_field_failure_serializes_with_kind_tag() {
        let failure = FieldFailure::EnrichmentGap {
            field: "sector".to_string(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "enrichment_gap");
        assert_eq!(json["field"], "sector");
    }
}
