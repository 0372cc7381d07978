use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-record state machine. Every record walks the same path and ends in exactly
/// one of the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Init,
    Clean,
    ExtractTicker,
    ParseAmount,
    NormalizeOwner,
    EnrichSecurity,
    Validate,
    Resolved,
    NeedsReview,
}

impl PipelineStage {
    /// Next stage on the fixed path. `Validate` branches on `passed`; terminal stages stay put.
    pub fn next(self, passed: bool) -> PipelineStage {
        match self {
            PipelineStage::Init => PipelineStage::Clean,
            PipelineStage::Clean => PipelineStage::ExtractTicker,
            PipelineStage::ExtractTicker => PipelineStage::ParseAmount,
            PipelineStage::ParseAmount => PipelineStage::NormalizeOwner,
            PipelineStage::NormalizeOwner => PipelineStage::EnrichSecurity,
            PipelineStage::EnrichSecurity => PipelineStage::Validate,
            PipelineStage::Validate if passed => PipelineStage::Resolved,
            PipelineStage::Validate => PipelineStage::NeedsReview,
            PipelineStage::Resolved => PipelineStage::Resolved,
            PipelineStage::NeedsReview => PipelineStage::NeedsReview,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Resolved | PipelineStage::NeedsReview)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Init => "INIT",
            PipelineStage::Clean => "CLEAN",
            PipelineStage::ExtractTicker => "EXTRACT_TICKER",
            PipelineStage::ParseAmount => "PARSE_AMOUNT",
            PipelineStage::NormalizeOwner => "NORMALIZE_OWNER",
            PipelineStage::EnrichSecurity => "ENRICH_SECURITY",
            PipelineStage::Validate => "VALIDATE",
            PipelineStage::Resolved => "RESOLVED",
            PipelineStage::NeedsReview => "NEEDS_REVIEW",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_reaches_validate_in_order() {
        let mut stage = PipelineStage::Init;
        let mut seen = vec![stage];
        while stage != PipelineStage::Validate {
            stage = stage.next(true);
            seen.push(stage);
        }
        let names: Vec<&str> = seen.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec!["INIT", "CLEAN", "EXTRACT_TICKER", "PARSE_AMOUNT", "NORMALIZE_OWNER", "ENRICH_SECURITY", "VALIDATE"]
        );
    }

    #[test]
    fn test_validate_branches_and_terminals_hold() {
        assert_eq!(PipelineStage::Validate.next(true), PipelineStage::Resolved);
        assert_eq!(PipelineStage::Validate.next(false), PipelineStage::NeedsReview);
        assert!(PipelineStage::Resolved.next(false).is_terminal());
        assert_eq!(PipelineStage::NeedsReview.next(true), PipelineStage::NeedsReview);
    }
}
