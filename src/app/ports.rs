use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::backfill::BackfillOutcome;
use crate::pipeline::quality_metrics::QualityReport;
use crate::pipeline::record::ResolvedTrade;
use crate::pipeline::review::ReviewRow;

/// Destination for the artifacts of one batch run.
#[async_trait]
pub trait BatchOutputPort: Send + Sync {
    async fn write_resolved_trade(&self, trade: &ResolvedTrade) -> Result<()>;
    async fn write_review_row(&self, row: &ReviewRow) -> Result<()>;
    async fn write_quality_report(&self, report: &QualityReport) -> Result<()>;
    async fn write_backfill_outcome(&self, outcome: &BackfillOutcome) -> Result<()>;

    /// Prometheus exposition text, when a recorder is installed.
    async fn write_metrics_text(&self, text: &str) -> Result<()>;
}
