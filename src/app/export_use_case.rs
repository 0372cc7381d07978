use tracing::info;

use crate::app::ports::BatchOutputPort;
use crate::error::Result;
use crate::pipeline::backfill::BackfillOutcome;
use crate::pipeline::orchestrator::BatchReport;
use crate::pipeline::review::{self, ManualReviewGenerator, ManualReviewItem};

/// Counts of what one export wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub resolved_trades: usize,
    pub review_rows: usize,
}

/// Writes a finished batch to an output port: resolved trades, flat review rows
/// (batch items first, then unlinked trades left by backfill) and the quality report.
pub struct ExportBatchUseCase {
    output: Box<dyn BatchOutputPort>,
}

impl ExportBatchUseCase {
    pub fn new(output: Box<dyn BatchOutputPort>) -> Self {
        Self { output }
    }

    pub async fn export(&self, report: &BatchReport, backfill: Option<&BackfillOutcome>) -> Result<ExportSummary> {
        for trade in &report.resolved {
            self.output.write_resolved_trade(trade).await?;
        }

        let mut items: Vec<ManualReviewItem> = report.review_items.clone();
        if let Some(outcome) = backfill {
            // Trades already queued for review in this batch are not queued twice
            let unlinked: Vec<_> = outcome
                .unresolved
                .iter()
                .filter(|t| !items.iter().any(|i| i.trade_id == t.trade_id))
                .cloned()
                .collect();
            items.extend(ManualReviewGenerator::new().for_unlinked_trades(&unlinked));
            self.output.write_backfill_outcome(outcome).await?;
        }

        let rows = review::to_rows(&items);
        for row in &rows {
            self.output.write_review_row(row).await?;
        }
        self.output.write_quality_report(&report.quality).await?;

        info!(
            "Exported {} resolved trades and {} review rows",
            report.resolved.len(),
            rows.len()
        );
        Ok(ExportSummary {
            resolved_trades: report.resolved.len(),
            review_rows: rows.len(),
        })
    }

    pub async fn export_metrics(&self, text: &str) -> Result<()> {
        self.output.write_metrics_text(text).await
    }
}
