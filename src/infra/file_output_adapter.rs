use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use crate::app::ports::BatchOutputPort;
use crate::error::{IngestError, Result};
use crate::pipeline::backfill::BackfillOutcome;
use crate::pipeline::quality_metrics::QualityReport;
use crate::pipeline::record::ResolvedTrade;
use crate::pipeline::review::ReviewRow;

pub const RESOLVED_TRADES_FILE: &str = "resolved_trades.ndjson";
pub const REVIEW_ROWS_FILE: &str = "review_items.ndjson";
pub const QUALITY_REPORT_FILE: &str = "quality_report.json";
pub const BACKFILL_FILE: &str = "backfill.json";
pub const METRICS_FILE: &str = "metrics.prom";

/// File-based implementation of BatchOutputPort.
/// Trades and review rows go to NDJSON files; the report and backfill outcome to JSON.
pub struct FileBatchOutputAdapter {
    output_dir: PathBuf,
    resolved_writer: Mutex<BufWriter<File>>,
    review_writer: Mutex<BufWriter<File>>,
}

impl FileBatchOutputAdapter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        info!("Writing batch output to {}", output_dir.display());

        Ok(Self {
            resolved_writer: Mutex::new(truncating_writer(&output_dir.join(RESOLVED_TRADES_FILE))?),
            review_writer: Mutex::new(truncating_writer(&output_dir.join(REVIEW_ROWS_FILE))?),
            output_dir,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_line<T: serde::Serialize>(writer: &Mutex<BufWriter<File>>, value: &T) -> Result<()> {
        let json_line = serde_json::to_string(value)?;
        let mut writer = writer
            .lock()
            .map_err(|_| IngestError::storage("output writer lock poisoned"))?;
        writeln!(writer, "{}", json_line)?;
        writer.flush()?;
        Ok(())
    }

    fn write_document<T: serde::Serialize>(&self, file_name: &str, value: &T) -> Result<()> {
        let path = self.output_dir.join(file_name);
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

fn truncating_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(BufWriter::new(file))
}

#[async_trait::async_trait]
impl BatchOutputPort for FileBatchOutputAdapter {
    async fn write_resolved_trade(&self, trade: &ResolvedTrade) -> Result<()> {
        Self::write_line(&self.resolved_writer, trade)
    }

    async fn write_review_row(&self, row: &ReviewRow) -> Result<()> {
        Self::write_line(&self.review_writer, row)
    }

    async fn write_quality_report(&self, report: &QualityReport) -> Result<()> {
        self.write_document(QUALITY_REPORT_FILE, report)
    }

    async fn write_backfill_outcome(&self, outcome: &BackfillOutcome) -> Result<()> {
        self.write_document(BACKFILL_FILE, outcome)
    }

    async fn write_metrics_text(&self, text: &str) -> Result<()> {
        fs::write(self.output_dir.join(METRICS_FILE), text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_ndjson_rows_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileBatchOutputAdapter::new(dir.path().join("out")).unwrap();

        let row = ReviewRow {
            fingerprint: "abc".to_string(),
            category: "ticker".to_string(),
            description: "No ticker".to_string(),
            suggested_fix: "Fill the ticker column".to_string(),
            confidence: 0.0,
            frequency: 2,
            source_id: "f".to_string(),
            row_number: 1,
            trade_id: "t".to_string(),
            other_issues: String::new(),
            raw_data: "{}".to_string(),
        };
        adapter.write_review_row(&row).await.unwrap();
        adapter.write_review_row(&row).await.unwrap();
        adapter.write_quality_report(&QualityReport::empty()).await.unwrap();

        let rows = fs::read_to_string(adapter.output_dir().join(REVIEW_ROWS_FILE)).unwrap();
        assert_eq!(rows.lines().count(), 2);
        let parsed: ReviewRow = serde_json::from_str(rows.lines().next().unwrap()).unwrap();
        assert_eq!(parsed, row);

        let report = fs::read_to_string(adapter.output_dir().join(QUALITY_REPORT_FILE)).unwrap();
        assert!(report.contains("ticker_extraction_rate"));
    }
}
