// Record pipeline: pure processing stages, the per-record state machine,
// batch orchestration, backfill, quality accounting and review generation

pub mod backfill;
pub mod orchestrator;
pub mod processing;
pub mod quality_metrics;
pub mod record;
pub mod review;
pub mod stage;
pub mod storage;

pub use orchestrator::{BatchReport, Pipeline, RecordProcessor};
pub use record::{ProcessedRecord, RecordOutcome, ResolvedTrade};
pub use stage::PipelineStage;
