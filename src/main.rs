use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use disclosure_quality::app::export_use_case::ExportBatchUseCase;
use disclosure_quality::config::Config;
use disclosure_quality::infra::{read_raw_records, FileBatchOutputAdapter};
use disclosure_quality::logging;
use disclosure_quality::observability;
use disclosure_quality::pipeline::storage::InMemoryStore;
use disclosure_quality::pipeline::{Pipeline, RecordProcessor};
use disclosure_quality::reference::ReferenceData;

#[derive(Parser)]
#[command(name = "disclosure_quality")]
#[command(about = "Normalize and validate congressional trading disclosure records")]
#[command(version)]
struct Cli {
    /// Config file; overrides DQ_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of raw trade records
    Process {
        /// JSON array or NDJSON file of raw records
        #[arg(long)]
        input: PathBuf,
        /// Directory for resolved trades, review rows, report and metrics
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// Link unlinked trades to securities after the batch
        #[arg(long)]
        backfill: bool,
    },
    /// Validate a reference-data file
    CheckReference {
        path: PathBuf,
    },
}

fn load_reference(config: &Config) -> Result<ReferenceData> {
    match &config.reference.path {
        Some(path) => ReferenceData::load(path)
            .with_context(|| format!("reference data at {} is unusable", path.display())),
        None => Ok(ReferenceData::builtin()),
    }
}

async fn run_process(config: Config, input: PathBuf, output: PathBuf, backfill: bool) -> Result<()> {
    let metrics_handle = observability::init()?;
    let reference = Arc::new(load_reference(&config)?);

    let records = read_raw_records(&input)
        .with_context(|| format!("failed to read records from {}", input.display()))?;
    info!("Processing {} records from {}", records.len(), input.display());

    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(RecordProcessor::new(Arc::clone(&reference), &config));
    let pipeline = Pipeline::new(processor, store.clone(), store.clone(), config.pipeline.clone());

    let cancel = pipeline.cancellation_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current sub-batch");
            cancel.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let report = pipeline.run_batch(records).await?;
    let backfill_outcome = if backfill {
        Some(pipeline.backfill(reference).await?)
    } else {
        None
    };

    let export = ExportBatchUseCase::new(Box::new(FileBatchOutputAdapter::new(&output)?));
    let summary = export.export(&report, backfill_outcome.as_ref()).await?;
    export.export_metrics(&metrics_handle.render()).await?;

    println!("\n📊 Batch results:");
    println!("   Records processed: {}", report.records_processed);
    println!("   Resolved: {}", summary.resolved_trades);
    println!("   Review rows: {}", summary.review_rows);
    println!("   Ticker extraction rate: {:.3}", report.quality.ticker_extraction_rate);
    println!("   Amount parsing rate: {:.3}", report.quality.amount_parsing_rate);
    println!("   Owner normalization rate: {:.3}", report.quality.owner_normalization_rate);
    if let Some(outcome) = &backfill_outcome {
        println!(
            "   Backfill: {} linked, {} unresolved",
            outcome.trades_linked, outcome.trades_unresolved
        );
    }
    if report.cancelled {
        println!("⚠️  Cancelled after {} committed sub-batches", report.committed_sub_batches);
    }
    println!("   Output: {}", output.display());
    Ok(())
}

fn run_check_reference(path: PathBuf) -> Result<()> {
    let data = ReferenceData::load(&path)
        .with_context(|| format!("reference data at {} is invalid", path.display()))?;
    println!("✅ Reference data at {} is valid", path.display());
    println!("   Companies: {}", data.company_tickers().len());
    println!("   Owner synonyms: {}", data.owner_synonyms().len());
    println!("   Sectors: {}", data.sectors().len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let _guard = logging::init_logging(&config.logging)?;

    match cli.command {
        Commands::Process { input, output, backfill } => run_process(config, input, output, backfill).await,
        Commands::CheckReference { path } => run_check_reference(path),
    }
}
