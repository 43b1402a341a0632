use clap::Parser;
use miette::{IntoDiagnostic, Result};
use railgate::application::pipeline::{CancelFlag, Pipeline, PipelinePorts};
use railgate::config::PipelineConfig;
use railgate::infrastructure::in_memory::{
    InMemoryEvidenceStore, InMemoryRail, InMemoryRecordStore, ScriptedPolicyEngine,
};
use railgate::interfaces::csv::line_reader::BatchReader;
use railgate::interfaces::csv::report_writer::ReportWriter;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input batch CSV file
    input: PathBuf,

    /// JSON configuration snapshot; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the outcome report to this path instead of stdout.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    railgate::logging::init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_path(path).into_diagnostic()?,
        None => PipelineConfig::default(),
    };

    // The binary runs against in-memory collaborators; production services
    // wire their own port implementations through the library API.
    let rail = InMemoryRail::new();
    let pipeline = Pipeline::new(
        config,
        PipelinePorts {
            policy_engine: Box::new(ScriptedPolicyEngine::new()),
            evidence: Box::new(InMemoryEvidenceStore::new()),
            execution: Box::new(rail.clone()),
            settlement_feed: Box::new(rail),
            records: Box::new(InMemoryRecordStore::new()),
        },
    )
    .into_diagnostic()?;
    let pipeline = Arc::new(pipeline);

    let file = File::open(&cli.input).into_diagnostic()?;
    let mut rows = Vec::new();
    for row in BatchReader::new(file).rows() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) => eprintln!("Error reading batch row: {e}"),
        }
    }

    let report = pipeline.run_batch(rows, &CancelFlag::new()).await;

    match &cli.report {
        Some(path) => {
            let sink = File::create(path).into_diagnostic()?;
            ReportWriter::new(sink).write_report(&report).into_diagnostic()?;
        }
        None => {
            let stdout = io::stdout();
            ReportWriter::new(stdout.lock())
                .write_report(&report)
                .into_diagnostic()?;
        }
    }

    Ok(())
}
