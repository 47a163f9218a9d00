use anyhow::{bail, Result};
use strom_ingest::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::SeriesBackend,
    snapshot::SnapshotWriter,
    sources::ReplayFileSource,
    transform::Classifier,
};
use std::env;
use tokio_util::sync::CancellationToken;

/// Feed a recorded NDJSON file of decoder output through the pipeline.
///
/// Usage:
///   replay_readings <ndjson_file_path>
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: replay_readings <ndjson_file_path>");
    }
    let file_path = &args[1];

    // Load configuration (STROM_CONFIG can point to a replay-specific file).
    let cfg = AppConfig::load()?;

    let pipeline = Pipeline {
        source: ReplayFileSource::new(file_path, cfg.transport.obis_name_language),
        classifier: Classifier::new(cfg.metric_policy()?),
        snapshot: SnapshotWriter::new(&cfg.snapshot.path),
        store: SeriesBackend::from_config(&cfg.series)?,
    };

    pipeline.run(CancellationToken::new()).await?;

    Ok(())
}
