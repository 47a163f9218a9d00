use std::pin::Pin;

use anyhow::{Context, Result};
use futures::Stream;
use strom_client::ReadingBatch;
use strom_ingest::{
    config::{AppConfig, TransportConfig, TransportKind},
    metrics_server,
    observability,
    pipeline::{Envelope, Pipeline, PipelineError, Source},
    sinks::SeriesBackend,
    snapshot::SnapshotWriter,
    sources::{DecoderProcessSource, HttpReadingSource},
    transform::Classifier,
};
use tokio_util::sync::CancellationToken;

enum ReadingSource {
    Decoder(DecoderProcessSource),
    Http(HttpReadingSource),
}

impl ReadingSource {
    async fn from_config(cfg: &TransportConfig) -> Result<Self> {
        let language = cfg.obis_name_language;
        Ok(match cfg.kind {
            TransportKind::DecoderProcess => {
                let decoder = cfg
                    .decoder
                    .as_ref()
                    .context("transport.kind = \"decoder_process\" requires a [transport.decoder] section")?;
                Self::Decoder(DecoderProcessSource::new(decoder, &cfg.link, language))
            }
            TransportKind::Http => {
                let http = cfg
                    .http
                    .as_ref()
                    .context("transport.kind = \"http\" requires a [transport.http] section")?;
                Self::Http(HttpReadingSource::new(http, language).await?)
            }
        })
    }
}

#[async_trait::async_trait]
impl Source<ReadingBatch> for ReadingSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<ReadingBatch>, PipelineError>> + Send>> {
        match self {
            Self::Decoder(s) => s.stream().await,
            Self::Http(s) => s.stream().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let policy = cfg.metric_policy()?;
    tracing::info!(
        entries = policy.entries().len(),
        snapshot = %cfg.snapshot.path.display(),
        series = ?cfg.series.kind,
        "starting strom ingest"
    );

    let pipeline = Pipeline {
        source: ReadingSource::from_config(&cfg.transport).await?,
        classifier: Classifier::new(policy),
        snapshot: SnapshotWriter::new(&cfg.snapshot.path),
        store: SeriesBackend::from_config(&cfg.series)?,
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    pipeline.run(shutdown).await?;

    Ok(())
}
