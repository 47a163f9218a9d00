use std::{pin::Pin, time::SystemTime};

use futures::{Stream, StreamExt};
use strom_client::{MetricSet, ReadingBatch, SeriesRow};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::{
    sinks::{SeriesError, SeriesStore},
    snapshot::SnapshotWriter,
    transform::{ClassifyError, Classifier, UnknownCode},
};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn now(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The source itself is broken (cannot start, decoder died). Ends the run.
    #[error("source error: {0}")]
    Source(String),
    /// One reading could not be decoded. Skips that cycle only.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("classification error: {0}")]
    Classify(#[from] ClassifyError),
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}

#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("series append failed: {0}")]
    Series(#[from] SeriesError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// The cycle had no snapshot metrics.
    Skipped,
    Written,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub row: SeriesRow,
    pub snapshot: SnapshotOutcome,
    pub unknown: Vec<UnknownCode>,
}

/// Drives one reading cycle at a time: classify, publish the snapshot, append
/// the series row.
pub struct Pipeline<S, K> {
    pub source: S,
    pub classifier: Classifier,
    pub snapshot: SnapshotWriter,
    pub store: K,
}

impl<S, K> Pipeline<S, K>
where
    S: Source<ReadingBatch> + Send + Sync + 'static,
    K: SeriesStore + 'static,
{
    /// Runs until the source ends, `shutdown` fires, or a policy-shape
    /// violation is found. Shutdown is only honoured between cycles.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        let mut stream = self.source.stream().await;

        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, stopping reading loop");
                    break;
                }
                item = stream.next() => item,
            };

            let Some(item) = item else {
                tracing::info!("reading source ended");
                break;
            };

            let env = match item {
                Ok(env) => env,
                Err(PipelineError::Transport(reason)) => {
                    tracing::warn!(%reason, "transport error, skipping cycle");
                    metrics::counter!("strom_transport_errors_total").increment(1);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.run_cycle(env).await {
                Ok(report) => {
                    tracing::debug!(
                        ts = report.row.timestamp(),
                        columns = report.row.columns().len(),
                        unknown = report.unknown.len(),
                        "cycle complete"
                    );
                }
                Err(CycleError::Classify(e)) => {
                    tracing::error!(error = %e, "meter reporting shape changed, stopping");
                    return Err(e.into());
                }
                Err(CycleError::Series(e)) => {
                    tracing::error!(error = %e, "series append failed");
                    metrics::counter!("strom_series_append_errors_total").increment(1);
                }
            }
        }

        Ok(())
    }

    pub async fn run_cycle(&self, env: Envelope<ReadingBatch>) -> Result<CycleReport, CycleError> {
        self.run_cycle_at(env, OffsetDateTime::now_utc()).await
    }

    pub async fn run_cycle_at(
        &self,
        env: Envelope<ReadingBatch>,
        now: OffsetDateTime,
    ) -> Result<CycleReport, CycleError> {
        metrics::counter!("strom_cycles_total").increment(1);

        let classification = self.classifier.classify(&env.payload)?;

        let snapshot = self.publish_snapshot(&classification.snapshot).await;

        let row = SeriesRow::new(now, &classification.metrics);
        self.store.append(&row).await?;

        if let Ok(dur) = SystemTime::now().duration_since(env.received_at) {
            metrics::histogram!("strom_cycle_latency_seconds").record(dur.as_secs_f64());
        }

        Ok(CycleReport {
            row,
            snapshot,
            unknown: classification.unknown,
        })
    }

    async fn publish_snapshot(&self, metrics: &MetricSet) -> SnapshotOutcome {
        if metrics.is_empty() {
            return SnapshotOutcome::Skipped;
        }

        match self.snapshot.write(metrics).await {
            Ok(()) => SnapshotOutcome::Written,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.snapshot.path().display(),
                    "snapshot write failed, continuing with series update"
                );
                metrics::counter!("strom_snapshot_errors_total").increment(1);
                SnapshotOutcome::Failed(e.to_string())
            }
        }
    }
}
