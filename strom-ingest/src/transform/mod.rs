mod policy;

pub use policy::{MetricPolicy, PolicyEffect, PolicyEntry, PolicyError};

use strom_client::{MetricSet, ObisCode, ReadingBatch};

/// A code present in the batch but absent from the policy.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownCode {
    pub code: ObisCode,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Every extracted metric, in policy order.
    pub metrics: MetricSet,
    /// The subset of `metrics` that must be published as the instantaneous snapshot.
    pub snapshot: MetricSet,
    pub unknown: Vec<UnknownCode>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    /// The meter changed its reporting shape for a code the policy relies on.
    #[error("OBIS code {code} ('{metric}') carries {found} values, expected exactly 1")]
    ValueCount {
        code: ObisCode,
        metric: String,
        found: usize,
    },
    #[error("OBIS code {code} ('{metric}') carries a {kind} value, expected a number")]
    NotNumeric {
        code: ObisCode,
        metric: String,
        kind: &'static str,
    },
}

/// Applies a [`MetricPolicy`] to one batch of readings.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    policy: MetricPolicy,
}

impl Classifier {
    pub fn new(policy: MetricPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MetricPolicy {
        &self.policy
    }

    /// Pure with respect to storage: nothing is written here, so a shape
    /// violation can never leave a partial update behind.
    pub fn classify(&self, batch: &ReadingBatch) -> Result<Classification, ClassifyError> {
        let mut out = Classification::default();

        for entry in self.policy.entries() {
            let Some(point) = batch.get(&entry.code) else {
                continue;
            };
            let Some(metric) = entry.effect.metric() else {
                continue;
            };

            let value = match point.values.as_slice() {
                [only] => only.value.as_f64().ok_or_else(|| ClassifyError::NotNumeric {
                    code: entry.code,
                    metric: metric.to_string(),
                    kind: only.value.kind(),
                }),
                values => Err(ClassifyError::ValueCount {
                    code: entry.code,
                    metric: metric.to_string(),
                    found: values.len(),
                }),
            }
            .map_err(|e| {
                metrics::counter!("strom_policy_violations_total").increment(1);
                e
            })?;

            out.metrics.insert(metric, value);
            if let PolicyEffect::Snapshot(_) = entry.effect {
                out.snapshot.insert(metric, value);
            }
        }

        for point in batch.iter() {
            if self.policy.lookup(&point.code).is_none() {
                tracing::warn!(code = %point.code, name = %point.name, "unhandled OBIS code");
                out.unknown.push(UnknownCode {
                    code: point.code,
                    name: point.name.clone(),
                });
            }
        }

        if !out.unknown.is_empty() {
            metrics::counter!("strom_unknown_codes_total").increment(out.unknown.len() as u64);
        }

        Ok(out)
    }
}
