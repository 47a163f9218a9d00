use std::collections::HashSet;

use strom_client::ObisCode;

/// What to do with a point reported under a given code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEffect {
    /// Bind the point's single value to the metric.
    Extract(String),
    /// Like `Extract`, and also publish the value as the instantaneous snapshot.
    Snapshot(String),
    /// Known code, intentionally ignored.
    Suppress,
}

impl PolicyEffect {
    pub fn metric(&self) -> Option<&str> {
        match self {
            Self::Extract(m) | Self::Snapshot(m) => Some(m),
            Self::Suppress => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    pub code: ObisCode,
    pub effect: PolicyEffect,
}

impl PolicyEntry {
    pub fn extract(code: ObisCode, metric: impl Into<String>) -> Self {
        Self {
            code,
            effect: PolicyEffect::Extract(metric.into()),
        }
    }

    pub fn snapshot(code: ObisCode, metric: impl Into<String>) -> Self {
        Self {
            code,
            effect: PolicyEffect::Snapshot(metric.into()),
        }
    }

    pub fn suppress(code: ObisCode) -> Self {
        Self {
            code,
            effect: PolicyEffect::Suppress,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("OBIS code {0} appears more than once in the policy")]
    DuplicateCode(ObisCode),
    #[error("metric '{0}' is produced by more than one OBIS code")]
    DuplicateMetric(String),
    #[error("invalid metric name '{metric}' for {code}: use letters, digits and '_'")]
    InvalidMetricName { code: ObisCode, metric: String },
    #[error("policy entry for {0} must set exactly one of extract, snapshot or suppress")]
    AmbiguousEffect(ObisCode),
}

/// Ordered code → effect table.
///
/// Declaration order is the column order of every series row, so rows stay
/// aligned across cycles no matter how the transport orders its points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricPolicy {
    entries: Vec<PolicyEntry>,
}

impl MetricPolicy {
    pub fn new(entries: Vec<PolicyEntry>) -> Result<Self, PolicyError> {
        let mut codes = HashSet::new();
        let mut metrics = HashSet::new();

        for entry in &entries {
            if !codes.insert(entry.code) {
                return Err(PolicyError::DuplicateCode(entry.code));
            }
            if let Some(metric) = entry.effect.metric() {
                if !is_valid_metric_name(metric) {
                    return Err(PolicyError::InvalidMetricName {
                        code: entry.code,
                        metric: metric.to_string(),
                    });
                }
                if !metrics.insert(metric) {
                    return Err(PolicyError::DuplicateMetric(metric.to_string()));
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn lookup(&self, code: &ObisCode) -> Option<&PolicyEffect> {
        self.entries.iter().find(|e| e.code == *code).map(|e| &e.effect)
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }
}

impl Default for MetricPolicy {
    /// Table for a two-register household meter (EasyMeter / ISKRA style SML output).
    fn default() -> Self {
        Self {
            entries: vec![
                PolicyEntry::extract(ObisCode::new(1, 0, 1, 8, 0, 255), "gesamtLeistung"),
                PolicyEntry::snapshot(ObisCode::new(1, 0, 16, 7, 0, 255), "momentanLeistung"),
                PolicyEntry::suppress(ObisCode::new(1, 0, 0, 0, 9, 255)),
                PolicyEntry::suppress(ObisCode::new(1, 0, 1, 8, 1, 255)),
                PolicyEntry::suppress(ObisCode::new(1, 0, 1, 8, 2, 255)),
                PolicyEntry::suppress(ObisCode::new(129, 129, 199, 130, 3, 255)),
                PolicyEntry::suppress(ObisCode::new(129, 129, 199, 130, 5, 255)),
            ],
        }
    }
}

// Column names end up in a colon-delimited template.
fn is_valid_metric_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
