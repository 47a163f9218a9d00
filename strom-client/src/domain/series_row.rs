use time::OffsetDateTime;

use super::MetricSet;

/// Marker the series store reads as "no value for this column".
const UNKNOWN_VALUE: &str = "U";

/// One timestamped, column-aligned row for an append-only series store.
///
/// `columns[i]` names `values[i]`; the timestamp is implicit in the store's row
/// format and never appears among the columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    timestamp: i64,
    columns: Vec<String>,
    values: Vec<f64>,
}

impl SeriesRow {
    /// Builds a row from `metrics` in its iteration order, at second resolution.
    pub fn new(ts: OffsetDateTime, metrics: &MetricSet) -> Self {
        let (columns, values) = metrics.iter().map(|(name, value)| (name.to_string(), value)).unzip();
        Self {
            timestamp: ts.unix_timestamp(),
            columns,
            values,
        }
    }

    /// Unix timestamp in seconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Colon-delimited column names, e.g. `gesamtLeistung:momentanLeistung`.
    pub fn template(&self) -> String {
        self.columns.join(":")
    }

    /// Colon-delimited values prefixed by the timestamp, e.g. `1700000000:1234.5:500`.
    pub fn render_values(&self) -> String {
        let mut out = self.timestamp.to_string();
        for v in &self.values {
            out.push(':');
            out.push_str(&format_value(*v));
        }
        out
    }
}

fn format_value(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        UNKNOWN_VALUE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn renders_template_and_values_in_metric_order() {
        let metrics: MetricSet = [("gesamtLeistung", 1234.5), ("momentanLeistung", 500.0)]
            .into_iter()
            .collect();
        let row = SeriesRow::new(datetime!(2024-01-01 00:00:00.750 UTC), &metrics);

        assert_eq!(row.timestamp(), 1_704_067_200);
        assert_eq!(row.template(), "gesamtLeistung:momentanLeistung");
        assert_eq!(row.render_values(), "1704067200:1234.5:500");
    }

    #[test]
    fn columns_and_values_have_equal_length() {
        let metrics: MetricSet = [("a", 1.0), ("b", 2.0), ("c", 3.0)].into_iter().collect();
        let row = SeriesRow::new(datetime!(2024-01-01 00:00:00 UTC), &metrics);

        assert_eq!(row.columns().len(), row.values().len());
        let rendered = row.render_values();
        let fields: Vec<&str> = rendered.split(':').collect();
        assert_eq!(fields.len(), row.columns().len() + 1);
        assert_eq!(fields[0], "1704067200");
        assert!(!row.columns().iter().any(|c| c == fields[0]));
    }

    #[test]
    fn empty_metrics_render_timestamp_only() {
        let row = SeriesRow::new(datetime!(2024-01-01 00:00:00 UTC), &MetricSet::new());

        assert!(row.is_empty());
        assert_eq!(row.template(), "");
        assert_eq!(row.render_values(), "1704067200");
    }

    #[test]
    fn non_finite_values_render_as_unknown() {
        let metrics: MetricSet = [("a", f64::NAN), ("b", f64::INFINITY)].into_iter().collect();
        let row = SeriesRow::new(datetime!(2024-01-01 00:00:00 UTC), &metrics);

        assert_eq!(row.render_values(), "1704067200:U:U");
    }
}
