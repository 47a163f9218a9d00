pub mod domain;
pub mod names;

pub use domain::{CodedPoint, MeasuredValue, MetricSet, ObisCode, ObisCodeError, ReadingBatch, ReadingValue, SeriesRow};
