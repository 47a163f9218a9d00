mod metric_set;
mod obis;
mod reading;
mod series_row;

pub use metric_set::MetricSet;
pub use obis::{ObisCode, ObisCodeError};
pub use reading::{CodedPoint, MeasuredValue, ReadingBatch, ReadingValue};
pub use series_row::SeriesRow;
