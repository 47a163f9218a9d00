use std::collections::BTreeMap;

use super::ObisCode;

/// What a meter reported for one value slot.
///
/// SML meters mix numeric registers with octet strings (device id,
/// manufacturer, public key) in the same telegram.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasuredValue {
    /// Scaler already applied.
    Number(f64),
    Text(String),
    Other,
}

impl MeasuredValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) | Self::Other => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingValue {
    pub value: MeasuredValue,
    pub unit: Option<String>,
    pub scaler: i8,
}

impl ReadingValue {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value: MeasuredValue::Number(value),
            unit: Some(unit.into()),
            scaler: 0,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: MeasuredValue::Text(value.into()),
            unit: None,
            scaler: 0,
        }
    }
}

/// One measurement point as decoded by the transport for a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CodedPoint {
    pub code: ObisCode,
    pub values: Vec<ReadingValue>,
    pub name: String,
}

impl CodedPoint {
    pub fn new(code: ObisCode, values: Vec<ReadingValue>, name: impl Into<String>) -> Self {
        Self {
            code,
            values,
            name: name.into(),
        }
    }

    /// The value when the point carries exactly one numeric value, `None`
    /// otherwise.
    pub fn single_value(&self) -> Option<f64> {
        match self.values.as_slice() {
            [only] => only.value.as_f64(),
            _ => None,
        }
    }
}

/// Everything the meter reported in one cycle, keyed by code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingBatch {
    points: BTreeMap<ObisCode, CodedPoint>,
}

impl ReadingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a point, replacing any earlier point reported under the same code.
    pub fn insert(&mut self, point: CodedPoint) -> Option<CodedPoint> {
        self.points.insert(point.code, point)
    }

    pub fn get(&self, code: &ObisCode) -> Option<&CodedPoint> {
        self.points.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodedPoint> {
        self.points.values()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<CodedPoint> for ReadingBatch {
    fn from_iter<I: IntoIterator<Item = CodedPoint>>(iter: I) -> Self {
        let mut batch = Self::new();
        for point in iter {
            batch.insert(point);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> ObisCode {
        s.parse().unwrap()
    }

    #[test]
    fn single_value_requires_exactly_one() {
        let none = CodedPoint::new(code("1-0:1.8.0*255"), vec![], "");
        let one = CodedPoint::new(code("1-0:1.8.0*255"), vec![ReadingValue::new(1.5, "kWh")], "");
        let two = CodedPoint::new(
            code("1-0:1.8.0*255"),
            vec![ReadingValue::new(1.5, "kWh"), ReadingValue::new(2.5, "kWh")],
            "",
        );

        assert_eq!(none.single_value(), None);
        assert_eq!(one.single_value(), Some(1.5));
        assert_eq!(two.single_value(), None);
    }

    #[test]
    fn text_value_is_not_numeric() {
        let id = CodedPoint::new(code("1-0:0.0.9*255"), vec![ReadingValue::text("0901454d48")], "");

        assert_eq!(id.single_value(), None);
        assert_eq!(id.values[0].value.kind(), "text");
    }

    #[test]
    fn batch_iterates_in_code_order() {
        let batch: ReadingBatch = [
            CodedPoint::new(code("1-0:16.7.0*255"), vec![], ""),
            CodedPoint::new(code("1-0:1.8.0*255"), vec![], ""),
        ]
        .into_iter()
        .collect();

        let codes: Vec<String> = batch.iter().map(|p| p.code.to_string()).collect();
        assert_eq!(codes, vec!["1-0:1.8.0*255", "1-0:16.7.0*255"]);
    }
}
