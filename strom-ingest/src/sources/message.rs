use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use strom_client::{names, names::Language, CodedPoint, MeasuredValue, ObisCode, ReadingBatch, ReadingValue};

use crate::pipeline::PipelineError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportFailure {
    pub error: String,
}

/// One value slot. Numbers and octet strings arrive side by side, so the value
/// itself is taken as-is and only interpreted by the classifier.
#[derive(Debug, Deserialize)]
pub struct IncomingValue {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub scaler: i8,
}

impl From<IncomingValue> for ReadingValue {
    fn from(v: IncomingValue) -> Self {
        let value = match v.value {
            Value::Number(n) => n.as_f64().map_or(MeasuredValue::Other, MeasuredValue::Number),
            Value::String(s) => MeasuredValue::Text(s),
            _ => MeasuredValue::Other,
        };
        ReadingValue {
            value,
            unit: v.unit,
            scaler: v.scaler,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IncomingPoint {
    pub values: Vec<IncomingValue>,
    #[serde(default)]
    pub name: Option<String>,
}

/// What the decoder reports for one reading interval: either a failure or a
/// code → point map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TransportMessage {
    Failure(TransportFailure),
    Batch(BTreeMap<String, IncomingPoint>),
}

impl TransportMessage {
    /// Turns the message into a batch. Decoder failures, malformed codes and
    /// two keys naming the same code all come back as
    /// [`PipelineError::Transport`].
    pub fn into_batch(self, language: Language) -> Result<ReadingBatch, PipelineError> {
        let points = match self {
            Self::Failure(f) => return Err(PipelineError::Transport(f.error)),
            Self::Batch(points) => points,
        };

        let mut batch = ReadingBatch::new();
        for (raw_code, incoming) in points {
            let code: ObisCode = raw_code
                .parse()
                .map_err(|e| PipelineError::Transport(format!("{e}")))?;
            let name = incoming
                .name
                .filter(|n| !n.trim().is_empty())
                .or_else(|| names::resolve(&code, language).map(str::to_string))
                .unwrap_or_default();
            let values = incoming.values.into_iter().map(ReadingValue::from).collect();
            if batch.insert(CodedPoint::new(code, values, name)).is_some() {
                return Err(PipelineError::Transport(format!(
                    "OBIS code {code} reported twice (last key '{raw_code}')"
                )));
            }
        }
        Ok(batch)
    }
}

/// Decodes one NDJSON line from a decoder or a replay file.
pub fn decode_line(line: &str, language: Language) -> Result<ReadingBatch, PipelineError> {
    let msg: TransportMessage = serde_json::from_str(line)
        .map_err(|e| PipelineError::Transport(format!("invalid transport message: {e}")))?;
    msg.into_batch(language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_batch_with_values_and_names() {
        let batch = decode_line(
            r#"{"1-0:1.8.0*255":{"values":[{"value":1234.5,"unit":"kWh","scaler":-1}],"name":"Bezug"},
                "1-0:16.7.0*255":{"values":[{"value":500}]}}"#,
            Language::En,
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        let total = batch.get(&"1-0:1.8.0*255".parse().unwrap()).unwrap();
        assert_eq!(total.name, "Bezug");
        assert_eq!(total.values[0].unit.as_deref(), Some("kWh"));
        assert_eq!(total.values[0].scaler, -1);
        assert_eq!(total.single_value(), Some(1234.5));

        let power = batch.get(&"1-0:16.7.0*255".parse().unwrap()).unwrap();
        assert_eq!(power.name, "Instantaneous total active power (total)");
        assert_eq!(power.values[0].unit, None);
    }

    #[test]
    fn octet_string_values_do_not_break_the_batch() {
        let batch = decode_line(
            r#"{"1-0:0.0.9*255":{"values":[{"value":"0901454d4800007d3f3c"}]},
                "9-9:9.9.9*255":{"values":[{"value":"abc"},{"value":true}]},
                "1-0:1.8.0*255":{"values":[{"value":1234.5,"unit":"Wh"}]}}"#,
            Language::De,
        )
        .unwrap();

        assert_eq!(batch.len(), 3);
        let id = batch.get(&"1-0:0.0.9*255".parse().unwrap()).unwrap();
        assert_eq!(id.values[0].value, MeasuredValue::Text("0901454d4800007d3f3c".to_string()));
        let unknown = batch.get(&"9-9:9.9.9*255".parse().unwrap()).unwrap();
        assert_eq!(unknown.values[1].value, MeasuredValue::Other);
        let total = batch.get(&"1-0:1.8.0*255".parse().unwrap()).unwrap();
        assert_eq!(total.single_value(), Some(1234.5));
    }

    #[test]
    fn same_code_under_two_keys_is_a_transport_error() {
        let res = decode_line(
            r#"{"1-0:1.8.0":{"values":[{"value":1}]},"1-0:1.8.0*255":{"values":[{"value":2}]}}"#,
            Language::De,
        );
        assert!(matches!(res, Err(PipelineError::Transport(reason)) if reason.contains("1-0:1.8.0*255")));
    }

    #[test]
    fn unresolvable_name_is_empty() {
        let batch = decode_line(r#"{"9-9:9.9.9*255":{"values":[]}}"#, Language::De).unwrap();
        assert_eq!(batch.iter().next().unwrap().name, "");
    }

    #[test]
    fn error_message_is_a_transport_error() {
        let res = decode_line(r#"{"error":"CRC mismatch"}"#, Language::De);
        assert!(matches!(res, Err(PipelineError::Transport(reason)) if reason == "CRC mismatch"));
    }

    #[test]
    fn empty_object_is_an_empty_batch() {
        let batch = decode_line("{}", Language::De).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn malformed_code_or_json_is_a_transport_error() {
        assert!(matches!(
            decode_line(r#"{"1-0:1.8":{"values":[]}}"#, Language::De),
            Err(PipelineError::Transport(_))
        ));
        assert!(matches!(decode_line("not json", Language::De), Err(PipelineError::Transport(_))));
    }
}
