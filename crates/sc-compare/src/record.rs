//! Normalized scoring records.
//!
//! Both dump producers emit loosely-shaped JSON. Every array element is
//! reduced to a `Record` so that the comparator only ever sees one shape.
//! Raw values are kept as they appeared in the dump; the typed views
//! (`as_number`, `as_class`) coerce on demand and never fail.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A record timestamp as written in the dump.
///
/// Numbers stay numbers: they never parse as a date and never equal a
/// string spelling of the same digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Text(String),
    Number(Number),
}

impl Timestamp {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Timestamp::Text(s) => Some(s.as_str()),
            Timestamp::Number(_) => None,
        }
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Timestamp::Text(s.to_string())
    }
}

impl From<String> for Timestamp {
    fn from(s: String) -> Self {
        Timestamp::Text(s)
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Timestamp::Text(s) => f.write_str(s),
            Timestamp::Number(n) => write!(f, "{}", n),
        }
    }
}

/// One scoring snapshot after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub time: Option<Timestamp>,
    pub weather: Map<String, Value>,
    pub derived: Map<String, Value>,
    pub water_temp_for_scoring: Option<Value>,
    /// Activity classification.
    pub overall: Option<Value>,
    pub confidence: Option<Value>,
}

/// How an element of the dump array is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementShape {
    /// `{ "input": {...}, "result": {...} }`
    Detailed,
    /// `weather`, `time`, `activity_overall`, `activity_confidence` at element level.
    Flat,
}

impl ElementShape {
    pub fn detect(element: &Map<String, Value>) -> Self {
        if element.contains_key("input") && element.contains_key("result") {
            ElementShape::Detailed
        } else {
            ElementShape::Flat
        }
    }
}

impl Record {
    /// Normalize one element of a dump array.
    ///
    /// Non-object elements normalize to an empty record.
    pub fn from_element(element: &Value) -> Self {
        let empty = Map::new();
        let outer = element.as_object().unwrap_or(&empty);

        // `input` is where the scoring inputs live; flat elements nest
        // them under `weather`.
        let (input, result) = match ElementShape::detect(outer) {
            ElementShape::Detailed => (
                object_or(outer.get("input"), &empty),
                object_or(outer.get("result"), &empty),
            ),
            ElementShape::Flat => (object_or(outer.get("weather"), &empty), &empty),
        };

        let time = first_present([input.get("time"), outer.get("time")]).and_then(timestamp);

        let weather = first_present_object([input.get("weather"), outer.get("weather")]);
        let derived = first_present_object([input.get("derived"), outer.get("derived")]);

        let water_temp_for_scoring = if input.contains_key("waterTempForScoring") {
            input.get("waterTempForScoring")
        } else {
            outer.get("waterTempForScoring")
        }
        .filter(|v| !v.is_null())
        .cloned();

        let overall = first_present([
            result.get("overall"),
            result.get("activity_overall"),
            outer.get("activity_overall"),
        ])
        .cloned();
        let confidence = first_present([
            result.get("confidence"),
            result.get("activity_confidence"),
            outer.get("activity_confidence"),
        ])
        .cloned();

        Record {
            time,
            weather,
            derived,
            water_temp_for_scoring,
            overall,
            confidence,
        }
    }

    /// Textual timestamp, the only kind that can parse as a date.
    pub fn time_str(&self) -> Option<&str> {
        self.time.as_ref().and_then(Timestamp::as_text)
    }

    /// Timestamp for report lines and logs, `null` when absent.
    pub fn time_label(&self) -> String {
        time_label(self.time.as_ref())
    }
}

fn object_or<'a>(value: Option<&'a Value>, fallback: &'a Map<String, Value>) -> &'a Map<String, Value> {
    value.and_then(Value::as_object).unwrap_or(fallback)
}

/// False for null, false, zero, and empty strings, arrays or objects.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn first_present<'a, const N: usize>(candidates: [Option<&'a Value>; N]) -> Option<&'a Value> {
    candidates.into_iter().flatten().find(|v| is_present(v))
}

fn first_present_object<const N: usize>(candidates: [Option<&Value>; N]) -> Map<String, Value> {
    candidates
        .into_iter()
        .flatten()
        .filter(|v| is_present(v))
        .find_map(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => Some(Timestamp::Text(s.clone())),
        Value::Number(n) => Some(Timestamp::Number(n.clone())),
        _ => None,
    }
}

pub fn time_label(time: Option<&Timestamp>) -> String {
    time.map_or_else(|| "null".to_string(), ToString::to_string)
}

/// Coerce a loose value to a float. Returns `None` for null and for
/// anything that does not read as a number.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Coerce a loose value to an integer class. Floats truncate toward zero.
pub fn as_class(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detailed_element_prefers_input_and_result() {
        let element = json!({
            "time": "2024-01-01T01:00:00Z",
            "weather": {"temperature": 1.0},
            "input": {
                "time": "2024-01-01T00:00:00Z",
                "weather": {"temperature": 20.0},
                "derived": {"deltaTemp1h": 0.5},
                "waterTempForScoring": 14.2
            },
            "result": {"overall": 3, "confidence": 0.8},
            "activity_overall": 1
        });
        let record = Record::from_element(&element);
        assert_eq!(record.time_str(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(record.weather.get("temperature"), Some(&json!(20.0)));
        assert_eq!(record.derived.get("deltaTemp1h"), Some(&json!(0.5)));
        assert_eq!(record.water_temp_for_scoring, Some(json!(14.2)));
        assert_eq!(record.overall, Some(json!(3)));
        assert_eq!(record.confidence, Some(json!(0.8)));
    }

    #[test]
    fn test_detailed_element_falls_back_to_element_level() {
        let element = json!({
            "time": "2024-01-01T00:00:00Z",
            "weather": {"pressure": 1013.0},
            "derived": {"rainSum24h": 2.0},
            "input": {"weather": {}},
            "result": {"activity_overall": 2},
            "activity_confidence": 0.4
        });
        let record = Record::from_element(&element);
        assert_eq!(record.time_str(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(record.weather.get("pressure"), Some(&json!(1013.0)));
        assert_eq!(record.derived.get("rainSum24h"), Some(&json!(2.0)));
        assert_eq!(record.overall, Some(json!(2)));
        assert_eq!(record.confidence, Some(json!(0.4)));
    }

    #[test]
    fn test_flat_element() {
        let element = json!({
            "time": "2024-01-01T00:00:00Z",
            "weather": {"temperature": 18.5, "humidity": 80},
            "activity_overall": 4,
            "activity_confidence": 0.66,
            "waterTempForScoring": 12.0
        });
        let record = Record::from_element(&element);
        assert_eq!(record.time_str(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(record.weather.get("humidity"), Some(&json!(80)));
        assert!(record.derived.is_empty());
        assert_eq!(record.water_temp_for_scoring, Some(json!(12.0)));
        assert_eq!(record.overall, Some(json!(4)));
        assert_eq!(record.confidence, Some(json!(0.66)));
    }

    #[test]
    fn test_water_temp_key_presence_wins_over_value() {
        let element = json!({
            "input": {"waterTempForScoring": null},
            "result": {},
            "waterTempForScoring": 15.0
        });
        let record = Record::from_element(&element);
        assert_eq!(record.water_temp_for_scoring, None);
    }

    #[test]
    fn test_zero_classification_reads_as_absent() {
        let element = json!({"input": {}, "result": {"overall": 0, "confidence": 0.0}});
        let record = Record::from_element(&element);
        assert_eq!(record.overall, None);
        assert_eq!(record.confidence, None);
    }

    #[test]
    fn test_non_object_element_is_empty() {
        assert_eq!(Record::from_element(&json!(42)), Record::default());
    }

    #[test]
    fn test_numeric_time_stays_numeric() {
        let record = Record::from_element(&json!({"time": 1704067200}));
        assert_eq!(record.time, Some(Timestamp::Number(Number::from(1_704_067_200_i64))));
        assert_eq!(record.time_str(), None);
        assert_eq!(record.time_label(), "1704067200");
        assert_ne!(record.time, Some(Timestamp::from("1704067200")));

        let back: Record = serde_json::from_value(serde_json::to_value(&record).unwrap()).unwrap();
        assert_eq!(back.time, record.time);
    }

    #[test]
    fn test_as_number_coercion() {
        assert_eq!(as_number(&json!(1.5)), Some(1.5));
        assert_eq!(as_number(&json!(" 2.25 ")), Some(2.25));
        assert_eq!(as_number(&json!(true)), Some(1.0));
        assert_eq!(as_number(&json!("n/a")), None);
        assert_eq!(as_number(&json!(null)), None);
        assert_eq!(as_number(&json!([1])), None);
    }

    #[test]
    fn test_as_class_coercion() {
        assert_eq!(as_class(&json!(3)), Some(3));
        assert_eq!(as_class(&json!(2.9)), Some(2));
        assert_eq!(as_class(&json!(-2.9)), Some(-2));
        assert_eq!(as_class(&json!("4")), Some(4));
        assert_eq!(as_class(&json!("4.5")), None);
        assert_eq!(as_class(&json!(null)), None);
    }
}
