//! Trip records: one JSON object per input line.

use serde::Deserialize;
use serde::de::Error as _;
use serde_json::Value;

/// Placeholder for a missing vessel, rig, or departure.
pub const UNKNOWN: &str = "Unknown";

/// One raw trip record, as found on an input line.
///
/// Every field is optional. `null` is treated the same as a missing field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripRecord {
    #[serde(rename = "Vessel", default)]
    pub vessel: Option<Value>,

    #[serde(rename = "Rig", default)]
    pub rig: Option<Value>,

    #[serde(rename = "ApproximateDeparture", default)]
    pub departure: Option<Value>,

    #[serde(rename = "Rank", default)]
    pub rank: Option<Value>,
}

impl TripRecord {
    /// Parse a record from one line of JSON.
    ///
    /// Anything other than a JSON object fails, including arrays that serde
    /// would otherwise map onto the fields by position.
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(line)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom("expected a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// The vessel name, or [`UNKNOWN`].
    pub fn vessel(&self) -> String {
        text_or_unknown(self.vessel.as_ref())
    }

    /// The rig type, or [`UNKNOWN`].
    pub fn rig(&self) -> String {
        text_or_unknown(self.rig.as_ref())
    }

    /// The departure identifier, or [`UNKNOWN`].
    pub fn departure(&self) -> String {
        text_or_unknown(self.departure.as_ref())
    }

    /// Whether this record describes a crew member.
    ///
    /// A rank counts as present when it is truthy: `""`, `false`, `0`,
    /// `[]` and `{}` all mean passenger.
    pub fn is_crew(&self) -> bool {
        match &self.rank {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
        }
    }
}

/// Render a scalar field as text. Containers count as missing.
fn text_or_unknown(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}
