use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::model::{CoreInfo, PingStatus, VariableReading};

/// A device variable's `result`, whatever JSON scalar type the firmware
/// declared it as.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Bool(bool),
    /// Kept as the literal JSON text so `72.50` is not reformatted.
    Number(String),
    Text(String),
}

impl VariableValue {
    fn from_raw(raw: &RawValue) -> Result<Self> {
        let text = raw.get().trim();
        match serde_json::from_str::<Value>(text)? {
            Value::Bool(b) => Ok(VariableValue::Bool(b)),
            Value::Number(_) => Ok(VariableValue::Number(text.to_string())),
            Value::String(s) => Ok(VariableValue::Text(s)),
            Value::Null => Err(Error::Decode("result is null".to_string())),
            other => Err(Error::Decode(format!(
                "result is not a scalar value: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Bool(b) => write!(f, "{}", b),
            VariableValue::Number(n) => f.write_str(n),
            VariableValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VariableEnvelope<'a> {
    #[serde(default)]
    name: Option<String>,
    #[serde(borrow, default)]
    result: Option<&'a RawValue>,
    #[serde(default, rename = "coreInfo", alias = "coreinfo", alias = "CoreInfo")]
    core_info: Option<Value>,
}

/// Decodes a variable response body.
///
/// The envelope's `name` wins when present; timestamp variables sometimes
/// come back with only `result`, so the requested name fills the gap.
pub fn decode_variable(
    body: &[u8],
    requested: &str,
    fetched_at_local: DateTime<Utc>,
) -> Result<VariableReading> {
    let envelope: VariableEnvelope = serde_json::from_slice(body)?;

    let raw = envelope
        .result
        .ok_or_else(|| Error::Decode("response has no result field".to_string()))?;
    let value = VariableValue::from_raw(raw)?;

    let name = match envelope.name {
        Some(name) if !name.is_empty() => name,
        _ => requested.to_string(),
    };

    Ok(VariableReading {
        name,
        raw_value: value.to_string(),
        fetched_at_local,
        core_info: envelope.core_info.as_ref().and_then(CoreInfo::from_json),
    })
}

/// Decodes a ping response body. Missing flags read as `false`.
pub fn decode_ping(body: &[u8]) -> Result<PingStatus> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(Error::Decode(format!(
            "ping response is not an object: {}",
            value
        )));
    }
    Ok(serde_json::from_value(value)?)
}
