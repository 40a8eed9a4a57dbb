use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{Error, Result};

/// Identifies which device (and optionally which product fleet) to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub device_id: String,
    pub product_id: Option<String>,
    pub credential: String,
}

impl DeviceTarget {
    /// `{base}/[products/{product}/]devices/{device}/{leaf}`, each segment
    /// percent-encoded.
    pub fn url(&self, base: &str, leaf: &str) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| Error::Config(format!("invalid API URL {:?}: {}", base, e)))?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("API URL cannot be a base: {:?}", base)))?;
            segments.pop_if_empty();
            if let Some(product_id) = &self.product_id {
                segments.extend(["products", product_id.as_str()]);
            }
            segments.extend(["devices", self.device_id.as_str(), leaf]);
        }

        Ok(url)
    }
}

/// Device connectivity details the cloud attaches to variable responses.
/// Only ever logged, so each field is read on a best-effort basis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreInfo {
    pub device_id: Option<String>,
    pub connected: Option<bool>,
    pub last_handshake_at: Option<String>,
    pub last_heard: Option<String>,
    pub last_app: Option<String>,
    pub product_id: Option<i64>,
}

impl CoreInfo {
    /// `None` unless `value` is an object. Fields of an unexpected type are
    /// left empty rather than rejected.
    pub fn from_json(value: &Value) -> Option<Self> {
        let info = value.as_object()?;
        let text = |key: &str| info.get(key).and_then(Value::as_str).map(str::to_string);

        Some(CoreInfo {
            device_id: text("deviceID"),
            connected: info.get("connected").and_then(Value::as_bool),
            last_handshake_at: text("last_handshake_at"),
            last_heard: text("last_heard"),
            last_app: text("last_app"),
            product_id: info.get("product_id").and_then(|p| match p {
                Value::String(s) => s.trim().parse().ok(),
                other => other.as_i64(),
            }),
        })
    }
}

/// One decoded variable response.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableReading {
    pub name: String,
    pub raw_value: String,
    pub fetched_at_local: DateTime<Utc>,
    pub core_info: Option<CoreInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// Local clock when the primary fetch completed.
    Local,
    /// Epoch seconds read from a separate device variable.
    RemoteVariable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSnapshot {
    pub reading: VariableReading,
    /// Best estimate of when the device took the measurement.
    pub timestamp: DateTime<Utc>,
    pub timestamp_source: TimestampSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessVerdict {
    pub ok: bool,
    pub age_seconds: i64,
    pub threshold_seconds: i64,
    pub reason: Option<String>,
}

/// Body of `PUT .../ping`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PingStatus {
    pub online: bool,
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingVerdict {
    Healthy,
    Unhealthy { online: bool, ok: bool },
}
