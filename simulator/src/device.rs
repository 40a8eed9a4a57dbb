use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::RwLock;

/// Variable that reports when the other variables were last measured.
pub const TIMESTAMP_VARIABLE: &str = "timestamp";

pub type SharedCloud = Arc<RwLock<Cloud>>;

/// One fake device and the variables its firmware exposes.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub id: String,
    pub product_id: Option<String>,
    pub online: bool,
    pub healthy: bool,
    pub variables: BTreeMap<String, Value>,
    pub measured_at: DateTime<Utc>,
    /// How far behind "now" each new measurement is stamped.
    pub lag_secs: i64,
    pub last_handshake_at: DateTime<Utc>,
    pub last_heard: DateTime<Utc>,
}

impl SimulatedDevice {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            product_id: None,
            online: true,
            healthy: true,
            variables: BTreeMap::new(),
            measured_at: now,
            lag_secs: 0,
            last_handshake_at: now,
            last_heard: now,
        }
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_measured_at(mut self, measured_at: DateTime<Utc>) -> Self {
        self.measured_at = measured_at;
        self
    }

    pub fn with_lag(mut self, lag_secs: i64) -> Self {
        self.lag_secs = lag_secs;
        self
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Looks up a variable. Unless set explicitly, `timestamp` is derived
    /// from the last measurement as a string of epoch seconds.
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned().or_else(|| {
            (name == TIMESTAMP_VARIABLE)
                .then(|| Value::String(self.measured_at.timestamp().to_string()))
        })
    }

    /// Applies a fresh sensor reading taken at `now`.
    pub fn record(&mut self, reading: &Reading, now: DateTime<Utc>) {
        self.variables
            .insert("temperature".to_string(), json!(round2(reading.temperature)));
        self.variables
            .insert("humidity".to_string(), json!(round2(reading.humidity)));
        self.variables
            .insert("battery".to_string(), json!(round2(reading.battery)));
        self.measured_at = now - Duration::seconds(self.lag_secs);
        if self.online {
            self.last_heard = now;
        }
    }

    pub fn core_info(&self) -> Value {
        json!({
            "deviceID": self.id,
            "connected": self.online,
            "last_handshake_at": self.last_handshake_at,
            "last_heard": self.last_heard,
            "last_app": "",
            "product_id": self.product_id.as_deref().and_then(|p| p.parse::<i64>().ok()),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub battery: f64,
}

pub fn generate_reading(rng: &mut impl Rng) -> Reading {
    let temperature = if rng.gen_bool(0.05) {
        rng.gen_range(-50.0..100.0) // 5% outliers
    } else {
        rng.gen_range(15.0..35.0)
    };

    let humidity = if rng.gen_bool(0.05) {
        rng.gen_range(0.0..100.0) // 5% outliers
    } else {
        rng.gen_range(30.0..80.0)
    };

    let battery = if rng.gen_bool(0.02) {
        rng.gen_range(0.0..20.0) // 2% low battery
    } else {
        rng.gen_range(20.0..100.0)
    };

    Reading {
        temperature,
        humidity,
        battery,
    }
}

/// The set of devices behind one access token.
#[derive(Debug, Clone)]
pub struct Cloud {
    token: String,
    devices: HashMap<String, SimulatedDevice>,
}

impl Cloud {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            devices: HashMap::new(),
        }
    }

    pub fn insert(&mut self, device: SimulatedDevice) {
        self.devices.insert(device.id.clone(), device);
    }

    pub fn shared(self) -> SharedCloud {
        Arc::new(RwLock::new(self))
    }

    pub fn authorized(&self, presented: Option<&str>) -> bool {
        presented == Some(self.token.as_str())
    }

    /// Product-scoped lookups only see devices claimed into that product.
    pub fn device(&self, product_id: Option<&str>, device_id: &str) -> Option<&SimulatedDevice> {
        self.devices
            .get(device_id)
            .filter(|d| product_id.is_none() || d.product_id.as_deref() == product_id)
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut SimulatedDevice> {
        self.devices.values_mut()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.devices.values().filter(|d| d.online).count()
    }
}
