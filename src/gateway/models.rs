// Gateway webservice resource records.
//
// The gateway reports configuration and live status through separate
// calls (`get_*_configurations` / `get_*_status`), so list responses are
// merged by id before decoding.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Merge per-device status objects into configuration records, keyed on
/// `id`. Records without a matching status entry pass through unchanged.
pub(crate) fn merge_status(mut configs: Vec<Value>, statuses: &[Value]) -> Vec<Value> {
    for config in &mut configs {
        let Some(map) = config.as_object_mut() else {
            continue;
        };
        let id = map.get("id").cloned();
        let matched = statuses
            .iter()
            .find(|status| id.is_some() && status.get("id") == id.as_ref());
        if let Some(status) = matched {
            map.insert("status".to_owned(), status.clone());
        }
    }
    configs
}

/// Pull an array field (`config`, `status`, ...) out of an action result.
pub(crate) fn take_array(mut value: Value, key: &str) -> Result<Vec<Value>, Error> {
    match value.as_object_mut().and_then(|map| map.remove(key)) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(Error::Deserialization {
            message: format!("response has no {key:?} array"),
            body: value.to_string(),
        }),
    }
}

/// Decode a list of merged records.
pub(crate) fn decode_list<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>, Error> {
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item.clone()).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: item.to_string(),
            })
        })
        .collect()
}

// ── Output / Light ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputStatus {
    /// 1 when the output is on, 0 when off.
    #[serde(default)]
    pub status: Option<u8>,
    /// Dimmer position, 0-100.
    #[serde(default)]
    pub dimmer: Option<u8>,
    /// Remaining on-timer, seconds.
    #[serde(default)]
    pub ctimer: Option<u32>,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub module_type: Option<String>,
    /// 255 marks a light in the gateway configuration.
    #[serde(default, rename = "type")]
    pub output_type: Option<u16>,
    #[serde(default)]
    pub room: Option<u16>,
    #[serde(default)]
    pub status: Option<OutputStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Output {
    pub fn is_on(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.status)
            .is_some_and(|s| s == 1)
    }

    pub fn is_light(&self) -> bool {
        self.output_type == Some(255)
    }
}

// ── Sensor ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorStatus {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub brightness: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub room: Option<u16>,
    #[serde(default, rename = "virtual")]
    pub is_virtual: Option<bool>,
    #[serde(default)]
    pub status: Option<SensorStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Shutter ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutterStatus {
    /// `"going_up"`, `"going_down"`, `"stopped"`.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub position: Option<u8>,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shutter {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub room: Option<u16>,
    #[serde(default)]
    pub timer_up: Option<u32>,
    #[serde(default)]
    pub timer_down: Option<u32>,
    #[serde(default)]
    pub status: Option<ShutterStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Thermostat ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermostatStatus {
    #[serde(default, rename = "act")]
    pub actual_temperature: Option<f64>,
    #[serde(default, rename = "csetp")]
    pub setpoint_temperature: Option<f64>,
    #[serde(default)]
    pub mode: Option<u8>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thermostat {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub room: Option<u16>,
    #[serde(default)]
    pub status: Option<ThermostatStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Group action ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAction {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub actions: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
