// Cloud API resource records.
//
// The API is inconsistent about field presence across installations and
// gateway firmware versions, so optional fields carry `#[serde(default)]`
// and every record keeps a catch-all `extra` map for undocumented fields.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::request::Payload;

/// Unwrap the `{"data": [...]}` list envelope the cloud API uses, and
/// decode each element. Bare arrays are accepted too.
pub(crate) fn parse_data<T: DeserializeOwned>(payload: Payload) -> Result<Vec<T>, Error> {
    let value = payload.into_json()?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::Deserialization {
                    message: "response has no \"data\" array".into(),
                    body: Value::Object(map).to_string(),
                });
            }
        },
        other => {
            return Err(Error::Deserialization {
                message: "expected a list response".into(),
                body: other.to_string(),
            });
        }
    };

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

/// Decode a single-record response, unwrapping a `data` envelope if present.
pub(crate) fn parse_one<T: DeserializeOwned>(payload: Payload) -> Result<T, Error> {
    let mut value = payload.into_json()?;
    if let Value::Object(map) = &mut value {
        if let Some(data) = map.remove("data") {
            value = data;
        }
    }
    serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: value.to_string(),
    })
}

// ── Shared sub-records ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorCoordinates {
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub floor_coordinates: Option<FloorCoordinates>,
    #[serde(default)]
    pub installation_id: Option<u32>,
    #[serde(default)]
    pub gateway_id: Option<u32>,
    #[serde(default)]
    pub floor_id: Option<u32>,
    #[serde(default)]
    pub room_id: Option<u32>,
}

// ── Installation ─────────────────────────────────────────────────────

/// A site/building registered under the cloud account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub gateway_model: Option<String>,
    #[serde(default)]
    pub registration_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Output / Light ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputStatus {
    pub on: bool,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(default)]
    pub manual_override: Option<bool>,
    /// Dimmer position, 0-100.
    #[serde(default)]
    pub value: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub id: u32,
    #[serde(default)]
    pub local_id: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub output_type: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: Option<OutputStatus>,
    #[serde(default)]
    pub last_state_change: Option<f64>,
    #[serde(default, rename = "_version")]
    pub version: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Output {
    pub fn is_on(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.on)
    }
}

/// Lights share the output record shape.
pub type Light = Output;

// ── Sensor ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorStatus {
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    /// `"temperature"`, `"humidity"`, `"brightness"`, ...
    #[serde(default)]
    pub physical_quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: Option<SensorStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Shutter ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutterStatus {
    /// `"UP"`, `"DOWN"`, `"GOING_UP"`, `"GOING_DOWN"`, `"STOPPED"`.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub position: Option<u8>,
    #[serde(default)]
    pub locked: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shutter {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub shutter_type: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: Option<ShutterStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Thermostat ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermostatStatus {
    #[serde(default)]
    pub actual_temperature: Option<f64>,
    #[serde(default)]
    pub setpoint_temperature: Option<f64>,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thermostat {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: Option<ThermostatStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Group action ─────────────────────────────────────────────────────

/// A server-side stored sequence of device actions, triggerable as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAction {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
