use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;

use super::client::GatewayInner;
use super::models::{Sensor, SensorStatus, decode_list, take_array};

/// Read access to the gateway's sensors.
///
/// Status comes back as three parallel value lists indexed by sensor id
/// (`get_sensor_temperature_status` and friends).
pub struct Sensors {
    inner: Arc<GatewayInner>,
}

impl Sensors {
    pub(crate) fn new(inner: Arc<GatewayInner>) -> Self {
        Self { inner }
    }

    /// `get_sensor_configurations` combined with the three status lists.
    pub async fn get_all(&self) -> Result<Vec<Sensor>, Error> {
        let configs = take_array(
            self.inner.exec_action("get_sensor_configurations", None).await?,
            "config",
        )?;
        let temperatures = self.status_list("get_sensor_temperature_status").await?;
        let humidities = self.status_list("get_sensor_humidity_status").await?;
        let brightnesses = self.status_list("get_sensor_brightness_status").await?;

        let mut sensors = decode_list::<Sensor>(configs)?;
        for sensor in &mut sensors {
            let idx = sensor.id as usize;
            sensor.status = Some(SensorStatus {
                temperature: temperatures.get(idx).copied().flatten(),
                humidity: humidities.get(idx).copied().flatten(),
                brightness: brightnesses.get(idx).copied().flatten(),
            });
        }
        Ok(sensors)
    }

    pub async fn get_by_id(&self, sensor_id: u32) -> Result<Sensor, Error> {
        self.get_all()
            .await?
            .into_iter()
            .find(|sensor| sensor.id == sensor_id)
            .ok_or_else(|| Error::other(format!("no sensor with id {sensor_id}")))
    }

    /// One status list; 255 and null both mean "no reading".
    async fn status_list(&self, action: &str) -> Result<Vec<Option<f64>>, Error> {
        let values = take_array(self.inner.exec_action(action, None).await?, "status")?;
        Ok(values
            .into_iter()
            .map(|v| match v {
                Value::Number(n) => n.as_f64().filter(|&f| f != 255.0),
                _ => None,
            })
            .collect())
    }
}
