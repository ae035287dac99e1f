use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;

use super::client::GatewayInner;
use super::models::{Thermostat, decode_list, merge_status, take_array};

/// All actions related to the gateway's thermostats.
pub struct Thermostats {
    inner: Arc<GatewayInner>,
}

impl Thermostats {
    pub(crate) fn new(inner: Arc<GatewayInner>) -> Self {
        Self { inner }
    }

    /// `get_thermostat_configurations` merged with `get_thermostat_status`.
    pub async fn get_all(&self) -> Result<Vec<Thermostat>, Error> {
        let configs = take_array(
            self.inner
                .exec_action("get_thermostat_configurations", None)
                .await?,
            "config",
        )?;
        let statuses = take_array(
            self.inner.exec_action("get_thermostat_status", None).await?,
            "status",
        )?;
        decode_list(merge_status(configs, &statuses))
    }

    pub async fn get_by_id(&self, thermostat_id: u32) -> Result<Thermostat, Error> {
        self.get_all()
            .await?
            .into_iter()
            .find(|thermostat| thermostat.id == thermostat_id)
            .ok_or_else(|| Error::other(format!("no thermostat with id {thermostat_id}")))
    }

    /// Change a thermostat's setpoint temperature (degrees Celsius).
    pub async fn set_temperature(
        &self,
        thermostat_id: u32,
        temperature: f64,
    ) -> Result<(), Error> {
        let data = BTreeMap::from([
            ("thermostat".to_owned(), thermostat_id.to_string()),
            ("temperature".to_owned(), temperature.to_string()),
        ]);
        self.inner
            .exec_action("set_current_setpoint", Some(data))
            .await?;
        Ok(())
    }
}
