use std::sync::Arc;

use serde_json::json;

use crate::error::Error;
use crate::request::{RequestDescriptor, dispatch};

use super::client::CloudInner;
use super::models::{Thermostat, parse_data, parse_one};

/// All actions related to thermostat units within the configured installation.
pub struct Thermostats {
    inner: Arc<CloudInner>,
}

impl Thermostats {
    pub(crate) fn new(inner: Arc<CloudInner>) -> Self {
        Self { inner }
    }

    /// `GET /base/installations/{id}/thermostats/units`
    pub async fn get_all(&self) -> Result<Vec<Thermostat>, Error> {
        let path = self.inner.installation_path("/thermostats/units")?;
        parse_data(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// `GET /base/installations/{id}/thermostats/units/{unit_id}`
    pub async fn get_by_id(&self, unit_id: u32) -> Result<Thermostat, Error> {
        let path = self
            .inner
            .installation_path(&format!("/thermostats/units/{unit_id}"))?;
        parse_one(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// Change a unit's setpoint temperature (degrees Celsius).
    pub async fn set_temperature(&self, unit_id: u32, temperature: f64) -> Result<(), Error> {
        let path = self
            .inner
            .installation_path(&format!("/thermostats/units/{unit_id}/setpoint"))?;
        dispatch(
            &*self.inner,
            &RequestDescriptor::post(path).with_json(json!({ "temperature": temperature })),
        )
        .await?;
        Ok(())
    }
}
