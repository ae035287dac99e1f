use std::sync::Arc;

use crate::error::Error;
use crate::request::{RequestDescriptor, dispatch};

use super::client::CloudInner;
use super::models::{Sensor, parse_data, parse_one};

/// Read access to the sensors within the configured installation.
pub struct Sensors {
    inner: Arc<CloudInner>,
}

impl Sensors {
    pub(crate) fn new(inner: Arc<CloudInner>) -> Self {
        Self { inner }
    }

    /// `GET /base/installations/{id}/sensors`
    pub async fn get_all(&self) -> Result<Vec<Sensor>, Error> {
        let path = self.inner.installation_path("/sensors")?;
        parse_data(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// `GET /base/installations/{id}/sensors/{sensor_id}`
    pub async fn get_by_id(&self, sensor_id: u32) -> Result<Sensor, Error> {
        let path = self
            .inner
            .installation_path(&format!("/sensors/{sensor_id}"))?;
        parse_one(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }
}
