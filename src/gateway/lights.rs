use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;

use super::client::GatewayInner;
use super::models::{Output, decode_list, merge_status, take_array};

/// All actions related to the gateway's lights.
///
/// The gateway has no separate light resource; lights are the outputs
/// configured with type 255.
pub struct Lights {
    inner: Arc<GatewayInner>,
}

impl Lights {
    pub(crate) fn new(inner: Arc<GatewayInner>) -> Self {
        Self { inner }
    }

    /// The light subset of `get_output_configurations`, with status merged.
    pub async fn get_all(&self) -> Result<Vec<Output>, Error> {
        let configs = take_array(
            self.inner.exec_action("get_output_configurations", None).await?,
            "config",
        )?;
        let statuses = take_array(
            self.inner.exec_action("get_output_status", None).await?,
            "status",
        )?;
        let outputs = decode_list::<Output>(merge_status(configs, &statuses))?;
        Ok(outputs.into_iter().filter(Output::is_light).collect())
    }

    pub async fn get_by_id(&self, light_id: u32) -> Result<Output, Error> {
        self.get_all()
            .await?
            .into_iter()
            .find(|light| light.id == light_id)
            .ok_or_else(|| Error::other(format!("no light with id {light_id}")))
    }

    /// Turn a light on, optionally at a dimmer value (clamped to 0-100).
    pub async fn turn_on(&self, light_id: u32, value: Option<u8>) -> Result<(), Error> {
        self.set_light(light_id, true, value).await
    }

    /// Turn a light off.
    pub async fn turn_off(&self, light_id: u32) -> Result<(), Error> {
        self.set_light(light_id, false, None).await
    }

    /// Flip a light to the opposite state.
    pub async fn toggle(&self, light_id: u32) -> Result<(), Error> {
        if self.get_by_id(light_id).await?.is_on() {
            self.turn_off(light_id).await
        } else {
            self.turn_on(light_id, None).await
        }
    }

    async fn set_light(&self, light_id: u32, is_on: bool, dimmer: Option<u8>) -> Result<(), Error> {
        let mut data = BTreeMap::from([
            ("id".to_owned(), light_id.to_string()),
            ("is_on".to_owned(), is_on.to_string()),
        ]);
        if let Some(dimmer) = dimmer {
            data.insert("dimmer".to_owned(), dimmer.min(100).to_string());
        }
        self.inner.exec_action("set_output", Some(data)).await?;
        Ok(())
    }
}
