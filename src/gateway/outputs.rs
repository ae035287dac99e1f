use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;

use super::client::GatewayInner;
use super::models::{Output, decode_list, merge_status, take_array};

/// All actions related to the gateway's outputs.
pub struct Outputs {
    inner: Arc<GatewayInner>,
}

impl Outputs {
    pub(crate) fn new(inner: Arc<GatewayInner>) -> Self {
        Self { inner }
    }

    /// `get_output_configurations` merged with `get_output_status`.
    pub async fn get_all(&self) -> Result<Vec<Output>, Error> {
        let configs = take_array(
            self.inner.exec_action("get_output_configurations", None).await?,
            "config",
        )?;
        let statuses = take_array(
            self.inner.exec_action("get_output_status", None).await?,
            "status",
        )?;
        decode_list(merge_status(configs, &statuses))
    }

    pub async fn get_by_id(&self, output_id: u32) -> Result<Output, Error> {
        self.get_all()
            .await?
            .into_iter()
            .find(|output| output.id == output_id)
            .ok_or_else(|| Error::other(format!("no output with id {output_id}")))
    }

    /// Turn an output on, optionally at a dimmer value (clamped to 0-100).
    pub async fn turn_on(&self, output_id: u32, value: Option<u8>) -> Result<(), Error> {
        self.set_output(output_id, true, value).await
    }

    /// Turn an output off.
    pub async fn turn_off(&self, output_id: u32) -> Result<(), Error> {
        self.set_output(output_id, false, None).await
    }

    /// Flip an output to the opposite state.
    pub async fn toggle(&self, output_id: u32) -> Result<(), Error> {
        if self.get_by_id(output_id).await?.is_on() {
            self.turn_off(output_id).await
        } else {
            self.turn_on(output_id, None).await
        }
    }

    pub(crate) async fn set_output(
        &self,
        output_id: u32,
        is_on: bool,
        dimmer: Option<u8>,
    ) -> Result<(), Error> {
        let mut data = BTreeMap::from([
            ("id".to_owned(), output_id.to_string()),
            ("is_on".to_owned(), is_on.to_string()),
        ]);
        if let Some(dimmer) = dimmer {
            data.insert("dimmer".to_owned(), dimmer.min(100).to_string());
        }
        self.inner.exec_action("set_output", Some(data)).await?;
        Ok(())
    }
}
