use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;

use super::client::GatewayInner;
use super::models::{Shutter, decode_list, merge_status, take_array};

/// All actions related to the gateway's shutters.
pub struct Shutters {
    inner: Arc<GatewayInner>,
}

impl Shutters {
    pub(crate) fn new(inner: Arc<GatewayInner>) -> Self {
        Self { inner }
    }

    /// `get_shutter_configurations` merged with `get_shutter_status`.
    pub async fn get_all(&self) -> Result<Vec<Shutter>, Error> {
        let configs = take_array(
            self.inner.exec_action("get_shutter_configurations", None).await?,
            "config",
        )?;
        let statuses = take_array(
            self.inner.exec_action("get_shutter_status", None).await?,
            "status",
        )?;
        decode_list(merge_status(configs, &statuses))
    }

    pub async fn get_by_id(&self, shutter_id: u32) -> Result<Shutter, Error> {
        self.get_all()
            .await?
            .into_iter()
            .find(|shutter| shutter.id == shutter_id)
            .ok_or_else(|| Error::other(format!("no shutter with id {shutter_id}")))
    }

    /// Move a shutter up.
    pub async fn up(&self, shutter_id: u32) -> Result<(), Error> {
        self.action("do_shutter_up", shutter_id).await
    }

    /// Move a shutter down.
    pub async fn down(&self, shutter_id: u32) -> Result<(), Error> {
        self.action("do_shutter_down", shutter_id).await
    }

    /// Stop a moving shutter.
    pub async fn stop(&self, shutter_id: u32) -> Result<(), Error> {
        self.action("do_shutter_stop", shutter_id).await
    }

    async fn action(&self, action: &str, shutter_id: u32) -> Result<(), Error> {
        let data = BTreeMap::from([("id".to_owned(), shutter_id.to_string())]);
        self.inner.exec_action(action, Some(data)).await?;
        Ok(())
    }
}
