use std::sync::Arc;

use serde_json::json;

use crate::error::Error;
use crate::request::{RequestDescriptor, dispatch};

use super::client::CloudInner;
use super::models::{Shutter, parse_data, parse_one};

/// All actions related to shutters within the configured installation.
pub struct Shutters {
    inner: Arc<CloudInner>,
}

impl Shutters {
    pub(crate) fn new(inner: Arc<CloudInner>) -> Self {
        Self { inner }
    }

    /// `GET /base/installations/{id}/shutters`
    pub async fn get_all(&self) -> Result<Vec<Shutter>, Error> {
        let path = self.inner.installation_path("/shutters")?;
        parse_data(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// `GET /base/installations/{id}/shutters/{shutter_id}`
    pub async fn get_by_id(&self, shutter_id: u32) -> Result<Shutter, Error> {
        let path = self
            .inner
            .installation_path(&format!("/shutters/{shutter_id}"))?;
        parse_one(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// Move a shutter up.
    pub async fn up(&self, shutter_id: u32) -> Result<(), Error> {
        self.action(shutter_id, "up").await
    }

    /// Move a shutter down.
    pub async fn down(&self, shutter_id: u32) -> Result<(), Error> {
        self.action(shutter_id, "down").await
    }

    /// Stop a moving shutter.
    pub async fn stop(&self, shutter_id: u32) -> Result<(), Error> {
        self.action(shutter_id, "stop").await
    }

    async fn action(&self, shutter_id: u32, action: &str) -> Result<(), Error> {
        let path = self
            .inner
            .installation_path(&format!("/shutters/{shutter_id}/{action}"))?;
        dispatch(
            &*self.inner,
            &RequestDescriptor::post(path).with_json(json!({})),
        )
        .await?;
        Ok(())
    }
}
