use std::sync::Arc;

use serde_json::json;

use crate::error::Error;
use crate::request::{RequestDescriptor, dispatch};

use super::client::CloudInner;
use super::models::{Light, parse_data, parse_one};

/// All actions related to lights within the configured installation.
///
/// Lights are outputs with light semantics; the record shape is shared.
pub struct Lights {
    inner: Arc<CloudInner>,
}

impl Lights {
    pub(crate) fn new(inner: Arc<CloudInner>) -> Self {
        Self { inner }
    }

    /// `GET /base/installations/{id}/lights`
    pub async fn get_all(&self) -> Result<Vec<Light>, Error> {
        let path = self.inner.installation_path("/lights")?;
        parse_data(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// `GET /base/installations/{id}/lights/{light_id}`
    pub async fn get_by_id(&self, light_id: u32) -> Result<Light, Error> {
        let path = self
            .inner
            .installation_path(&format!("/lights/{light_id}"))?;
        parse_one(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// Turn a light on, optionally at a brightness value (clamped to 0-100).
    pub async fn turn_on(&self, light_id: u32, value: Option<u8>) -> Result<(), Error> {
        let path = self
            .inner
            .installation_path(&format!("/lights/{light_id}/turn_on"))?;
        let body = match value {
            Some(value) => json!({ "value": value.min(100) }),
            None => json!({}),
        };
        dispatch(&*self.inner, &RequestDescriptor::post(path).with_json(body)).await?;
        Ok(())
    }

    /// Turn a light off.
    pub async fn turn_off(&self, light_id: u32) -> Result<(), Error> {
        let path = self
            .inner
            .installation_path(&format!("/lights/{light_id}/turn_off"))?;
        dispatch(
            &*self.inner,
            &RequestDescriptor::post(path).with_json(json!({})),
        )
        .await?;
        Ok(())
    }

    /// Flip a light to the opposite state.
    pub async fn toggle(&self, light_id: u32) -> Result<(), Error> {
        let light = self.get_by_id(light_id).await?;
        if light.is_on() {
            self.turn_off(light_id).await
        } else {
            self.turn_on(light_id, None).await
        }
    }
}
