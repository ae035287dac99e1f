use std::sync::Arc;

use serde_json::json;

use crate::error::Error;
use crate::request::{RequestDescriptor, dispatch};

use super::client::CloudInner;
use super::models::{Output, parse_data, parse_one};

/// All actions related to outputs within the configured installation.
pub struct Outputs {
    inner: Arc<CloudInner>,
}

impl Outputs {
    pub(crate) fn new(inner: Arc<CloudInner>) -> Self {
        Self { inner }
    }

    /// `GET /base/installations/{id}/outputs`
    pub async fn get_all(&self) -> Result<Vec<Output>, Error> {
        let path = self.inner.installation_path("/outputs")?;
        parse_data(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// `GET /base/installations/{id}/outputs/{output_id}`
    pub async fn get_by_id(&self, output_id: u32) -> Result<Output, Error> {
        let path = self
            .inner
            .installation_path(&format!("/outputs/{output_id}"))?;
        parse_one(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// Turn an output on, optionally at a dimmer value (clamped to 0-100).
    pub async fn turn_on(&self, output_id: u32, value: Option<u8>) -> Result<(), Error> {
        let path = self
            .inner
            .installation_path(&format!("/outputs/{output_id}/turn_on"))?;
        let body = match value {
            Some(value) => json!({ "value": value.min(100) }),
            None => json!({}),
        };
        dispatch(&*self.inner, &RequestDescriptor::post(path).with_json(body)).await?;
        Ok(())
    }

    /// Turn an output off.
    pub async fn turn_off(&self, output_id: u32) -> Result<(), Error> {
        let path = self
            .inner
            .installation_path(&format!("/outputs/{output_id}/turn_off"))?;
        dispatch(
            &*self.inner,
            &RequestDescriptor::post(path).with_json(json!({})),
        )
        .await?;
        Ok(())
    }

    /// Flip an output to the opposite state.
    pub async fn toggle(&self, output_id: u32) -> Result<(), Error> {
        let output = self.get_by_id(output_id).await?;
        if output.is_on() {
            self.turn_off(output_id).await
        } else {
            self.turn_on(output_id, None).await
        }
    }
}
