use std::sync::Arc;

use serde_json::json;

use crate::error::Error;
use crate::request::{RequestDescriptor, dispatch};

use super::client::CloudInner;
use super::models::{GroupAction, parse_data, parse_one};

/// All actions related to group actions within the configured installation.
pub struct GroupActions {
    inner: Arc<CloudInner>,
}

impl GroupActions {
    pub(crate) fn new(inner: Arc<CloudInner>) -> Self {
        Self { inner }
    }

    /// `GET /base/installations/{id}/groupactions`
    pub async fn get_all(&self) -> Result<Vec<GroupAction>, Error> {
        let path = self.inner.installation_path("/groupactions")?;
        parse_data(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// `GET /base/installations/{id}/groupactions/{groupaction_id}`
    pub async fn get_by_id(&self, groupaction_id: u32) -> Result<GroupAction, Error> {
        let path = self
            .inner
            .installation_path(&format!("/groupactions/{groupaction_id}"))?;
        parse_one(dispatch(&*self.inner, &RequestDescriptor::get(path)).await?)
    }

    /// Run a stored group action.
    pub async fn trigger(&self, groupaction_id: u32) -> Result<(), Error> {
        let path = self
            .inner
            .installation_path(&format!("/groupactions/{groupaction_id}/trigger"))?;
        dispatch(
            &*self.inner,
            &RequestDescriptor::post(path).with_json(json!({})),
        )
        .await?;
        Ok(())
    }
}
