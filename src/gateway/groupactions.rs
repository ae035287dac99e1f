use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;

use super::client::GatewayInner;
use super::models::{GroupAction, decode_list, take_array};

/// All actions related to the gateway's group actions.
pub struct GroupActions {
    inner: Arc<GatewayInner>,
}

impl GroupActions {
    pub(crate) fn new(inner: Arc<GatewayInner>) -> Self {
        Self { inner }
    }

    /// `get_group_action_configurations`
    pub async fn get_all(&self) -> Result<Vec<GroupAction>, Error> {
        let configs = take_array(
            self.inner
                .exec_action("get_group_action_configurations", None)
                .await?,
            "config",
        )?;
        decode_list(configs)
    }

    pub async fn get_by_id(&self, groupaction_id: u32) -> Result<GroupAction, Error> {
        self.get_all()
            .await?
            .into_iter()
            .find(|action| action.id == groupaction_id)
            .ok_or_else(|| Error::other(format!("no group action with id {groupaction_id}")))
    }

    /// Run a stored group action.
    pub async fn trigger(&self, groupaction_id: u32) -> Result<(), Error> {
        let data = BTreeMap::from([("group_action_id".to_owned(), groupaction_id.to_string())]);
        self.inner.exec_action("do_group_action", Some(data)).await?;
        Ok(())
    }
}
