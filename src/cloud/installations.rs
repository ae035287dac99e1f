use std::sync::Arc;

use crate::error::Error;
use crate::request::{RequestDescriptor, dispatch};

use super::client::CloudInner;
use super::models::{Installation, parse_data, parse_one};

/// All actions related to the installations registered under the account.
pub struct Installations {
    inner: Arc<CloudInner>,
}

impl Installations {
    pub(crate) fn new(inner: Arc<CloudInner>) -> Self {
        Self { inner }
    }

    /// `GET /base/installations`
    pub async fn get_all(&self) -> Result<Vec<Installation>, Error> {
        let payload = dispatch(&*self.inner, &RequestDescriptor::get("/base/installations")).await?;
        parse_data(payload)
    }

    /// `GET /base/installations/{installation_id}`
    pub async fn get_by_id(&self, installation_id: u32) -> Result<Installation, Error> {
        let path = format!("/base/installations/{installation_id}");
        let payload = dispatch(&*self.inner, &RequestDescriptor::get(path)).await?;
        parse_one(payload)
    }
}
