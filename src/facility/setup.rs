//! `/Setup`: read and write `setup.conf` parameters.

use std::time::Duration;
use zbus::zvariant::{OwnedValue, Value};
use zbus::Connection;

use super::{Endpoint, Reply};
use crate::error::{call, Result};

#[zbus::proxy(
    interface = "de.tvdr.vdr.setup",
    default_service = "de.tvdr.vdr",
    default_path = "/Setup"
)]
trait SetupService {
    fn list(&self) -> zbus::Result<Vec<(String, OwnedValue)>>;
    fn get(&self, parameter: &str) -> zbus::Result<(OwnedValue, i32, String)>;
    fn set(&self, parameter: &str, value: &Value<'_>) -> zbus::Result<Reply>;
    fn del(&self, parameter: &str) -> zbus::Result<Reply>;
}

#[derive(Clone)]
pub struct Setup {
    proxy: SetupServiceProxy<'static>,
    deadline: Duration,
}

impl Setup {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = SetupServiceProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    pub async fn list(&self) -> Result<Vec<(String, OwnedValue)>> {
        call("List", self.deadline, self.proxy.list()).await
    }

    /// Value of a setup parameter (`name` or `plugin.name`).
    pub async fn get(&self, parameter: &str) -> Result<(OwnedValue, i32, String)> {
        call("Get", self.deadline, self.proxy.get(parameter)).await
    }

    /// Store a parameter in `setup.conf`.
    ///
    /// Parameters VDR does not know trigger a reload of the whole file, including
    /// `SetupParse` of every plugin.
    pub async fn set(&self, parameter: &str, value: &Value<'_>) -> Result<Reply> {
        call("Set", self.deadline, self.proxy.set(parameter, value)).await
    }

    /// Delete a parameter; `plugin.*` deletes every setting of a plugin.
    pub async fn del(&self, parameter: &str) -> Result<Reply> {
        call("Del", self.deadline, self.proxy.del(parameter)).await
    }
}
